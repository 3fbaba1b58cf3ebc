// 数据模型模块

pub mod execution;
pub mod fleet;
pub mod lifecycle;

pub use execution::ExecutionResult;
pub use fleet::{
    AgentSettings, FleetReadiness, FleetSettings, HostReadiness, RunnerSettings, VmEntry, VmRole,
};
pub use lifecycle::{
    EnsureOutcome, LifecycleEvent, LifecycleOutcome, LifecyclePhase, ResetOutcome, RunnerOutcome,
    StartOptions,
};
