// 服务模块
//
// - vm: 虚拟机命令封装 (VmCommands)
// - runner: 部署工具调用 (ProvisioningRunner)
// - inventory: 集群成员访问 (FleetInventory)
// - probe: 集群就绪探测 (ReadinessProbe)
// - fleet: 集群生命周期管理 (FleetLifecycleManager)
// - storage: 设置持久化

pub mod fleet;
pub mod inventory;
pub mod probe;
pub mod runner;
pub mod storage;
pub mod vm;

pub use fleet::{EnsureOptions, FleetLifecycleManager};
pub use inventory::{FleetInventory, SettingsInventory, StaticInventory};
pub use probe::{FleetProbe, ReadinessProbe};
pub use runner::{ProvisioningRunner, ScriptRunner};
pub use vm::VmCommands;
