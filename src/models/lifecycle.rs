// 集群生命周期操作的选项、结果与事件

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

/// `up` 子命令的选项（一一映射为部署工具参数）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub force: bool,
    pub basic: bool,
    pub parallel: bool,
}

impl StartOptions {
    /// 转换为部署工具参数
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.force {
            args.push("--force".to_string());
        }
        if self.basic {
            args.push("--basic".to_string());
        }
        if self.parallel {
            args.push("--parallel".to_string());
        }
        args
    }
}

/// 部署工具调用结果（start / stop 以退出码为准）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunnerOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// 集群级操作的通用结果
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleOutcome {
    pub success: bool,
    pub message: String,
    pub failed_hosts: Option<Vec<String>>,
    pub duration: Option<Duration>,
}

impl LifecycleOutcome {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_failed_hosts(mut self, hosts: Vec<String>) -> Self {
        self.failed_hosts = Some(hosts);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// 软重置结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    pub success: bool,
    pub duration: Duration,
    /// 部署工具报告的退出码（仅供参考，不决定成败）
    pub runner_exit_code: i32,
    pub failed_hosts: Vec<String>,
}

/// ensure-running 结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnsureOutcome {
    pub success: bool,
    pub was_started: bool,
    pub message: String,
}

/// 单次集群级调用的阶段（不持久化）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LifecyclePhase {
    InvokingRunner,
    VerifyingReadiness,
    Succeeded,
    Failed,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvokingRunner => "invoking-runner",
            Self::VerifyingReadiness => "verifying-readiness",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// 生命周期事件（供 CLI 或上层订阅展示进度）
#[derive(Clone, Debug)]
pub enum LifecycleEvent {
    /// 阶段变化
    PhaseChanged {
        operation: &'static str,
        phase: LifecyclePhase,
        at: DateTime<Local>,
    },
    /// 主机就绪
    HostReady { host: String },
    /// 主机在截止时间内未就绪
    HostFailed { host: String },
}

impl LifecycleEvent {
    pub fn phase(operation: &'static str, phase: LifecyclePhase) -> Self {
        Self::PhaseChanged {
            operation,
            phase,
            at: Local::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_options_map_one_to_one() {
        assert!(StartOptions::default().to_args().is_empty());
        let options = StartOptions {
            force: true,
            basic: false,
            parallel: true,
        };
        assert_eq!(options.to_args(), vec!["--force", "--parallel"]);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(LifecyclePhase::VerifyingReadiness.as_str(), "verifying-readiness");
        assert_eq!(LifecyclePhase::InvokingRunner.as_str(), "invoking-runner");
    }
}
