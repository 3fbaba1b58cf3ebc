// 命令执行结果

use serde::{Deserialize, Serialize};

use crate::constants::TIMEOUT_EXIT_CODE;

/// 一次外部命令（SSH / SCP / ping / 部署工具）的执行结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// 标准输出
    pub stdout: String,
    /// 标准错误
    pub stderr: String,
    /// 退出码（124 表示超时）
    pub exit_code: i32,
    /// 是否成功
    pub success: bool,
}

impl ExecutionResult {
    /// 进程正常退出
    pub fn from_exit(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            success: exit_code == 0,
        }
    }

    /// 进程因超时被杀死
    pub fn timed_out(timeout_ms: u64, stdout: String, stderr: String) -> Self {
        let message = format!("Command timed out after {}ms", timeout_ms);
        let stderr = if stderr.is_empty() {
            message
        } else {
            format!("{}: {}", message, stderr)
        };
        Self {
            stdout,
            stderr,
            exit_code: TIMEOUT_EXIT_CODE,
            success: false,
        }
    }

    /// 进程无法启动
    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
            exit_code: 1,
            success: false,
        }
    }

    /// 是否因超时失败
    pub fn is_timeout(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE
    }

    /// 去除首尾空白的标准输出
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}
