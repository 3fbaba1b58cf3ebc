// 外部进程执行
// 所有 ssh / scp / ping / 部署工具调用都经过 ProcessSpawner，
// 并在 shape_outcome 中统一归一化为 ExecutionResult

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::trace;

use crate::models::ExecutionResult;

/// 进程启动请求
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessRequest {
    /// 可执行文件
    pub program: String,
    /// 参数
    pub args: Vec<String>,
    /// 额外环境变量
    pub envs: Vec<(String, String)>,
    /// 工作目录
    pub working_dir: Option<PathBuf>,
    /// 超时（超时后杀死进程）
    pub timeout: Duration,
}

impl ProcessRequest {
    /// 创建新的请求
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            envs: vec![],
            working_dir: None,
            timeout,
        }
    }

    /// 通过本地 `sh -c` 执行完整命令行
    pub fn shell(command_line: impl Into<String>, timeout: Duration) -> Self {
        Self::new("sh", vec!["-c".to_string(), command_line.into()], timeout)
    }

    pub fn with_envs(mut self, envs: Vec<(String, String)>) -> Self {
        self.envs = envs;
        self
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    /// 用于日志与匹配的可读命令行
    pub fn display(&self) -> String {
        if self.program == "sh" && self.args.len() == 2 && self.args[0] == "-c" {
            return self.args[1].clone();
        }
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// 进程正常结束时的输出
#[derive(Clone, Debug, Default)]
pub struct ProcessOutput {
    /// 标准输出
    pub stdout: Vec<u8>,
    /// 标准错误
    pub stderr: Vec<u8>,
    /// 退出码（被信号终止时为 None）
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    /// 退出码为 0 的输出
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into().into_bytes(),
            stderr: vec![],
            exit_code: Some(0),
        }
    }

    /// 非零退出码的输出
    pub fn exit(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: vec![],
            stderr: stderr.into().into_bytes(),
            exit_code: Some(exit_code),
        }
    }
}

/// 进程未能正常结束
#[derive(Debug, Error)]
pub enum ProcessFailure {
    /// 超时被杀死
    #[error("Command timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    /// 无法启动或等待进程
    #[error("{0}")]
    Spawn(#[from] std::io::Error),
}

/// 进程启动器
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn spawn(&self, request: ProcessRequest) -> Result<ProcessOutput, ProcessFailure>;
}

/// 基于 tokio::process 的生产实现
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSpawner;

#[async_trait]
impl ProcessSpawner for TokioSpawner {
    async fn spawn(&self, request: ProcessRequest) -> Result<ProcessOutput, ProcessFailure> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .envs(request.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // 超时后 future 被丢弃，子进程随之被杀死
            .kill_on_drop(true);
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }

        trace!("[Process] spawn: {}", request.display());
        let child = cmd.spawn()?;

        match tokio::time::timeout(request.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ProcessOutput {
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code: output.status.code(),
            }),
            Ok(Err(e)) => Err(ProcessFailure::Spawn(e)),
            Err(_) => Err(ProcessFailure::TimedOut {
                timeout_ms: request.timeout_ms(),
            }),
        }
    }
}

/// 将进程结果归一化为 ExecutionResult
///
/// - 超时: 退出码 124，stderr 以 "Command timed out after Nms" 开头
/// - 非零退出: 保留退出码（被信号终止视为 1）
/// - 无法启动: 退出码 1，stderr 为底层错误信息
pub fn shape_outcome(outcome: Result<ProcessOutput, ProcessFailure>) -> ExecutionResult {
    match outcome {
        Ok(output) => ExecutionResult::from_exit(
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.exit_code.unwrap_or(1),
        ),
        Err(ProcessFailure::TimedOut { timeout_ms }) => {
            ExecutionResult::timed_out(timeout_ms, String::new(), String::new())
        }
        Err(ProcessFailure::Spawn(e)) => ExecutionResult::spawn_failed(e.to_string()),
    }
}
