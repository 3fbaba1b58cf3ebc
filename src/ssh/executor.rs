// 命令执行器
// 单台主机的命令执行、两跳执行、文件传输与可达性探测

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::constants::{env, timeouts};
use crate::models::ExecutionResult;

use super::config::{ConnectionOptions, OptionOverrides};
use super::error::SshError;
use super::escape::{build_nested_command, build_ssh_command, quote_arg};
use super::process::{shape_outcome, ProcessRequest, ProcessSpawner};
use super::resolver::ConnectionResolver;

/// SSH 用户来源
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserIdentity {
    /// 每次调用时从环境变量读取
    FromEnv(String),
    /// 固定用户名
    Fixed(String),
}

impl Default for UserIdentity {
    fn default() -> Self {
        Self::FromEnv(env::SSH_USER.to_string())
    }
}

/// 命令执行器
/// 进程启动时构造一次，显式传给 VmCommands 与 FleetLifecycleManager
pub struct CommandExecutor {
    /// 连接配置解析器
    resolver: Arc<dyn ConnectionResolver>,
    /// 进程启动器
    spawner: Arc<dyn ProcessSpawner>,
    /// SSH 用户来源
    user: UserIdentity,
    /// 私钥状态是否已经打印过
    key_status_logged: AtomicBool,
}

impl CommandExecutor {
    /// 创建新的执行器
    pub fn new(resolver: Arc<dyn ConnectionResolver>, spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self {
            resolver,
            spawner,
            user: UserIdentity::default(),
            key_status_logged: AtomicBool::new(false),
        }
    }

    /// 指定用户来源
    pub fn with_user(mut self, user: UserIdentity) -> Self {
        self.user = user;
        self
    }

    /// 计算 ssh 连接选项
    /// 每次都重新解析私钥；首次调用时打印一次私钥状态
    pub fn compute_options(&self, overrides: OptionOverrides) -> ConnectionOptions {
        self.log_key_status_once();
        ConnectionOptions::merge(
            overrides,
            self.resolver.ssh_option_string(),
            self.current_identity(),
        )
    }

    /// 计算 scp 连接选项（默认静默）
    pub fn compute_scp_options(&self, overrides: OptionOverrides) -> ConnectionOptions {
        self.log_key_status_once();
        let overrides = OptionOverrides {
            quiet: Some(overrides.quiet.unwrap_or(true)),
            ..overrides
        };
        ConnectionOptions::merge(
            overrides,
            self.resolver.scp_option_string(),
            self.current_identity(),
        )
    }

    fn current_identity(&self) -> Option<std::path::PathBuf> {
        if self.resolver.is_key_available() {
            Some(self.resolver.private_key_path())
        } else {
            None
        }
    }

    fn log_key_status_once(&self) {
        if self
            .key_status_logged
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let key_path = self.resolver.private_key_path();
        if self.resolver.is_key_available() {
            info!("[Executor] Using SSH key {}", key_path.display());
        } else {
            warn!(
                "[Executor] SSH key not found at {}, relying on agent/default identities",
                key_path.display()
            );
        }
    }

    /// 解析 SSH 用户，缺失时为配置错误
    fn resolve_user(&self) -> Result<String, SshError> {
        match &self.user {
            UserIdentity::Fixed(user) if !user.is_empty() => Ok(user.clone()),
            UserIdentity::Fixed(_) => Err(SshError::Config("SSH user is empty".to_string())),
            UserIdentity::FromEnv(var) => std::env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    SshError::Config(format!("environment variable {} is not set", var))
                }),
        }
    }

    async fn run(&self, request: ProcessRequest) -> ExecutionResult {
        let result = shape_outcome(self.spawner.spawn(request).await);
        if result.is_timeout() {
            debug!("[Executor] {}", result.stderr);
        }
        result
    }

    /// 在单台主机上执行命令
    pub async fn execute(
        &self,
        host: &str,
        command: &str,
        overrides: OptionOverrides,
    ) -> Result<ExecutionResult, SshError> {
        let user = self.resolve_user()?;
        let options = self.compute_options(overrides);
        let line = build_ssh_command(&options.render(), &user, host, command);
        debug!("[Executor] [{}] exec: {}", host, command);
        Ok(self
            .run(ProcessRequest::shell(line, options.exec_timeout()))
            .await)
    }

    /// 经由跳板主机在目标主机上执行命令（host → bridge → target）
    pub async fn execute_nested(
        &self,
        bridge: &str,
        target: &str,
        command: &str,
        overrides: OptionOverrides,
    ) -> Result<ExecutionResult, SshError> {
        let user = self.resolve_user()?;
        let options = self.compute_options(overrides);
        let line = build_nested_command(&options.render(), &user, bridge, target, command);
        debug!("[Executor] [{} -> {}] exec: {}", bridge, target, command);
        Ok(self
            .run(ProcessRequest::shell(line, options.exec_timeout()))
            .await)
    }

    /// 上传文件到主机
    pub async fn copy_to(
        &self,
        host: &str,
        local_path: &Path,
        remote_path: &str,
        overrides: OptionOverrides,
    ) -> Result<ExecutionResult, SshError> {
        let user = self.resolve_user()?;
        let options = self.compute_scp_options(overrides);
        let line = format!(
            "scp {} {} {}",
            options.render(),
            quote_arg(&local_path.to_string_lossy()),
            quote_arg(&format!("{}@{}:{}", user, host, remote_path))
        );
        debug!(
            "[Executor] [{}] copy {} -> {}",
            host,
            local_path.display(),
            remote_path
        );
        Ok(self
            .run(ProcessRequest::shell(line, options.exec_timeout()))
            .await)
    }

    /// 从主机下载文件
    pub async fn copy_from(
        &self,
        host: &str,
        remote_path: &str,
        local_path: &Path,
        overrides: OptionOverrides,
    ) -> Result<ExecutionResult, SshError> {
        let user = self.resolve_user()?;
        let options = self.compute_scp_options(overrides);
        let line = format!(
            "scp {} {} {}",
            options.render(),
            quote_arg(&format!("{}@{}:{}", user, host, remote_path)),
            quote_arg(&local_path.to_string_lossy())
        );
        debug!(
            "[Executor] [{}] copy {} <- {}",
            host,
            local_path.display(),
            remote_path
        );
        Ok(self
            .run(ProcessRequest::shell(line, options.exec_timeout()))
            .await)
    }

    /// 单次 ping 探测，任何失败都返回 false
    pub async fn is_reachable(&self, host: &str, timeout_secs: u64) -> bool {
        let secs = timeout_secs.max(1);
        let request = ProcessRequest::new(
            "ping",
            vec![
                "-c".to_string(),
                "1".to_string(),
                "-W".to_string(),
                secs.to_string(),
                host.to_string(),
            ],
            Duration::from_secs(secs + 1),
        );
        self.run(request).await.success
    }

    /// 通过执行 echo 检查 SSH 是否可用，任何失败都返回 false
    pub async fn is_ssh_ready(&self, host: &str, overrides: OptionOverrides) -> bool {
        let overrides = OptionOverrides {
            exec_timeout_ms: Some(timeouts::SSH_READY_EXEC_TIMEOUT_MS),
            ..overrides
        };
        match self.execute(host, "echo ready", overrides).await {
            Ok(result) => result.success,
            Err(e) => {
                debug!("[Executor] [{}] SSH readiness check skipped: {}", host, e);
                false
            }
        }
    }

    /// 轮询直到主机可 ping 通且 SSH 可用，或者超过截止时间
    pub async fn wait_for_host(&self, host: &str, timeout: Duration, interval: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            // 先 ping，可达后才尝试 SSH
            let probe = async {
                self.is_reachable(host, timeouts::PING_TIMEOUT_SECS).await
                    && self
                        .is_ssh_ready(
                            host,
                            OptionOverrides::default()
                                .connect_timeout(timeouts::VM_SSH_CONNECT_TIMEOUT_SECS)
                                .quiet(true),
                        )
                        .await
            };
            let ready = tokio::time::timeout_at(deadline, probe)
                .await
                .unwrap_or(false);
            if ready {
                debug!("[Executor] [{}] ready after {} attempt(s)", host, attempt);
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(
                    "[Executor] [{}] not ready after {} attempt(s), giving up",
                    host, attempt
                );
                return false;
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
    }
}
