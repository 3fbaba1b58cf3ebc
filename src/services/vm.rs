// 虚拟机命令封装
// 在 CommandExecutor 之上提供面向虚拟机的便捷操作，自身不持有状态

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::constants::timeouts;
use crate::models::ExecutionResult;
use crate::ssh::{CommandExecutor, OptionOverrides, SshError};

/// 虚拟机命令封装
#[derive(Clone)]
pub struct VmCommands {
    executor: Arc<CommandExecutor>,
    /// agent 可执行文件名
    agent_binary: String,
}

impl VmCommands {
    /// 创建新的封装
    pub fn new(executor: Arc<CommandExecutor>, agent_binary: impl Into<String>) -> Self {
        Self {
            executor,
            agent_binary: agent_binary.into(),
        }
    }

    /// VM 场景的默认选项：静默 + BatchMode
    fn vm_overrides(timeout_ms: u64) -> OptionOverrides {
        OptionOverrides::default()
            .quiet(true)
            .batch_mode(true)
            .exec_timeout(timeout_ms)
    }

    /// 是否可 ping 通（2 秒）
    pub async fn is_vm_reachable(&self, ip: &str) -> bool {
        self.executor
            .is_reachable(ip, timeouts::PING_TIMEOUT_SECS)
            .await
    }

    /// SSH 是否可用（连接超时 5 秒）
    pub async fn is_ssh_ready(&self, ip: &str) -> bool {
        self.executor
            .is_ssh_ready(
                ip,
                OptionOverrides::default()
                    .connect_timeout(timeouts::VM_SSH_CONNECT_TIMEOUT_SECS)
                    .quiet(true),
            )
            .await
    }

    /// 等待虚拟机就绪（未指定时截止时间为 120 秒）
    pub async fn wait_for_vm(&self, ip: &str, timeout: Option<Duration>) -> bool {
        self.executor
            .wait_for_host(
                ip,
                timeout.unwrap_or(Duration::from_millis(timeouts::WAIT_HOST_TIMEOUT_MS)),
                Duration::from_millis(timeouts::WAIT_HOST_INTERVAL_MS),
            )
            .await
    }

    /// 在虚拟机上执行命令
    pub async fn execute_on_vm(
        &self,
        ip: &str,
        command: &str,
        timeout_ms: u64,
    ) -> Result<ExecutionResult, SshError> {
        self.executor
            .execute(ip, command, Self::vm_overrides(timeout_ms))
            .await
    }

    /// 在多台虚拟机上并发执行同一命令
    ///
    /// 所有主机同时启动后再统一等待；单台失败不影响其他主机。
    /// 只有配置错误（缺少 SSH 用户）会作为 Err 返回。
    pub async fn execute_on_multiple_vms(
        &self,
        ips: &[String],
        command: &str,
        timeout_ms: u64,
    ) -> Result<HashMap<String, ExecutionResult>, SshError> {
        let futures: Vec<_> = ips
            .iter()
            .map(|ip| {
                let ip = ip.clone();
                async move {
                    let result = self.execute_on_vm(&ip, command, timeout_ms).await;
                    (ip, result)
                }
            })
            .collect();

        let results = futures::future::join_all(futures).await;

        let mut by_host = HashMap::with_capacity(results.len());
        for (ip, result) in results {
            let result = result?;
            if !result.success {
                debug!(
                    "[VM] [{}] command failed with exit code {}",
                    ip, result.exit_code
                );
            }
            by_host.insert(ip, result);
        }
        info!(
            "[VM] Executed on {} host(s), {} succeeded",
            by_host.len(),
            by_host.values().filter(|r| r.success).count()
        );
        Ok(by_host)
    }

    /// agent 是否已安装
    pub async fn is_agent_installed(&self, ip: &str) -> bool {
        let command = format!(
            "command -v {bin} 2>/dev/null || which {bin} 2>/dev/null",
            bin = self.agent_binary
        );
        match self
            .execute_on_vm(ip, &command, timeouts::VM_AGENT_PROBE_TIMEOUT_MS)
            .await
        {
            Ok(result) => result.exit_code == 0 && !result.stdout_trimmed().is_empty(),
            Err(e) => {
                debug!("[VM] [{}] agent probe skipped: {}", ip, e);
                false
            }
        }
    }

    /// 查询 agent 版本，依次尝试 `--version` 与 `version`
    pub async fn get_agent_version(&self, ip: &str) -> Option<String> {
        let candidates = [
            format!("{} --version", self.agent_binary),
            format!("{} version", self.agent_binary),
        ];
        for command in &candidates {
            match self
                .execute_on_vm(ip, command, timeouts::VM_AGENT_PROBE_TIMEOUT_MS)
                .await
            {
                Ok(result) if result.success && !result.stdout_trimmed().is_empty() => {
                    return Some(result.stdout_trimmed().to_string());
                }
                Ok(_) => continue,
                Err(e) => {
                    debug!("[VM] [{}] agent version probe skipped: {}", ip, e);
                    return None;
                }
            }
        }
        None
    }
}
