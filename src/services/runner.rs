// 部署工具调用
// 实际创建 / 销毁虚拟机的外部命令行工具；其输出与退出码对本模块是不透明的

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::models::fleet::RunnerSettings;
use crate::models::ExecutionResult;
use crate::ssh::process::{shape_outcome, ProcessRequest, ProcessSpawner};

/// 部署工具
#[async_trait]
pub trait ProvisioningRunner: Send + Sync {
    /// 执行子命令
    async fn run(&self, subcommand: &[&str], args: &[String], timeout: Duration) -> ExecutionResult {
        self.run_with_env(subcommand, args, &[], timeout).await
    }

    /// 带环境变量覆盖执行子命令
    async fn run_with_env(
        &self,
        subcommand: &[&str],
        args: &[String],
        envs: &[(String, String)],
        timeout: Duration,
    ) -> ExecutionResult;
}

/// 调用配置中的外部程序
pub struct ScriptRunner {
    spawner: Arc<dyn ProcessSpawner>,
    settings: RunnerSettings,
}

impl ScriptRunner {
    pub fn new(spawner: Arc<dyn ProcessSpawner>, settings: RunnerSettings) -> Self {
        Self { spawner, settings }
    }
}

#[async_trait]
impl ProvisioningRunner for ScriptRunner {
    async fn run_with_env(
        &self,
        subcommand: &[&str],
        args: &[String],
        envs: &[(String, String)],
        timeout: Duration,
    ) -> ExecutionResult {
        let mut full_args = self.settings.base_args.clone();
        full_args.extend(subcommand.iter().map(|s| s.to_string()));
        full_args.extend(args.iter().cloned());

        let request = ProcessRequest::new(self.settings.program.clone(), full_args, timeout)
            .with_envs(envs.to_vec())
            .with_working_dir(self.settings.working_dir.as_ref().map(PathBuf::from));
        debug!(
            "[Runner] {} (timeout {}ms, {} env override(s))",
            request.display(),
            request.timeout_ms(),
            envs.len()
        );

        shape_outcome(self.spawner.spawn(request).await)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::process::mock::{not_found, MockSpawner};
    use crate::ssh::process::ProcessOutput;

    #[tokio::test]
    async fn test_script_runner_builds_request() {
        let spawner = Arc::new(MockSpawner::always_ok("vm-1 running"));
        let runner = ScriptRunner::new(
            spawner.clone(),
            RunnerSettings {
                program: "./scripts/test-vms.sh".to_string(),
                base_args: vec!["--inventory".to_string(), "lab".to_string()],
                working_dir: Some("/srv/lab".to_string()),
            },
        );

        let result = runner
            .run_with_env(
                &["up"],
                &["--force".to_string()],
                &[("FLEET_PROVISION_STORAGE_CLUSTER".to_string(), "1".to_string())],
                Duration::from_secs(60),
            )
            .await;
        assert!(result.success);

        let request = &spawner.requests()[0];
        assert_eq!(request.program, "./scripts/test-vms.sh");
        assert_eq!(request.args, vec!["--inventory", "lab", "up", "--force"]);
        assert_eq!(request.envs.len(), 1);
        assert_eq!(request.working_dir, Some(PathBuf::from("/srv/lab")));
        assert_eq!(request.timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_script_runner_shapes_failures() {
        let missing = ScriptRunner::new(
            Arc::new(MockSpawner::new(|_| Err(not_found()))),
            RunnerSettings::default(),
        );
        let result = missing.run(&["status"], &[], Duration::from_secs(30)).await;
        assert_eq!(result.exit_code, 1);
        assert!(!result.success);

        let failing = ScriptRunner::new(
            Arc::new(MockSpawner::new(|_| Ok(ProcessOutput::exit(3, "auth helper unavailable")))),
            RunnerSettings::default(),
        );
        let result = failing.run(&["up"], &[], Duration::from_secs(30)).await;
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stderr, "auth helper unavailable");
    }
}
