// 集群生命周期管理
//
// 把 "全部启动"、"全部重置" 这类集群级意图转换为部署工具调用 + 独立的就绪验证。
// 单次调用的阶段: InvokingRunner → VerifyingReadiness → Succeeded | Failed

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::constants::{env, timeouts};
use crate::models::{
    EnsureOutcome, ExecutionResult, LifecycleEvent, LifecycleOutcome, LifecyclePhase,
    ResetOutcome, RunnerOutcome, StartOptions,
};

use super::inventory::FleetInventory;
use super::probe::ReadinessProbe;
use super::runner::ProvisioningRunner;
use super::vm::VmCommands;

/// ensure_vms_running 的选项
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnsureOptions {
    pub basic: bool,
}

/// 集群生命周期管理器
pub struct FleetLifecycleManager {
    vms: VmCommands,
    runner: Arc<dyn ProvisioningRunner>,
    inventory: Arc<dyn FleetInventory>,
    /// 事件发送器（可选）
    events: Option<mpsc::UnboundedSender<LifecycleEvent>>,
}

impl FleetLifecycleManager {
    /// 创建新的管理器
    pub fn new(
        vms: VmCommands,
        runner: Arc<dyn ProvisioningRunner>,
        inventory: Arc<dyn FleetInventory>,
    ) -> Self {
        Self {
            vms,
            runner,
            inventory,
            events: None,
        }
    }

    /// 订阅生命周期事件
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<LifecycleEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn emit(&self, event: LifecycleEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn enter(&self, operation: &'static str, phase: LifecyclePhase) {
        debug!("[Fleet] {} -> {}", operation, phase.as_str());
        self.emit(LifecycleEvent::phase(operation, phase));
    }

    /// 查询状态（原样返回部署工具结果）
    pub async fn get_status(&self) -> ExecutionResult {
        self.runner
            .run(
                &["status"],
                &[],
                Duration::from_millis(timeouts::RUNNER_STATUS_TIMEOUT_MS),
            )
            .await
    }

    /// 启动虚拟机，成败只看部署工具退出码
    pub async fn start_vms(&self, options: StartOptions) -> RunnerOutcome {
        self.enter("start", LifecyclePhase::InvokingRunner);
        let result = self
            .runner
            .run(
                &["up"],
                &options.to_args(),
                Duration::from_millis(timeouts::RUNNER_UP_TIMEOUT_MS),
            )
            .await;
        self.finish("start", result)
    }

    /// 停止虚拟机，成败只看部署工具退出码
    pub async fn stop_vms(&self) -> RunnerOutcome {
        self.enter("stop", LifecyclePhase::InvokingRunner);
        let result = self
            .runner
            .run(
                &["down"],
                &[],
                Duration::from_millis(timeouts::RUNNER_DOWN_TIMEOUT_MS),
            )
            .await;
        self.finish("stop", result)
    }

    fn finish(&self, operation: &'static str, result: ExecutionResult) -> RunnerOutcome {
        if result.success {
            self.enter(operation, LifecyclePhase::Succeeded);
        } else {
            warn!(
                "[Fleet] {} failed with exit code {}: {}",
                operation,
                result.exit_code,
                result.stderr.trim()
            );
            self.enter(operation, LifecyclePhase::Failed);
        }
        RunnerOutcome {
            success: result.success,
            stdout: result.stdout,
            stderr: result.stderr,
        }
    }

    /// 并发等待一组主机就绪
    ///
    /// 所有主机共享同一个截止时间；一台超时不会提前中止其他主机的轮询。
    pub async fn wait_for_hosts(&self, hosts: &[String], timeout: Duration) -> LifecycleOutcome {
        let started = Instant::now();
        if hosts.is_empty() {
            warn!("[Fleet] No hosts to wait for");
            return LifecycleOutcome::succeeded("No hosts to wait for")
                .with_duration(started.elapsed());
        }

        info!(
            "[Fleet] Waiting up to {}s for {} host(s)",
            timeout.as_secs(),
            hosts.len()
        );
        let waits: Vec<_> = hosts
            .iter()
            .map(|host| async move {
                let ready = self.vms.wait_for_vm(host, Some(timeout)).await;
                (host.clone(), ready)
            })
            .collect();
        let results = futures::future::join_all(waits).await;

        let mut failed = Vec::new();
        for (host, ready) in results {
            if ready {
                self.emit(LifecycleEvent::HostReady { host });
            } else {
                warn!("[Fleet] [{}] not ready within {}s", host, timeout.as_secs());
                self.emit(LifecycleEvent::HostFailed { host: host.clone() });
                failed.push(host);
            }
        }

        let duration = started.elapsed();
        if failed.is_empty() {
            LifecycleOutcome::succeeded(format!("All {} host(s) ready", hosts.len()))
                .with_duration(duration)
        } else {
            LifecycleOutcome::failed(format!(
                "{} of {} host(s) not ready: {}",
                failed.len(),
                hosts.len(),
                failed.join(", ")
            ))
            .with_failed_hosts(failed)
            .with_duration(duration)
        }
    }

    /// 等待全部虚拟机就绪
    pub async fn wait_for_all_vms(&self, timeout: Duration) -> bool {
        self.wait_for_hosts(&self.inventory.all_vms(), timeout)
            .await
            .success
    }

    /// 等待工作节点就绪
    pub async fn wait_for_worker_vms(&self, timeout: Duration) -> bool {
        self.wait_for_hosts(&self.inventory.worker_vms(), timeout)
            .await
            .success
    }

    /// 等待存储集群节点就绪
    pub async fn wait_for_storage_vms(&self, timeout: Duration) -> bool {
        self.wait_for_hosts(&self.inventory.storage_vms(), timeout)
            .await
            .success
    }

    /// 软重置第一步：调用 `up --force --parallel`
    ///
    /// 存在存储集群节点时追加扩展部署的环境变量，并把超时放宽到 30 分钟。
    pub async fn invoke_reset(&self) -> ExecutionResult {
        self.enter("reset", LifecyclePhase::InvokingRunner);
        let args = StartOptions {
            force: true,
            basic: false,
            parallel: true,
        }
        .to_args();

        let storage = self.inventory.storage_vms();
        let (envs, timeout_ms) = if storage.is_empty() {
            (vec![], timeouts::RUNNER_UP_TIMEOUT_MS)
        } else {
            info!(
                "[Fleet] {} storage-cluster host(s) present, requesting cluster provisioning",
                storage.len()
            );
            (
                vec![(env::PROVISION_STORAGE_CLUSTER.to_string(), "1".to_string())],
                timeouts::RUNNER_STORAGE_RESET_TIMEOUT_MS,
            )
        };

        self.runner
            .run_with_env(&["up"], &args, &envs, Duration::from_millis(timeout_ms))
            .await
    }

    /// 软重置第二步：独立验证全部虚拟机就绪
    pub async fn verify_reset(&self) -> LifecycleOutcome {
        self.enter("reset", LifecyclePhase::VerifyingReadiness);
        self.wait_for_hosts(
            &self.inventory.all_vms(),
            Duration::from_millis(timeouts::WAIT_FLEET_TIMEOUT_MS),
        )
        .await
    }

    /// 软重置
    ///
    /// 部署工具的退出码只作参考：它可能在虚拟机已创建成功时仍报告失败
    /// （例如辅助认证程序不可用）。是否成功以之后的就绪验证为准。
    pub async fn reset_vms(&self) -> ResetOutcome {
        let started = Instant::now();

        let runner_result = self.invoke_reset().await;
        if !runner_result.success {
            warn!(
                "[Fleet] Runner reported exit code {} during reset, verifying VMs anyway: {}",
                runner_result.exit_code,
                runner_result.stderr.trim()
            );
        }

        let verification = self.verify_reset().await;
        let duration = started.elapsed();
        if verification.success {
            info!("[Fleet] Reset complete in {}s", duration.as_secs());
            self.enter("reset", LifecyclePhase::Succeeded);
        } else {
            warn!("[Fleet] Reset failed: {}", verification.message);
            self.enter("reset", LifecyclePhase::Failed);
        }

        ResetOutcome {
            success: verification.success,
            duration,
            runner_exit_code: runner_result.exit_code,
            failed_hosts: verification.failed_hosts.unwrap_or_default(),
        }
    }

    /// 确保虚拟机运行（幂等）
    pub async fn ensure_vms_running(
        &self,
        options: EnsureOptions,
        probe: &dyn ReadinessProbe,
    ) -> EnsureOutcome {
        let readiness = probe.probe().await;
        if readiness.ready {
            info!("[Fleet] All VMs already running");
            return EnsureOutcome {
                success: true,
                was_started: false,
                message: "All VMs already running".to_string(),
            };
        }

        for host in readiness.not_ready() {
            info!(
                "[Fleet] [{}] not ready (reachable: {}, sshReady: {})",
                host.host, host.reachable, host.ssh_ready
            );
        }

        let start = self
            .start_vms(StartOptions {
                basic: options.basic,
                ..Default::default()
            })
            .await;
        if !start.success {
            return EnsureOutcome {
                success: false,
                was_started: false,
                message: format!("Failed to start VMs: {}", start.stderr.trim()),
            };
        }

        self.enter("ensure", LifecyclePhase::VerifyingReadiness);
        let timeout = Duration::from_millis(timeouts::WAIT_FLEET_TIMEOUT_MS);
        if self.wait_for_all_vms(timeout).await {
            self.enter("ensure", LifecyclePhase::Succeeded);
            EnsureOutcome {
                success: true,
                was_started: true,
                message: "VMs started and ready".to_string(),
            }
        } else {
            self.enter("ensure", LifecyclePhase::Failed);
            EnsureOutcome {
                success: false,
                was_started: true,
                message: format!(
                    "VMs started but did not become ready within {}s",
                    timeout.as_secs()
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::models::{FleetReadiness, FleetSettings, HostReadiness, VmEntry, VmRole};
    use crate::services::inventory::StaticInventory;
    use crate::services::runner::mock::MockRunner;
    use crate::ssh::executor::test_support::{executor, request_targets};
    use crate::ssh::process::mock::MockSpawner;
    use crate::ssh::process::ProcessOutput;

    fn settings(vms: &[(&str, VmRole)]) -> FleetSettings {
        let mut settings = FleetSettings::default();
        for (i, (ip, role)) in vms.iter().enumerate() {
            settings.vms.push(VmEntry {
                name: format!("vm-{}", i + 1),
                ip: ip.to_string(),
                role: *role,
            });
        }
        settings
    }

    fn manager(
        spawner: Arc<MockSpawner>,
        runner: Arc<MockRunner>,
        settings: FleetSettings,
    ) -> FleetLifecycleManager {
        let vms = VmCommands::new(Arc::new(executor(spawner)), "fleet-agent");
        FleetLifecycleManager::new(vms, runner, Arc::new(StaticInventory::new(settings)))
    }

    fn all_ready() -> Arc<MockSpawner> {
        Arc::new(MockSpawner::always_ok("ready"))
    }

    fn never_ready() -> Arc<MockSpawner> {
        Arc::new(MockSpawner::new(|_| Ok(ProcessOutput::exit(1, "unreachable"))))
    }

    struct FixedProbe {
        readiness: FleetReadiness,
        calls: AtomicUsize,
    }

    impl FixedProbe {
        fn new(per_host: Vec<HostReadiness>) -> Self {
            Self {
                readiness: FleetReadiness::from_hosts(per_host),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReadinessProbe for FixedProbe {
        async fn probe(&self) -> FleetReadiness {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.readiness.clone()
        }
    }

    fn host(ip: &str, reachable: bool, ssh_ready: bool) -> HostReadiness {
        HostReadiness {
            host: ip.to_string(),
            reachable,
            ssh_ready,
        }
    }

    #[tokio::test]
    async fn test_status_is_passthrough() {
        let runner = Arc::new(MockRunner::exiting(0));
        let manager = manager(all_ready(), runner.clone(), FleetSettings::default());

        let first = manager.get_status().await;
        let second = manager.get_status().await;
        assert_eq!(first.success, second.success);
        assert_eq!(first.exit_code, second.exit_code);

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].subcommand, vec!["status"]);
        assert_eq!(calls[0].timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_start_and_stop_trust_exit_code() {
        let runner = Arc::new(MockRunner::new(|call| {
            let code = if call.subcommand == ["down"] { 2 } else { 0 };
            ExecutionResult::from_exit("out".into(), "err".into(), code)
        }));
        let manager = manager(never_ready(), runner.clone(), FleetSettings::default());

        let started = manager
            .start_vms(StartOptions {
                force: true,
                basic: true,
                parallel: false,
            })
            .await;
        assert!(started.success);
        assert_eq!(started.stdout, "out");

        let stopped = manager.stop_vms().await;
        assert!(!stopped.success);
        assert_eq!(stopped.stderr, "err");

        let calls = runner.calls();
        assert_eq!(calls[0].args, vec!["--force", "--basic"]);
        assert_eq!(calls[0].timeout, Duration::from_secs(600));
        assert_eq!(calls[1].timeout, Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_reports_laggards() {
        let spawner = Arc::new(MockSpawner::new(|req| {
            if request_targets(req, "10.0.0.12") {
                Ok(ProcessOutput::exit(1, "unreachable"))
            } else {
                Ok(ProcessOutput::success("ready"))
            }
        }));
        let manager = manager(
            spawner,
            Arc::new(MockRunner::exiting(0)),
            settings(&[
                ("10.0.0.11", VmRole::Worker),
                ("10.0.0.12", VmRole::Worker),
                ("10.0.0.21", VmRole::Storage),
            ]),
        );

        let hosts = vec!["10.0.0.11".to_string(), "10.0.0.12".to_string()];
        let outcome = manager
            .wait_for_hosts(&hosts, Duration::from_secs(30))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.failed_hosts, Some(vec!["10.0.0.12".to_string()]));

        assert!(manager.wait_for_storage_vms(Duration::from_secs(30)).await);
        assert!(!manager.wait_for_worker_vms(Duration::from_secs(30)).await);
        assert!(!manager.wait_for_all_vms(Duration::from_secs(30)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_keeps_polling_slow_hosts_until_deadline() {
        let started = Instant::now();
        let spawner = Arc::new(MockSpawner::new(move |req| {
            let slow_host_up = request_targets(req, "10.0.0.13")
                && started.elapsed() >= Duration::from_secs(18);
            if slow_host_up {
                Ok(ProcessOutput::success("ready"))
            } else {
                Ok(ProcessOutput::exit(1, "unreachable"))
            }
        }));
        let mut manager = manager(
            spawner.clone(),
            Arc::new(MockRunner::exiting(0)),
            FleetSettings::default(),
        );
        let mut events = manager.subscribe();

        let hosts = vec!["10.0.0.12".to_string(), "10.0.0.13".to_string()];
        let outcome = manager
            .wait_for_hosts(&hosts, Duration::from_secs(30))
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.failed_hosts, Some(vec!["10.0.0.12".to_string()]));
        assert!(outcome.duration.unwrap() >= Duration::from_secs(30));

        let pings_to_slow_host = spawner
            .requests()
            .iter()
            .filter(|r| r.program == "ping" && request_targets(r, "10.0.0.13"))
            .count();
        assert!(pings_to_slow_host >= 4);

        let mut ready = Vec::new();
        let mut failed = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                LifecycleEvent::HostReady { host } => ready.push(host),
                LifecycleEvent::HostFailed { host } => failed.push(host),
                LifecycleEvent::PhaseChanged { .. } => {}
            }
        }
        assert_eq!(ready, vec!["10.0.0.13"]);
        assert_eq!(failed, vec!["10.0.0.12"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_ignores_runner_failure_when_vms_ready() {
        let runner = Arc::new(MockRunner::new(|_| {
            ExecutionResult::from_exit(String::new(), "auth helper unavailable".into(), 1)
        }));
        let manager = manager(
            all_ready(),
            runner.clone(),
            settings(&[("10.0.0.11", VmRole::Worker), ("10.0.0.12", VmRole::Worker)]),
        );

        let outcome = manager.reset_vms().await;
        assert!(outcome.success);
        assert_eq!(outcome.runner_exit_code, 1);
        assert!(outcome.failed_hosts.is_empty());

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].subcommand, vec!["up"]);
        assert_eq!(calls[0].args, vec!["--force", "--parallel"]);
        assert!(calls[0].envs.is_empty());
        assert_eq!(calls[0].timeout, Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_fails_when_vms_never_ready() {
        let manager = manager(
            never_ready(),
            Arc::new(MockRunner::exiting(0)),
            settings(&[("10.0.0.11", VmRole::Worker), ("10.0.0.21", VmRole::Storage)]),
        );

        let outcome = manager.reset_vms().await;
        assert!(!outcome.success);
        assert_eq!(outcome.runner_exit_code, 0);
        assert_eq!(outcome.failed_hosts, vec!["10.0.0.11", "10.0.0.21"]);
        assert!(outcome.duration >= Duration::from_secs(180));
    }

    #[tokio::test]
    async fn test_reset_with_storage_cluster_extends_provisioning() {
        let runner = Arc::new(MockRunner::exiting(0));
        let manager = manager(
            all_ready(),
            runner.clone(),
            settings(&[("10.0.0.11", VmRole::Worker), ("10.0.0.21", VmRole::Storage)]),
        );

        let result = manager.invoke_reset().await;
        assert!(result.success);

        let call = &runner.calls()[0];
        assert_eq!(
            call.envs,
            vec![("FLEET_PROVISION_STORAGE_CLUSTER".to_string(), "1".to_string())]
        );
        assert_eq!(call.timeout, Duration::from_secs(30 * 60));

        let verification = manager.verify_reset().await;
        assert!(verification.success);
    }

    #[tokio::test]
    async fn test_ensure_skips_runner_when_ready() {
        let runner = Arc::new(MockRunner::exiting(0));
        let manager = manager(
            all_ready(),
            runner.clone(),
            settings(&[("10.0.0.11", VmRole::Worker)]),
        );
        let probe = FixedProbe::new(vec![host("10.0.0.11", true, true)]);

        let outcome = manager
            .ensure_vms_running(EnsureOptions::default(), &probe)
            .await;
        assert!(outcome.success);
        assert!(!outcome.was_started);
        assert!(runner.calls().is_empty());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ensure_stops_when_start_fails() {
        let runner = Arc::new(MockRunner::new(|_| {
            ExecutionResult::from_exit(String::new(), "vagrant not found".into(), 127)
        }));
        let spawner = all_ready();
        let manager = manager(
            spawner.clone(),
            runner.clone(),
            settings(&[("10.0.0.11", VmRole::Worker)]),
        );
        let probe = FixedProbe::new(vec![host("10.0.0.11", false, false)]);

        let outcome = manager
            .ensure_vms_running(EnsureOptions { basic: true }, &probe)
            .await;
        assert!(!outcome.success);
        assert!(!outcome.was_started);
        assert!(outcome.message.contains("vagrant not found"));
        assert_eq!(runner.calls()[0].args, vec!["--basic"]);
        // 启动失败后不再等待
        assert!(spawner.requests().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_starts_and_waits() {
        let runner = Arc::new(MockRunner::exiting(0));
        let mut manager = manager(
            all_ready(),
            runner.clone(),
            settings(&[("10.0.0.11", VmRole::Worker)]),
        );
        let mut events = manager.subscribe();
        let probe = FixedProbe::new(vec![host("10.0.0.11", true, false)]);

        let outcome = manager
            .ensure_vms_running(EnsureOptions::default(), &probe)
            .await;
        assert!(outcome.success);
        assert!(outcome.was_started);
        assert_eq!(runner.calls().len(), 1);

        let mut saw_ready = false;
        while let Ok(event) = events.try_recv() {
            if let LifecycleEvent::HostReady { host } = event {
                assert_eq!(host, "10.0.0.11");
                saw_ready = true;
            }
        }
        assert!(saw_ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_started_but_never_ready() {
        let manager = manager(
            never_ready(),
            Arc::new(MockRunner::exiting(0)),
            settings(&[("10.0.0.11", VmRole::Worker)]),
        );
        let probe = FixedProbe::new(vec![host("10.0.0.11", false, false)]);

        let outcome = manager
            .ensure_vms_running(EnsureOptions::default(), &probe)
            .await;
        assert!(!outcome.success);
        assert!(outcome.was_started);
        assert!(outcome.message.contains("did not become ready"));
    }
}
