// FleetMaster - 测试虚拟机集群命令行
// 应用入口

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use fleetmaster::constants::timeouts;
use fleetmaster::models::{ExecutionResult, FleetSettings, StartOptions};
use fleetmaster::services::{
    storage, EnsureOptions, FleetInventory, FleetLifecycleManager, FleetProbe, ScriptRunner,
    SettingsInventory, VmCommands,
};
use fleetmaster::ssh::{CommandExecutor, DataDirResolver, OptionOverrides, TokioSpawner};

#[derive(Parser)]
#[command(
    name = "fleetmaster",
    version,
    about = "Remote command execution and lifecycle orchestration for test VM fleets"
)]
struct Cli {
    /// 设置文件路径（默认 FLEET_SETTINGS 或系统配置目录）
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    All,
    Worker,
    Storage,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default settings file if none exists
    Init,
    /// Show provisioning runner status
    Status,
    /// Start the fleet
    Up {
        #[arg(long)]
        force: bool,
        #[arg(long)]
        basic: bool,
        #[arg(long)]
        parallel: bool,
    },
    /// Stop the fleet
    Down,
    /// Force-restart the fleet and verify readiness independently
    Reset,
    /// Wait for fleet hosts to become reachable over SSH
    Wait {
        #[arg(long, value_enum, default_value = "all")]
        role: RoleArg,
        #[arg(long, default_value_t = timeouts::WAIT_FLEET_TIMEOUT_MS / 1000)]
        timeout_secs: u64,
    },
    /// Start the fleet only if it is not already ready
    Ensure {
        #[arg(long)]
        basic: bool,
    },
    /// Run a command on one or more hosts concurrently
    Exec {
        #[arg(required = true)]
        hosts: Vec<String>,
        #[arg(long, default_value_t = timeouts::EXEC_TIMEOUT_MS / 1000)]
        timeout_secs: u64,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Run a command on a target host through a bridge host
    Nested {
        /// Bridge host (defaults to the first `bridge` VM in the settings)
        #[arg(long)]
        bridge: Option<String>,
        target: String,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Copy a local file to a host
    CopyTo {
        host: String,
        local: PathBuf,
        remote: String,
    },
    /// Copy a file from a host
    CopyFrom {
        host: String,
        remote: String,
        local: PathBuf,
    },
    /// Show agent installation status and version on a host
    Agent { host: String },
}

/// 运行期依赖（启动时构造一次，显式传递）
struct App {
    settings_path: PathBuf,
    executor: Arc<CommandExecutor>,
    vms: VmCommands,
    inventory: Arc<dyn FleetInventory>,
    fleet: FleetLifecycleManager,
}

impl App {
    fn build(settings_path: PathBuf) -> Result<Self> {
        let settings = storage::load_settings_from(&settings_path)?;
        let spawner = Arc::new(TokioSpawner);
        let executor = Arc::new(CommandExecutor::new(
            Arc::new(DataDirResolver::from_env()),
            spawner.clone(),
        ));
        let vms = VmCommands::new(executor.clone(), settings.agent.binary.clone());
        let inventory: Arc<dyn FleetInventory> =
            Arc::new(SettingsInventory::new(settings_path.clone()));
        let runner = Arc::new(ScriptRunner::new(spawner, settings.runner.clone()));
        let fleet = FleetLifecycleManager::new(vms.clone(), runner, inventory.clone());

        Ok(Self {
            settings_path,
            executor,
            vms,
            inventory,
            fleet,
        })
    }
}

/// 日志过滤器：使用 RUST_LOG 的指令，未设置或无法解析时为 info
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// 命令行的秒数转换为毫秒（过大的值饱和而不是溢出）
fn secs_to_ms(secs: u64) -> u64 {
    secs.saturating_mul(1000)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("无法序列化输出")?
    );
    Ok(())
}

fn print_execution(result: &ExecutionResult) {
    if !result.stdout.is_empty() {
        print!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr);
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let settings_path = match cli.settings {
        Some(path) => path,
        None => storage::get_settings_file()?,
    };

    if let Commands::Init = cli.command {
        if settings_path.exists() {
            println!("Settings already exist at {}", settings_path.display());
        } else {
            storage::save_settings_to(&settings_path, &FleetSettings::default())?;
            println!("Wrote default settings to {}", settings_path.display());
        }
        return Ok(true);
    }

    let app = App::build(settings_path)?;
    tracing::debug!("Using settings {}", app.settings_path.display());

    let ok = match cli.command {
        Commands::Init => true,
        Commands::Status => {
            let result = app.fleet.get_status().await;
            print_execution(&result);
            result.success
        }
        Commands::Up {
            force,
            basic,
            parallel,
        } => {
            let outcome = app
                .fleet
                .start_vms(StartOptions {
                    force,
                    basic,
                    parallel,
                })
                .await;
            print_json(&outcome)?;
            outcome.success
        }
        Commands::Down => {
            let outcome = app.fleet.stop_vms().await;
            print_json(&outcome)?;
            outcome.success
        }
        Commands::Reset => {
            let outcome = app.fleet.reset_vms().await;
            print_json(&outcome)?;
            outcome.success
        }
        Commands::Wait { role, timeout_secs } => {
            let hosts = match role {
                RoleArg::All => app.inventory.all_vms(),
                RoleArg::Worker => app.inventory.worker_vms(),
                RoleArg::Storage => app.inventory.storage_vms(),
            };
            let outcome = app
                .fleet
                .wait_for_hosts(&hosts, Duration::from_secs(timeout_secs))
                .await;
            print_json(&outcome)?;
            outcome.success
        }
        Commands::Ensure { basic } => {
            let probe = FleetProbe::new(app.vms.clone(), app.inventory.clone());
            let outcome = app
                .fleet
                .ensure_vms_running(EnsureOptions { basic }, &probe)
                .await;
            print_json(&outcome)?;
            outcome.success
        }
        Commands::Exec {
            hosts,
            timeout_secs,
            command,
        } => {
            let command = command.join(" ");
            let results = app
                .vms
                .execute_on_multiple_vms(&hosts, &command, secs_to_ms(timeout_secs))
                .await?;
            print_json(&results)?;
            results.values().all(|r| r.success)
        }
        Commands::Nested {
            bridge,
            target,
            command,
        } => {
            let bridge = match bridge {
                Some(bridge) => bridge,
                None => app
                    .inventory
                    .bridge_vms()
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("没有指定 --bridge，设置中也没有 bridge 角色的虚拟机"))?,
            };
            let result = app
                .executor
                .execute_nested(&bridge, &target, &command.join(" "), OptionOverrides::default())
                .await?;
            print_execution(&result);
            result.success
        }
        Commands::CopyTo {
            host,
            local,
            remote,
        } => {
            let result = app
                .executor
                .copy_to(&host, &local, &remote, OptionOverrides::default())
                .await?;
            print_execution(&result);
            result.success
        }
        Commands::CopyFrom {
            host,
            remote,
            local,
        } => {
            let result = app
                .executor
                .copy_from(&host, &remote, &local, OptionOverrides::default())
                .await?;
            print_execution(&result);
            result.success
        }
        Commands::Agent { host } => {
            let installed = app.vms.is_agent_installed(&host).await;
            let version = if installed {
                app.vms.get_agent_version(&host).await
            } else {
                None
            };
            print_json(&serde_json::json!({
                "host": host,
                "installed": installed,
                "version": version,
            }))?;
            installed
        }
    };

    Ok(ok)
}

fn main() {
    // 初始化日志系统
    // 可以通过 RUST_LOG 环境变量控制日志级别，例如：RUST_LOG=debug fleetmaster status
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(directives.as_deref()))
        .with_target(false) // 不显示 target（模块路径）
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("fleet-worker")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = match runtime.block_on(run(cli)) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            tracing::error!("{:#}", e);
            1
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::*;

    #[test]
    fn test_log_filter_honors_rust_log() {
        assert_eq!(
            log_filter(Some("debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
        assert_eq!(
            log_filter(Some("fleetmaster=trace")).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
    }

    #[test]
    fn test_log_filter_defaults_to_info() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(Some("  ")).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(
            log_filter(Some("fleetmaster=loud")).max_level_hint(),
            Some(LevelFilter::INFO)
        );
    }

    #[test]
    fn test_secs_to_ms_saturates() {
        assert_eq!(secs_to_ms(60), 60_000);
        assert_eq!(secs_to_ms(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_nested_bridge_is_optional() {
        let cli =
            Cli::try_parse_from(["fleetmaster", "nested", "10.0.0.9", "--", "uptime"]).unwrap();
        match cli.command {
            Commands::Nested { bridge, target, .. } => {
                assert_eq!(bridge, None);
                assert_eq!(target, "10.0.0.9");
            }
            _ => panic!("expected nested"),
        }
    }
}
