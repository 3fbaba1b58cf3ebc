// 集群配置数据结构

use serde::{Deserialize, Serialize};

// ======================== 主配置结构 ========================

/// 集群设置（持久化用）
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetSettings {
    pub runner: RunnerSettings,
    pub vms: Vec<VmEntry>,
    pub agent: AgentSettings,
}

impl FleetSettings {
    /// 全部虚拟机 IP（按配置顺序）
    pub fn all_ips(&self) -> Vec<String> {
        self.vms.iter().map(|vm| vm.ip.clone()).collect()
    }

    /// 指定角色的虚拟机 IP
    pub fn ips_with_role(&self, role: VmRole) -> Vec<String> {
        self.vms
            .iter()
            .filter(|vm| vm.role == role)
            .map(|vm| vm.ip.clone())
            .collect()
    }
}

// ======================== 虚拟机 ========================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmRole {
    #[default]
    Worker,
    Storage,
    Bridge,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmEntry {
    pub name: String,
    pub ip: String,
    #[serde(default)]
    pub role: VmRole,
}

// ======================== 部署工具 ========================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// 部署工具可执行文件
    pub program: String,
    /// 子命令之前固定追加的参数
    pub base_args: Vec<String>,
    /// 工作目录（为空时使用当前目录）
    pub working_dir: Option<String>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            program: "./scripts/test-vms.sh".to_string(),
            base_args: vec![],
            working_dir: None,
        }
    }
}

// ======================== Agent ========================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// 虚拟机上 agent 的可执行文件名
    pub binary: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            binary: "fleet-agent".to_string(),
        }
    }
}

// ======================== 就绪状态 ========================

/// 单台主机的就绪状态（每次都重新探测，从不缓存）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HostReadiness {
    pub host: String,
    pub reachable: bool,
    pub ssh_ready: bool,
}

impl HostReadiness {
    /// 可 ping 通且 SSH 可执行命令
    pub fn is_ready(&self) -> bool {
        self.reachable && self.ssh_ready
    }
}

/// 集群整体就绪状态
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FleetReadiness {
    pub ready: bool,
    pub per_host: Vec<HostReadiness>,
}

impl FleetReadiness {
    pub fn from_hosts(per_host: Vec<HostReadiness>) -> Self {
        let ready = per_host.iter().all(HostReadiness::is_ready);
        Self { ready, per_host }
    }

    /// 尚未就绪的主机
    pub fn not_ready(&self) -> impl Iterator<Item = &HostReadiness> {
        self.per_host.iter().filter(|h| !h.is_ready())
    }
}
