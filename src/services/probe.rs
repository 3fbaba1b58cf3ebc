// 集群就绪探测

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{FleetReadiness, HostReadiness};

use super::inventory::FleetInventory;
use super::vm::VmCommands;

/// 就绪探测器（由 ensure_vms_running 调用方注入）
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn probe(&self) -> FleetReadiness;
}

/// 并发探测集群中每台主机：先 ping，可达后才检查 SSH
pub struct FleetProbe {
    vms: VmCommands,
    inventory: Arc<dyn FleetInventory>,
}

impl FleetProbe {
    pub fn new(vms: VmCommands, inventory: Arc<dyn FleetInventory>) -> Self {
        Self { vms, inventory }
    }

    async fn probe_host(&self, host: String) -> HostReadiness {
        let reachable = self.vms.is_vm_reachable(&host).await;
        let ssh_ready = reachable && self.vms.is_ssh_ready(&host).await;
        HostReadiness {
            host,
            reachable,
            ssh_ready,
        }
    }
}

#[async_trait]
impl ReadinessProbe for FleetProbe {
    async fn probe(&self) -> FleetReadiness {
        let hosts = self.inventory.all_vms();
        let probes: Vec<_> = hosts
            .into_iter()
            .map(|host| self.probe_host(host))
            .collect();
        FleetReadiness::from_hosts(futures::future::join_all(probes).await)
    }
}
