// 集群成员访问
// 成员通过访问函数提供而不是缓存的集合，两次调用之间成员可以变化

use std::path::PathBuf;

use tracing::warn;

use crate::models::{FleetSettings, VmRole};

use super::storage;

/// 按角色访问集群成员
pub trait FleetInventory: Send + Sync {
    /// 全部虚拟机
    fn all_vms(&self) -> Vec<String>;

    /// 工作节点
    fn worker_vms(&self) -> Vec<String>;

    /// 存储集群节点
    fn storage_vms(&self) -> Vec<String>;

    /// 跳板节点（嵌套执行的默认中转主机）
    fn bridge_vms(&self) -> Vec<String>;
}

/// 每次访问都重新读取设置文件
pub struct SettingsInventory {
    path: PathBuf,
}

impl SettingsInventory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> FleetSettings {
        match storage::load_settings_from(&self.path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("[Fleet] Failed to load inventory: {:#}", e);
                FleetSettings::default()
            }
        }
    }
}

impl FleetInventory for SettingsInventory {
    fn all_vms(&self) -> Vec<String> {
        self.load().all_ips()
    }

    fn worker_vms(&self) -> Vec<String> {
        self.load().ips_with_role(VmRole::Worker)
    }

    fn storage_vms(&self) -> Vec<String> {
        self.load().ips_with_role(VmRole::Storage)
    }

    fn bridge_vms(&self) -> Vec<String> {
        self.load().ips_with_role(VmRole::Bridge)
    }
}

/// 固定成员（程序化调用与测试使用）
#[derive(Clone, Debug, Default)]
pub struct StaticInventory {
    settings: FleetSettings,
}

impl StaticInventory {
    pub fn new(settings: FleetSettings) -> Self {
        Self { settings }
    }
}

impl FleetInventory for StaticInventory {
    fn all_vms(&self) -> Vec<String> {
        self.settings.all_ips()
    }

    fn worker_vms(&self) -> Vec<String> {
        self.settings.ips_with_role(VmRole::Worker)
    }

    fn storage_vms(&self) -> Vec<String> {
        self.settings.ips_with_role(VmRole::Storage)
    }

    fn bridge_vms(&self) -> Vec<String> {
        self.settings.ips_with_role(VmRole::Bridge)
    }
}
