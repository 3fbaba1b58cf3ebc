// 本地设置持久化服务

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::env;
use crate::models::FleetSettings;

/// 获取配置目录路径
/// macOS: ~/Library/Application Support/fleetmaster
/// Linux: ~/.config/fleetmaster
/// Windows: C:\Users\<用户名>\AppData\Roaming\fleetmaster
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("无法获取系统配置目录")?
        .join("fleetmaster");
    Ok(config_dir)
}

/// 获取设置文件路径（FLEET_SETTINGS 优先）
pub fn get_settings_file() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(env::SETTINGS) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(get_config_dir()?.join("settings.json"))
}

/// 从指定文件加载集群设置，文件不存在时返回默认值
pub fn load_settings_from(path: &Path) -> Result<FleetSettings> {
    if !path.exists() {
        return Ok(FleetSettings::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("无法读取设置文件 {}", path.display()))?;
    let settings: FleetSettings = serde_json::from_str(&content)
        .with_context(|| format!("无法解析设置文件 {}", path.display()))?;
    Ok(settings)
}

/// 保存集群设置到指定文件
pub fn save_settings_to(path: &Path, settings: &FleetSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).context("无法创建配置目录")?;
        }
    }
    let content = serde_json::to_string_pretty(settings).context("无法序列化设置")?;
    fs::write(path, content).context("无法写入设置文件")?;
    Ok(())
}
