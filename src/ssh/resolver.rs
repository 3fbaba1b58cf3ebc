// 连接配置解析
// 解析数据目录与私钥路径，渲染 ssh / scp 的基础选项字符串

use std::path::PathBuf;

use crate::constants::{env, PRIVATE_KEY_RELATIVE_PATH};

use super::escape::quote_arg;

/// 连接配置解析器
///
/// 每次调用都重新检查文件系统：私钥可能在执行器创建之后才由外部进程生成。
pub trait ConnectionResolver: Send + Sync {
    /// 私钥路径（不保证存在）
    fn private_key_path(&self) -> PathBuf;

    /// 私钥当前是否可用
    fn is_key_available(&self) -> bool {
        self.private_key_path().is_file()
    }

    /// ssh 基础选项
    fn ssh_option_string(&self) -> String;

    /// scp 基础选项
    fn scp_option_string(&self) -> String;
}

/// 数据目录来源（解析顺序：显式覆盖 → CI 临时目录 → 用户主目录）
#[derive(Clone, Debug, Default)]
pub struct DataDirSource {
    pub override_dir: Option<PathBuf>,
    pub ci: bool,
    pub temp_dir: PathBuf,
    pub home_dir: Option<PathBuf>,
}

impl DataDirSource {
    /// 从当前进程环境读取
    pub fn from_env() -> Self {
        let override_dir = std::env::var(env::DATA_DIR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let ci = std::env::var(env::CI)
            .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
            .unwrap_or(false);
        Self {
            override_dir,
            ci,
            temp_dir: std::env::temp_dir(),
            home_dir: dirs::home_dir(),
        }
    }

    /// 解析数据目录
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.override_dir {
            return dir.clone();
        }
        if self.ci {
            return self.temp_dir.join("fleetmaster");
        }
        match &self.home_dir {
            Some(home) => home.join(".fleetmaster"),
            None => self.temp_dir.join("fleetmaster"),
        }
    }
}

/// 基于数据目录的解析器
#[derive(Clone, Debug)]
pub struct DataDirResolver {
    source: DataDirSource,
}

impl DataDirResolver {
    pub fn new(source: DataDirSource) -> Self {
        Self { source }
    }

    pub fn from_env() -> Self {
        Self::new(DataDirSource::from_env())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.source.data_dir()
    }

    /// 关闭主机密钥检查的公共选项，私钥存在时附加 -i
    fn base_options(&self) -> String {
        let mut opts = vec![
            "-o StrictHostKeyChecking=no".to_string(),
            "-o UserKnownHostsFile=/dev/null".to_string(),
            "-o LogLevel=ERROR".to_string(),
        ];
        if self.is_key_available() {
            opts.push(format!(
                "-i {}",
                quote_arg(&self.private_key_path().to_string_lossy())
            ));
        }
        opts.join(" ")
    }
}

impl ConnectionResolver for DataDirResolver {
    fn private_key_path(&self) -> PathBuf {
        self.data_dir().join(PRIVATE_KEY_RELATIVE_PATH)
    }

    fn ssh_option_string(&self) -> String {
        self.base_options()
    }

    fn scp_option_string(&self) -> String {
        self.base_options()
    }
}
