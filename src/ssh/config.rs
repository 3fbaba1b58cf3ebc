// SSH 连接选项
// 每次调用都重新计算，不做缓存

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::timeouts;

use super::escape::quote_arg;

/// 单次调用的选项覆盖（None 表示使用默认值）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 禁止交互式提示
    pub batch_mode: Option<bool>,
    /// 静默模式
    pub quiet: Option<bool>,
    /// 执行超时（毫秒）
    pub exec_timeout_ms: Option<u64>,
}

impl OptionOverrides {
    pub fn connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    pub fn batch_mode(mut self, on: bool) -> Self {
        self.batch_mode = Some(on);
        self
    }

    pub fn quiet(mut self, on: bool) -> Self {
        self.quiet = Some(on);
        self
    }

    pub fn exec_timeout(mut self, ms: u64) -> Self {
        self.exec_timeout_ms = Some(ms);
        self
    }
}

/// 合并默认值与覆盖后的连接选项
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// 连接超时（秒）
    pub connect_timeout_secs: u64,
    /// BatchMode
    pub batch_mode: bool,
    /// -q
    pub quiet: bool,
    /// 执行超时（毫秒）
    pub exec_timeout_ms: u64,
    /// 私钥（仅在当前存在时）
    pub identity_file: Option<PathBuf>,
    /// 解析器提供的基础选项
    pub base: String,
}

impl ConnectionOptions {
    /// 合并默认值：连接超时 10s、BatchMode 开、非静默、执行超时 60s
    pub fn merge(overrides: OptionOverrides, base: String, identity_file: Option<PathBuf>) -> Self {
        Self {
            connect_timeout_secs: overrides
                .connect_timeout_secs
                .unwrap_or(timeouts::CONNECT_TIMEOUT_SECS),
            batch_mode: overrides.batch_mode.unwrap_or(true),
            quiet: overrides.quiet.unwrap_or(false),
            exec_timeout_ms: overrides.exec_timeout_ms.unwrap_or(timeouts::EXEC_TIMEOUT_MS),
            identity_file,
            base,
        }
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_millis(self.exec_timeout_ms)
    }

    /// 渲染为命令行选项字符串
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if !self.base.is_empty() {
            parts.push(self.base.clone());
        }
        // 基础选项里可能已经带了 -i
        if let Some(identity) = &self.identity_file {
            let flag = format!("-i {}", quote_arg(&identity.to_string_lossy()));
            if !self.base.contains(&flag) {
                parts.push(flag);
            }
        }
        parts.push(format!("-o ConnectTimeout={}", self.connect_timeout_secs));
        if self.batch_mode {
            parts.push("-o BatchMode=yes".to_string());
        }
        if self.quiet {
            parts.push("-q".to_string());
        }
        parts.join(" ")
    }
}
