// 错误类型定义

use thiserror::Error;

/// 执行层错误类型
///
/// 远程命令失败属于数据（`ExecutionResult`），不走这里；
/// 这里只有环境与配置问题。
#[derive(Debug, Error)]
pub enum SshError {
    /// 配置错误（例如缺少 SSH 用户）
    #[error("Configuration error: {0}")]
    Config(String),
}
