// SSH 执行模块
//
// 模块结构:
// - config: 连接选项 (ConnectionOptions, OptionOverrides)
// - error: 错误类型 (SshError)
// - escape: 远程命令转义与命令行构造
// - executor: 命令执行器 (CommandExecutor)
// - process: 外部进程启动与结果归一化 (ProcessSpawner)
// - resolver: 连接配置解析 (ConnectionResolver)

pub mod config;
pub mod error;
pub mod escape;
pub mod executor;
pub mod process;
pub mod resolver;

// 公开导出
pub use config::{ConnectionOptions, OptionOverrides};
pub use error::SshError;
pub use executor::{CommandExecutor, UserIdentity};
pub use process::{ProcessFailure, ProcessOutput, ProcessRequest, ProcessSpawner, TokioSpawner};
pub use resolver::{ConnectionResolver, DataDirResolver, DataDirSource};
