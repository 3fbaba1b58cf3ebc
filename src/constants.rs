// 默认超时、轮询间隔与环境变量名常量

pub mod timeouts {
    // 连接选项默认值
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const EXEC_TIMEOUT_MS: u64 = 60_000;

    // 探测
    pub const PING_TIMEOUT_SECS: u64 = 2;
    pub const SSH_READY_EXEC_TIMEOUT_MS: u64 = 10_000;

    // 等待主机就绪
    pub const WAIT_HOST_TIMEOUT_MS: u64 = 120_000;
    pub const WAIT_HOST_INTERVAL_MS: u64 = 5_000;

    // VM 层默认值
    pub const VM_SSH_CONNECT_TIMEOUT_SECS: u64 = 5;
    pub const VM_AGENT_PROBE_TIMEOUT_MS: u64 = 10_000;

    // 集群生命周期
    pub const RUNNER_STATUS_TIMEOUT_MS: u64 = 30_000;
    pub const RUNNER_UP_TIMEOUT_MS: u64 = 10 * 60_000;
    pub const RUNNER_DOWN_TIMEOUT_MS: u64 = 2 * 60_000;
    pub const RUNNER_STORAGE_RESET_TIMEOUT_MS: u64 = 30 * 60_000;
    pub const WAIT_FLEET_TIMEOUT_MS: u64 = 180_000;
}

pub mod env {
    /// SSH 用户名
    pub const SSH_USER: &str = "FLEET_SSH_USER";
    /// 数据目录显式覆盖
    pub const DATA_DIR: &str = "FLEET_DATA_DIR";
    /// CI 环境检测
    pub const CI: &str = "CI";
    /// 设置文件路径覆盖
    pub const SETTINGS: &str = "FLEET_SETTINGS";
    /// 重置时请求扩展存储集群部署
    pub const PROVISION_STORAGE_CLUSTER: &str = "FLEET_PROVISION_STORAGE_CLUSTER";
}

/// 超时被杀死的进程使用的退出码
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// 私钥在数据目录中的相对位置
pub const PRIVATE_KEY_RELATIVE_PATH: &str = "keys/fleet_ed25519";
