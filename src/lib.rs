// FleetMaster - 测试虚拟机集群的远程命令执行与生命周期编排
//
// 自下而上:
// - ssh: 单台主机的命令执行、两跳执行、文件传输与就绪探测
// - services::vm: 面向虚拟机的便捷封装与批量执行
// - services::fleet: 集群级启动 / 停止 / 重置 / 等待

pub mod constants;
pub mod models;
pub mod services;
pub mod ssh;
