use async_trait::async_trait;
use crate::error::Result;
use std::path::PathBuf;

/// ResolverManager: 各平台修改系统 DNS 的实现必须实现的接口
///
/// 只接收获胜服务器的地址；失败不会影响已经得到的测速结果。
#[async_trait]
pub trait ResolverManager: Sync + Send {
    /// 平台名称 (如 "linux", "windows")
    fn name(&self) -> &'static str;

    /// 是否需要 Root/管理员 权限
    fn requires_sudo(&self) -> bool;

    /// 获取配置文件的路径 (用于日志显示或备份)
    fn config_path(&self) -> PathBuf;

    /// 获取当前系统使用的 DNS 服务器地址
    /// 返回空列表: 未配置或无法解析
    async fn current_servers(&self) -> Result<Vec<String>>;

    /// 将系统 DNS 切换为给定地址
    /// 实现中必须包含:
    /// 1. 备份原配置 (如果是文件)
    /// 2. 写入新配置
    async fn apply(&self, address: &str) -> Result<()>;

    /// 恢复到上一次的配置 (或默认配置)
    async fn restore(&self) -> Result<()>;
}
