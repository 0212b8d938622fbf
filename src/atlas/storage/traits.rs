//! 秘密存储 trait 定义

use async_trait::async_trait;

/// 秘密存储后端抽象
///
/// 以服务名 + 账户为键的字符串键值存储：系统钥匙串、文件、PostgreSQL 等。
/// 实现不要求自身串行化，调用方（`CredentialManager`）通过队列保证一次只执行一个操作。
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// 读取秘密，不存在时返回 `None`
    async fn get(&self, service: &str, account: &str) -> anyhow::Result<Option<String>>;

    /// 写入秘密（覆盖已有值）
    async fn set(&self, service: &str, account: &str, value: &str) -> anyhow::Result<()>;

    /// 删除秘密
    ///
    /// 返回是否确实删除了一条记录
    async fn delete(&self, service: &str, account: &str) -> anyhow::Result<bool>;

    /// 获取存储类型名称（用于日志）
    fn storage_type(&self) -> &'static str;
}
