//! 测试用内存秘密存储，记录每次调用顺序

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::SecretStore;

/// 存储调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Get(String),
    Set(String, String),
    Delete(String),
}

#[derive(Default)]
pub struct MemorySecretStore {
    values: Mutex<HashMap<(String, String), String>>,
    ops: Mutex<Vec<StoreOp>>,
    /// 为 true 时所有操作返回错误
    failing: bool,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// 直接写入（不记录调用）
    pub fn insert(&self, service: &str, account: &str, value: &str) {
        self.values
            .lock()
            .insert((service.to_string(), account.to_string()), value.to_string());
    }

    pub fn value(&self, service: &str, account: &str) -> Option<String> {
        self.values
            .lock()
            .get(&(service.to_string(), account.to_string()))
            .cloned()
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().clone()
    }

    pub fn mutations(&self) -> Vec<StoreOp> {
        self.ops()
            .into_iter()
            .filter(|op| !matches!(op, StoreOp::Get(_)))
            .collect()
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.failing {
            anyhow::bail!("secret store offline");
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, service: &str, account: &str) -> anyhow::Result<Option<String>> {
        self.ops.lock().push(StoreOp::Get(account.to_string()));
        self.check()?;
        tokio::task::yield_now().await;
        Ok(self.value(service, account))
    }

    async fn set(&self, service: &str, account: &str, value: &str) -> anyhow::Result<()> {
        self.ops
            .lock()
            .push(StoreOp::Set(account.to_string(), value.to_string()));
        self.check()?;
        tokio::task::yield_now().await;
        self.insert(service, account, value);
        Ok(())
    }

    async fn delete(&self, service: &str, account: &str) -> anyhow::Result<bool> {
        self.ops.lock().push(StoreOp::Delete(account.to_string()));
        self.check()?;
        tokio::task::yield_now().await;
        Ok(self
            .values
            .lock()
            .remove(&(service.to_string(), account.to_string()))
            .is_some())
    }

    fn storage_type(&self) -> &'static str {
        "memory"
    }
}
