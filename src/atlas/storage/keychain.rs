//! 系统钥匙串存储实现
//!
//! macOS Keychain / Windows Credential Manager / Linux keyutils，经由 `keyring`

use async_trait::async_trait;
use keyring::Entry;

use super::traits::SecretStore;

/// 系统钥匙串存储
#[derive(Debug, Default)]
pub struct KeychainSecretStore;

impl KeychainSecretStore {
    pub fn new() -> Self {
        Self
    }

    /// 在阻塞线程池上执行钥匙串调用
    async fn with_entry<T, F>(service: &str, account: &str, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> keyring::Result<T> + Send + 'static,
    {
        let service = service.to_string();
        let account = account.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &account)?;
            f(entry)
        })
        .await?;
        result.map_err(|e| anyhow::anyhow!("钥匙串访问失败: {}", e))
    }
}

#[async_trait]
impl SecretStore for KeychainSecretStore {
    async fn get(&self, service: &str, account: &str) -> anyhow::Result<Option<String>> {
        Self::with_entry(service, account, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    async fn set(&self, service: &str, account: &str, value: &str) -> anyhow::Result<()> {
        let value = value.to_string();
        Self::with_entry(service, account, move |entry| entry.set_password(&value)).await
    }

    async fn delete(&self, service: &str, account: &str) -> anyhow::Result<bool> {
        Self::with_entry(service, account, |entry| match entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e),
        })
        .await
    }

    fn storage_type(&self) -> &'static str {
        "keychain"
    }
}
