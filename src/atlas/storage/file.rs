//! 文件秘密存储实现
//!
//! 钥匙串不可用时的替代后端，格式: `{"<service>": {"<account>": "<value>"}}`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;

use super::traits::SecretStore;

type SecretFile = BTreeMap<String, BTreeMap<String, String>>;

/// 文件秘密存储
pub struct FileSecretStore {
    /// 秘密文件路径
    path: PathBuf,
}

impl FileSecretStore {
    /// 创建文件存储实例，文件不存在时在首次写入时创建
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_file(path: &Path) -> anyhow::Result<SecretFile> {
        if !path.exists() {
            return Ok(SecretFile::new());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取秘密文件失败: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(SecretFile::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("解析秘密文件失败: {}", path.display()))
    }

    async fn load(&self) -> anyhow::Result<SecretFile> {
        // 使用 spawn_blocking 避免阻塞异步运行时
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::read_file(&path)).await?
    }

    async fn store(&self, secrets: SecretFile) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&secrets)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || std::fs::write(&path, json))
            .await?
            .map_err(|e| anyhow::anyhow!("写入秘密文件失败: {}", e))?;

        tracing::debug!("已回写秘密文件: {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, service: &str, account: &str) -> anyhow::Result<Option<String>> {
        let secrets = self.load().await?;
        Ok(secrets.get(service).and_then(|s| s.get(account)).cloned())
    }

    async fn set(&self, service: &str, account: &str, value: &str) -> anyhow::Result<()> {
        let mut secrets = self.load().await?;
        secrets
            .entry(service.to_string())
            .or_default()
            .insert(account.to_string(), value.to_string());
        self.store(secrets).await
    }

    async fn delete(&self, service: &str, account: &str) -> anyhow::Result<bool> {
        let mut secrets = self.load().await?;
        let removed = secrets
            .get_mut(service)
            .map(|s| s.remove(account).is_some())
            .unwrap_or(false);

        if removed {
            secrets.retain(|_, accounts| !accounts.is_empty());
            self.store(secrets).await?;
        }
        Ok(removed)
    }

    fn storage_type(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_set_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path().join("secrets.json"));

        assert_eq!(store.get("svc", "jira-c1").await.unwrap(), None);

        store.set("svc", "jira-c1", "v1").await.unwrap();
        store.set("svc", "jira-c1", "v2").await.unwrap();
        assert_eq!(store.get("svc", "jira-c1").await.unwrap(), Some("v2".to_string()));
        assert_eq!(store.get("other", "jira-c1").await.unwrap(), None);

        assert!(store.delete("svc", "jira-c1").await.unwrap());
        assert!(!store.delete("svc", "jira-c1").await.unwrap());
        assert_eq!(store.get("svc", "jira-c1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_existing_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"svc": {{"bitbucket-c2": "secret"}}}}"#).unwrap();

        let store = FileSecretStore::new(file.path());
        assert_eq!(
            store.get("svc", "bitbucket-c2").await.unwrap(),
            Some("secret".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_store() {
        let file = NamedTempFile::new().unwrap();
        let store = FileSecretStore::new(file.path());
        assert_eq!(store.get("svc", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        let store = FileSecretStore::new(file.path());
        assert!(store.get("svc", "a").await.is_err());
    }
}
