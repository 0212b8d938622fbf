use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::atlas::model::site::OAuthProvider;

/// 钥匙串服务名
pub const KEYCHAIN_SERVICE_NAME: &str = "atlascode-authinfoV3";
/// Insiders 版本使用的钥匙串服务名
pub const KEYCHAIN_SERVICE_NAME_INSIDERS: &str = "atlascode-insiders-authinfoV3";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// 秘密存储后端: keychain / file / postgres / none
    #[serde(default = "default_secret_store")]
    pub secret_store: String,

    /// 显式指定钥匙串服务名（覆盖 insiders 推导）
    #[serde(default)]
    pub service_name: Option<String>,

    #[serde(default)]
    pub insiders: bool,

    /// file 后端的秘密文件路径
    #[serde(default = "default_secret_file")]
    pub secret_file: String,

    #[serde(default)]
    pub postgres: Option<PostgresConfig>,

    #[serde(default)]
    pub proxy_url: Option<String>,

    #[serde(default)]
    pub proxy_username: Option<String>,

    #[serde(default)]
    pub proxy_password: Option<String>,

    /// OAuth 刷新请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub oauth: OAuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostgresConfig {
    pub database_url: String,
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// 单个 OAuth 提供方的客户端配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    /// 覆盖默认令牌端点
    #[serde(default)]
    pub token_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConfig {
    #[serde(default)]
    pub jira_cloud: Option<OAuthClientConfig>,
    #[serde(default)]
    pub jira_cloud_staging: Option<OAuthClientConfig>,
    #[serde(default)]
    pub bitbucket_cloud: Option<OAuthClientConfig>,
    #[serde(default)]
    pub bitbucket_cloud_staging: Option<OAuthClientConfig>,
}

impl OAuthConfig {
    pub fn client(&self, provider: OAuthProvider) -> Option<&OAuthClientConfig> {
        match provider {
            OAuthProvider::JiraCloud => self.jira_cloud.as_ref(),
            OAuthProvider::JiraCloudStaging => self.jira_cloud_staging.as_ref(),
            OAuthProvider::BitbucketCloud => self.bitbucket_cloud.as_ref(),
            OAuthProvider::BitbucketCloudStaging => self.bitbucket_cloud_staging.as_ref(),
        }
    }
}

fn default_secret_store() -> String {
    "keychain".to_string()
}

fn default_secret_file() -> String {
    "secrets.json".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_table_name() -> String {
    "atlas_secrets".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret_store: default_secret_store(),
            service_name: None,
            insiders: false,
            secret_file: default_secret_file(),
            postgres: None,
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
            request_timeout_secs: default_request_timeout_secs(),
            oauth: OAuthConfig::default(),
        }
    }
}

impl Config {
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// 从 JSON 文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("配置文件格式错误: {}", path.display()))?;
        Ok(config)
    }

    /// 实际使用的钥匙串服务名
    pub fn keychain_service_name(&self) -> &str {
        match &self.service_name {
            Some(name) if !name.trim().is_empty() => name.as_str(),
            _ if self.insiders => KEYCHAIN_SERVICE_NAME_INSIDERS,
            _ => KEYCHAIN_SERVICE_NAME,
        }
    }
}
