//! OAuth 访问令牌刷新

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::model::config::OAuthConfig;

use super::model::site::OAuthProvider;

/// OAuth 刷新器
///
/// 用刷新令牌换取新的访问令牌；网络或提供方错误以 `Err` 返回，不做重试
#[async_trait]
pub trait OAuthRefresher: Send + Sync {
    async fn get_new_access_token(
        &self,
        provider: OAuthProvider,
        refresh_token: &str,
    ) -> anyhow::Result<Option<String>>;
}

/// 提供方默认令牌端点
pub fn default_token_url(provider: OAuthProvider) -> &'static str {
    match provider {
        OAuthProvider::JiraCloud => "https://auth.atlassian.com/oauth/token",
        OAuthProvider::JiraCloudStaging => "https://auth.stg.atlassian.com/oauth/token",
        OAuthProvider::BitbucketCloud => "https://bitbucket.org/site/oauth2/access_token",
        OAuthProvider::BitbucketCloudStaging => {
            "https://staging.bb-inf.net/site/oauth2/access_token"
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// 基于 HTTP 的 OAuth 刷新器
pub struct HttpOAuthRefresher {
    client: Client,
    clients: OAuthConfig,
}

impl HttpOAuthRefresher {
    pub fn new(client: Client, clients: OAuthConfig) -> Self {
        Self { client, clients }
    }
}

#[async_trait]
impl OAuthRefresher for HttpOAuthRefresher {
    async fn get_new_access_token(
        &self,
        provider: OAuthProvider,
        refresh_token: &str,
    ) -> anyhow::Result<Option<String>> {
        let oauth_client = self
            .clients
            .client(provider)
            .with_context(|| format!("未配置 OAuth 客户端: {}", provider))?;

        let url = oauth_client
            .token_url
            .clone()
            .unwrap_or_else(|| default_token_url(provider).to_string());

        let request = match provider {
            OAuthProvider::JiraCloud | OAuthProvider::JiraCloudStaging => {
                self.client.post(&url).json(&serde_json::json!({
                    "grant_type": "refresh_token",
                    "client_id": oauth_client.client_id,
                    "client_secret": oauth_client.client_secret,
                    "refresh_token": refresh_token,
                }))
            }
            OAuthProvider::BitbucketCloud | OAuthProvider::BitbucketCloudStaging => self
                .client
                .post(&url)
                .basic_auth(&oauth_client.client_id, Some(&oauth_client.client_secret))
                .form(&[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                ]),
        };

        tracing::debug!("刷新 OAuth 访问令牌: provider={}", provider);

        let response = request
            .send()
            .await
            .context("发送令牌刷新请求失败")?
            .error_for_status()
            .context("令牌刷新请求被拒绝")?
            .json::<TokenResponse>()
            .await
            .context("解析令牌刷新响应失败")?;

        Ok(response.access_token.filter(|token| !token.is_empty()))
    }
}
