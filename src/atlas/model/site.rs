//! 站点信息

use serde::{Deserialize, Serialize};

use super::auth_info::Product;

/// OAuth 提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OAuthProvider {
    JiraCloud,
    JiraCloudStaging,
    BitbucketCloud,
    BitbucketCloudStaging,
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OAuthProvider::JiraCloud => "jiracloud",
            OAuthProvider::JiraCloudStaging => "jiracloudstaging",
            OAuthProvider::BitbucketCloud => "bbcloud",
            OAuthProvider::BitbucketCloudStaging => "bbcloudstaging",
        };
        f.write_str(name)
    }
}

/// 已认证站点的完整描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedSiteInfo {
    pub id: String,
    pub name: String,
    pub host: String,
    pub product: Product,
    pub is_cloud: bool,
    pub credential_id: String,
}

impl DetailedSiteInfo {
    /// 站点对应的 OAuth 提供方，Server/DC 站点返回 None
    pub fn oauth_provider(&self) -> Option<OAuthProvider> {
        if !self.is_cloud {
            return None;
        }

        let provider = match self.product {
            Product::Jira if self.host.ends_with("jira-dev.com") => OAuthProvider::JiraCloudStaging,
            Product::Jira => OAuthProvider::JiraCloud,
            Product::Bitbucket if self.host.contains("bb-inf.net") => {
                OAuthProvider::BitbucketCloudStaging
            }
            Product::Bitbucket => OAuthProvider::BitbucketCloud,
        };
        Some(provider)
    }
}
