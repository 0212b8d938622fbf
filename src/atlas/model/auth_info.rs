//! 认证信息数据模型
//!
//! 每个站点一条 `AuthInfo`，以 `{productKey}-{credentialId}` 为键持久化到钥匙串

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// 产品类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    Jira,
    Bitbucket,
}

impl Product {
    /// 所有已知产品（缓存启动时为每个产品创建空表）
    pub const ALL: [Product; 2] = [Product::Jira, Product::Bitbucket];

    /// 存储键中使用的产品标识
    pub fn key(&self) -> &'static str {
        match self {
            Product::Jira => "jira",
            Product::Bitbucket => "bitbucket",
        }
    }

    /// 展示名称
    pub fn name(&self) -> &'static str {
        match self {
            Product::Jira => "Jira",
            Product::Bitbucket => "Bitbucket",
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 与凭据关联的用户身份
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// 凭据秘密部分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AuthSecret {
    /// 用户名/密码（Server/DC 站点）
    Basic { username: String, password: String },
    /// OAuth 访问令牌 + 刷新令牌
    #[serde(rename = "oauth")]
    OAuth { access: String, refresh: String },
}

impl AuthSecret {
    /// 用于变更检测的秘密值：Basic 取密码，OAuth 取访问令牌
    pub fn value(&self) -> &str {
        match self {
            AuthSecret::Basic { password, .. } => password,
            AuthSecret::OAuth { access, .. } => access,
        }
    }
}

/// 单个站点的认证信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub user: UserInfo,
    pub secret: AuthSecret,
}

impl AuthInfo {
    pub fn basic(user: UserInfo, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user,
            secret: AuthSecret::Basic {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    #[cfg(test)]
    pub fn oauth(user: UserInfo, access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            user,
            secret: AuthSecret::OAuth {
                access: access.into(),
                refresh: refresh.into(),
            },
        }
    }

    /// 登出占位值
    pub fn empty() -> Self {
        Self::basic(UserInfo::default(), "", "")
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    pub fn is_oauth(&self) -> bool {
        matches!(self.secret, AuthSecret::OAuth { .. })
    }

    /// OAuth 记录的刷新令牌
    pub fn refresh_token(&self) -> Option<&str> {
        match &self.secret {
            AuthSecret::OAuth { refresh, .. } => Some(refresh),
            AuthSecret::Basic { .. } => None,
        }
    }

    /// 替换访问令牌，非 OAuth 记录返回 false
    pub fn set_access_token(&mut self, token: impl Into<String>) -> bool {
        match &mut self.secret {
            AuthSecret::OAuth { access, .. } => {
                *access = token.into();
                true
            }
            AuthSecret::Basic { .. } => false,
        }
    }

    /// 相对旧记录是否包含新信息（秘密值或用户 id 变化）
    ///
    /// 仅显示名/邮箱/头像变化不视为新信息
    pub fn differs_from(&self, previous: &AuthInfo) -> bool {
        let same_secret: bool = self
            .secret
            .value()
            .as_bytes()
            .ct_eq(previous.secret.value().as_bytes())
            .into();
        !same_secret || self.user.id != previous.user.id
    }

    /// 秘密值的短指纹，用于日志
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.secret.value().as_bytes());
        hex::encode(&digest[..4])
    }
}
