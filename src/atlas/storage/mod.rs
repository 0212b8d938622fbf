//! 秘密存储抽象层
//!
//! 支持多种存储后端：
//! - 系统钥匙串（默认）
//! - 文件存储（无钥匙串的环境）
//! - PostgreSQL 存储（可选）
//!
//! # 使用方式
//!
//! ```rust
//! // 钥匙串存储
//! let storage = KeychainSecretStore::new();
//!
//! // 文件存储
//! let storage = FileSecretStore::new("secrets.json");
//!
//! // PostgreSQL 存储（需要启用 postgres feature）
//! #[cfg(feature = "postgres")]
//! let storage = PostgresSecretStore::new("postgres://...", "atlas_secrets", 5).await?;
//! ```

mod file;
mod keychain;
mod traits;

#[cfg(test)]
pub(crate) mod memory;

#[cfg(feature = "postgres")]
mod postgres;

pub use file::FileSecretStore;
pub use keychain::KeychainSecretStore;
pub use traits::SecretStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresSecretStore;
