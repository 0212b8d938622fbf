//! 按产品维护的“已认证”命令上下文标志

use std::collections::HashMap;

use parking_lot::RwLock;

use super::model::auth_info::Product;

/// 宿主环境可见的上下文键
pub fn context_key(product: Product) -> &'static str {
    match product {
        Product::Jira => "atlascode:isJiraAuthenticated",
        Product::Bitbucket => "atlascode:isBBAuthenticated",
    }
}

#[derive(Debug, Default)]
pub struct AuthContext {
    flags: RwLock<HashMap<Product, bool>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, product: Product, authenticated: bool) {
        let previous = self.flags.write().insert(product, authenticated);
        if previous != Some(authenticated) {
            tracing::debug!("上下文 {} = {}", context_key(product), authenticated);
        }
    }

    /// 未设置过的产品视为未认证
    pub fn is_authenticated(&self, product: Product) -> bool {
        self.flags.read().get(&product).copied().unwrap_or(false)
    }

    /// 当前所有上下文键值
    pub fn snapshot(&self) -> Vec<(&'static str, bool)> {
        Product::ALL
            .iter()
            .map(|p| (context_key(*p), self.is_authenticated(*p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_per_product() {
        let ctx = AuthContext::new();
        assert!(!ctx.is_authenticated(Product::Jira));

        ctx.set(Product::Jira, true);
        assert!(ctx.is_authenticated(Product::Jira));
        assert!(!ctx.is_authenticated(Product::Bitbucket));

        ctx.set(Product::Jira, false);
        assert_eq!(
            ctx.snapshot(),
            vec![
                ("atlascode:isJiraAuthenticated", false),
                ("atlascode:isBBAuthenticated", false)
            ]
        );
    }
}
