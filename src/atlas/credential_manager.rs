//! 凭据管理器
//!
//! 内存缓存 + 秘密存储（钥匙串）的读穿/写穿层：
//! - 内存状态对当前会话是权威的，持久化失败只记日志
//! - 所有秘密存储操作经单工作者队列串行执行
//! - 有效变更时派发 `AuthChangeEvent` 并更新已认证上下文

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::AuthContext;
use super::events::{AuthChangeEvent, EventEmitter, Subscription};
use super::model::auth_info::{AuthInfo, Product};
use super::model::site::DetailedSiteInfo;
use super::notify::{AnalyticsClient, LogAnalyticsClient, LogNotifier, Notifier, logged_out_event};
use super::queue::{Priority, TaskHandle, TaskQueue};
use super::refresher::OAuthRefresher;
use super::storage::SecretStore;

type MemStore = HashMap<Product, HashMap<String, AuthInfo>>;

/// 秘密存储中的账户键
fn store_account(product: Product, credential_id: &str) -> String {
    format!("{}-{}", product.key(), credential_id)
}

/// 凭据管理器
pub struct CredentialManager {
    mem_store: RwLock<MemStore>,
    queue: TaskQueue,
    /// `None` 表示当前环境没有可用的秘密存储，仅使用内存
    secret_store: Option<Arc<dyn SecretStore>>,
    service_name: String,
    refresher: Arc<dyn OAuthRefresher>,
    on_did_auth_change: EventEmitter<AuthChangeEvent>,
    context: AuthContext,
    notifier: Arc<dyn Notifier>,
    analytics: Arc<dyn AnalyticsClient>,
}

impl CredentialManager {
    /// 创建凭据管理器（需在 tokio 运行时内调用）
    ///
    /// # Arguments
    /// * `secret_store` - 秘密存储后端，`None` 时退化为纯内存缓存
    /// * `service_name` - 钥匙串服务名
    /// * `refresher` - OAuth 刷新器
    pub fn new(
        secret_store: Option<Arc<dyn SecretStore>>,
        service_name: impl Into<String>,
        refresher: Arc<dyn OAuthRefresher>,
    ) -> Self {
        let mem_store = Product::ALL
            .iter()
            .map(|product| (*product, HashMap::new()))
            .collect();

        match &secret_store {
            Some(store) => tracing::debug!("凭据管理器使用 {} 存储", store.storage_type()),
            None => tracing::info!("秘密存储不可用，凭据仅保存在内存中"),
        }

        Self {
            mem_store: RwLock::new(mem_store),
            queue: TaskQueue::new(),
            secret_store,
            service_name: service_name.into(),
            refresher,
            on_did_auth_change: EventEmitter::new(),
            context: AuthContext::new(),
            notifier: Arc::new(LogNotifier),
            analytics: Arc::new(LogAnalyticsClient),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[cfg(test)]
    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsClient>) -> Self {
        self.analytics = analytics;
        self
    }

    /// 订阅认证变更
    pub fn on_did_auth_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthChangeEvent) + Send + Sync + 'static,
    {
        self.on_did_auth_change.subscribe(listener)
    }

    /// 已认证上下文标志
    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    /// 等待已入队的存储操作全部完成
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// 清空内存缓存并移除所有监听器
    pub fn dispose(&self) {
        self.mem_store.write().values_mut().for_each(HashMap::clear);
        self.on_did_auth_change.clear();
    }

    pub async fn get_auth_info(&self, site: &DetailedSiteInfo) -> Option<AuthInfo> {
        self.get_auth_info_for(site.product, &site.credential_id).await
    }

    /// 查找凭据：先查内存，未命中再读秘密存储
    ///
    /// 存储读取或解析失败均视为未找到
    pub async fn get_auth_info_for(
        &self,
        product: Product,
        credential_id: &str,
    ) -> Option<AuthInfo> {
        if let Some(info) = self.cached(product, credential_id) {
            return Some(info);
        }

        let json = match self.read_from_store(product, credential_id).await {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                tracing::info!("钥匙串读取失败: {}", e);
                return None;
            }
        };

        let info = parse_auth_info(&store_account(product, credential_id), &json)?;

        // 读取期间可能已有新的 save，内存中的值优先
        let mut mem_store = self.mem_store.write();
        let cached = mem_store
            .entry(product)
            .or_default()
            .entry(credential_id.to_string())
            .or_insert(info);
        Some(cached.clone())
    }

    /// 保存凭据
    ///
    /// 内存立即更新；仅当秘密值或用户 id 变化时才写入存储并派发更新事件。
    /// 写入在本方法挂起前入队，之后的 remove 不会越过它。
    pub async fn save_auth_info(&self, site: &DetailedSiteInfo, info: AuthInfo) {
        let old_info = self
            .mem_store
            .write()
            .entry(site.product)
            .or_default()
            .insert(site.credential_id.clone(), info.clone());

        self.persist_saved(site, info, old_info).await;
    }

    /// 内存已更新后的持久化与通知
    ///
    /// 内存中无旧值时，旧值只可能在存储中：读取、比较、写入合并为一个写任务
    async fn persist_saved(
        &self,
        site: &DetailedSiteInfo,
        info: AuthInfo,
        old: Option<AuthInfo>,
    ) {
        if let Some(old) = old {
            if !info.differs_from(&old) {
                tracing::debug!("凭据无变化，跳过持久化: {}", site.host);
                return;
            }
            self.write_to_store(site.product, &site.credential_id, &info);
            self.announce_update(site, &info);
            return;
        }

        let Some(handle) = self.write_if_changed(site.product, &site.credential_id, &info) else {
            self.announce_update(site, &info);
            return;
        };

        let has_new_info = match handle.join().await {
            Ok(has_new_info) => has_new_info,
            Err(e) => {
                tracing::warn!("钥匙串写入任务失败: {}", e);
                false
            }
        };
        if !has_new_info {
            tracing::debug!("凭据无变化，跳过持久化: {}", site.host);
            return;
        }

        // 等待期间已被删除或替换时不再通知
        if self.cached(site.product, &site.credential_id).as_ref() == Some(&info) {
            self.announce_update(site, &info);
        }
    }

    fn announce_update(&self, site: &DetailedSiteInfo, info: &AuthInfo) {
        self.context.set(site.product, !info.is_empty());

        tracing::debug!(
            "已保存 {} 凭据: {} (fingerprint={})",
            site.product,
            site.host,
            info.fingerprint()
        );

        self.on_did_auth_change
            .fire(&AuthChangeEvent::Update { site: site.clone() });
    }

    /// 删除凭据（登出）
    ///
    /// 内存或存储任一处确实删除时返回 true
    pub async fn remove_auth_info(&self, site: &DetailedSiteInfo) -> bool {
        let mem_deleted = self
            .mem_store
            .write()
            .get_mut(&site.product)
            .map(|auths| auths.remove(&site.credential_id).is_some())
            .unwrap_or(false);

        let store_deleted = match self
            .remove_from_store(site.product, &site.credential_id)
            .await
        {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::info!("钥匙串删除失败: {}", e);
                false
            }
        };

        if !(mem_deleted || store_deleted) {
            self.notifier.show_information(&format!(
                "未登录 {}: {}，无需登出",
                site.product.name(),
                site.name
            ));
            return false;
        }

        self.context.set(site.product, false);

        self.on_did_auth_change.fire(&AuthChangeEvent::Remove {
            product: site.product,
            credential_id: site.credential_id.clone(),
        });

        self.notifier.show_information(&format!(
            "已登出 {}: {}",
            site.product.name(),
            site.name
        ));
        self.analytics.send_track_event(logged_out_event(site));

        true
    }

    /// 刷新 OAuth 访问令牌
    ///
    /// 非 OAuth 凭据或站点无 OAuth 提供方时返回 `Ok(None)`，不发起请求。
    /// 刷新失败时错误原样返回，缓存保持不变。
    /// 刷新期间凭据被删除或替换时丢弃新令牌并返回 `Ok(None)`。
    pub async fn refresh_access_token(
        &self,
        site: &DetailedSiteInfo,
    ) -> anyhow::Result<Option<String>> {
        let Some(credentials) = self.get_auth_info(site).await else {
            return Ok(None);
        };
        if !credentials.is_oauth() {
            return Ok(None);
        }
        let Some(refresh_token) = credentials.refresh_token().map(str::to_string) else {
            return Ok(None);
        };
        let Some(provider) = site.oauth_provider() else {
            return Ok(None);
        };

        let new_access_token = self
            .refresher
            .get_new_access_token(provider, &refresh_token)
            .await?;

        let Some(token) = new_access_token else {
            return Ok(None);
        };

        let mut updated = credentials.clone();
        updated.set_access_token(token.as_str());

        let old_info = {
            let mut mem_store = self.mem_store.write();
            let auths = mem_store.entry(site.product).or_default();
            if auths.get(&site.credential_id) != Some(&credentials) {
                None
            } else {
                auths.insert(site.credential_id.clone(), updated.clone())
            }
        };

        let Some(old_info) = old_info else {
            tracing::info!("刷新期间 {} 凭据已变更，丢弃新令牌: {}", site.product, site.host);
            return Ok(None);
        };

        self.persist_saved(site, updated, Some(old_info)).await;
        tracing::info!("已刷新 {} 访问令牌: {}", site.product, site.host);

        Ok(Some(token))
    }

    fn cached(&self, product: Product, credential_id: &str) -> Option<AuthInfo> {
        self.mem_store
            .read()
            .get(&product)
            .and_then(|auths| auths.get(credential_id))
            .cloned()
    }

    async fn read_from_store(
        &self,
        product: Product,
        credential_id: &str,
    ) -> anyhow::Result<Option<String>> {
        let Some(store) = self.secret_store.clone() else {
            return Ok(None);
        };
        let service = self.service_name.clone();
        let account = store_account(product, credential_id);

        self.queue
            .add(Priority::Read, async move { store.get(&service, &account).await })
            .join()
            .await?
    }

    /// 入队写入，不等待完成
    fn write_to_store(&self, product: Product, credential_id: &str, info: &AuthInfo) {
        let Some(store) = self.secret_store.clone() else {
            return;
        };
        let Some(json) = serialize(info) else {
            return;
        };
        let service = self.service_name.clone();
        let account = store_account(product, credential_id);

        // 句柄直接丢弃，任务仍会执行
        let _ = self.queue.add(Priority::Write, async move {
            if let Err(e) = store.set(&service, &account, &json).await {
                tracing::info!("钥匙串写入失败 ({}): {}", account, e);
            }
        });
    }

    /// 入队“读取旧值、比较、有变化则写入”任务，返回是否包含新信息
    ///
    /// 无可用存储时返回 `None`
    fn write_if_changed(
        &self,
        product: Product,
        credential_id: &str,
        info: &AuthInfo,
    ) -> Option<TaskHandle<bool>> {
        let store = self.secret_store.clone()?;
        let service = self.service_name.clone();
        let account = store_account(product, credential_id);
        let info = info.clone();

        let handle = self.queue.add(Priority::Write, async move {
            let previous = match store.get(&service, &account).await {
                Ok(Some(json)) => parse_auth_info(&account, &json),
                Ok(None) => None,
                Err(e) => {
                    tracing::info!("钥匙串读取失败: {}", e);
                    None
                }
            };

            let has_new_info = previous
                .as_ref()
                .map(|previous| info.differs_from(previous))
                .unwrap_or(true);
            if !has_new_info {
                return false;
            }

            if let Some(json) = serialize(&info) {
                if let Err(e) = store.set(&service, &account, &json).await {
                    tracing::info!("钥匙串写入失败 ({}): {}", account, e);
                }
            }
            true
        });
        Some(handle)
    }

    async fn remove_from_store(
        &self,
        product: Product,
        credential_id: &str,
    ) -> anyhow::Result<bool> {
        let Some(store) = self.secret_store.clone() else {
            return Ok(false);
        };
        let service = self.service_name.clone();
        let account = store_account(product, credential_id);

        self.queue
            .add(Priority::Write, async move { store.delete(&service, &account).await })
            .join()
            .await?
    }
}

fn serialize(info: &AuthInfo) -> Option<String> {
    serde_json::to_string(info)
        .map_err(|e| tracing::warn!("凭据序列化失败: {}", e))
        .ok()
}

fn parse_auth_info(account: &str, json: &str) -> Option<AuthInfo> {
    serde_json::from_str(json)
        .map_err(|e| tracing::info!("钥匙串数据格式错误 ({}): {}", account, e))
        .ok()
}
