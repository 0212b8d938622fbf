//! 认证变更事件
//!
//! 监听器按注册顺序同步调用；`Subscription` 在 `dispose` 或被丢弃时取消订阅。

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;

use super::model::auth_info::Product;
use super::model::site::DetailedSiteInfo;

/// 认证变更事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AuthChangeEvent {
    /// 站点凭据已更新
    Update { site: DetailedSiteInfo },
    /// 站点凭据已删除
    #[serde(rename_all = "camelCase")]
    Remove {
        product: Product,
        credential_id: String,
    },
}

/// 监听器函数类型
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Listeners<E> {
    next_id: u64,
    entries: Vec<(u64, Listener<E>)>,
}

/// 类型化事件发布器
pub struct EventEmitter<E> {
    listeners: Arc<Mutex<Listeners<E>>>,
}

impl<E: 'static> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// 注册监听器
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let listener: Listener<E> = Arc::new(listener);
        let id = {
            let mut listeners = self.listeners.lock();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, listener));
            id
        };

        let weak: Weak<Mutex<Listeners<E>>> = Arc::downgrade(&self.listeners);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(listeners) = weak.upgrade() {
                    listeners.lock().entries.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// 向当前所有监听器派发事件
    pub fn fire(&self, event: &E) {
        // 先复制监听器列表，允许监听器在回调中取消订阅
        let listeners: Vec<Listener<E>> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }

    /// 移除所有监听器
    pub fn clear(&self) {
        self.listeners.lock().entries.clear();
    }
}

impl<E: 'static> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// 订阅句柄
#[must_use = "丢弃 Subscription 会立即取消订阅"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// 取消订阅
    pub fn dispose(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_in_registration_order() {
        let emitter = EventEmitter::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l1 = log.clone();
        let _s1 = emitter.subscribe(move |e| l1.lock().push(("first", *e)));
        let l2 = log.clone();
        let _s2 = emitter.subscribe(move |e| l2.lock().push(("second", *e)));

        emitter.fire(&7);
        assert_eq!(*log.lock(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_dispose_and_drop_unsubscribe() {
        let emitter = EventEmitter::<u32>::new();
        let count = Arc::new(Mutex::new(0));

        let c1 = count.clone();
        let s1 = emitter.subscribe(move |_| *c1.lock() += 1);
        let c2 = count.clone();
        let s2 = emitter.subscribe(move |_| *c2.lock() += 1);
        assert_eq!(emitter.listener_count(), 2);

        s1.dispose();
        emitter.fire(&1);
        assert_eq!(*count.lock(), 1);

        drop(s2);
        emitter.fire(&1);
        assert_eq!(*count.lock(), 1);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_emitter() {
        let emitter = EventEmitter::<u32>::new();
        let sub = emitter.subscribe(|_| {});
        drop(emitter);
        sub.dispose();
    }

    #[test]
    fn test_remove_event_json() {
        let event = AuthChangeEvent::Remove {
            product: Product::Jira,
            credential_id: "c1".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "remove");
        assert_eq!(json["product"], "jira");
        assert_eq!(json["credentialId"], "c1");
    }
}
