//! 用户通知与统计事件
//!
//! 默认实现只写日志，宿主环境可替换为自己的实现

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::model::site::DetailedSiteInfo;

/// 用户可见的提示消息
pub trait Notifier: Send + Sync {
    fn show_information(&self, message: &str);
}

/// 统计事件发送
pub trait AnalyticsClient: Send + Sync {
    fn send_track_event(&self, event: TrackEvent);
}

/// 统计事件
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEvent {
    pub id: Uuid,
    pub action: String,
    pub subject: String,
    pub product: String,
    pub host: String,
    pub timestamp: DateTime<Utc>,
}

/// 登出事件
pub fn logged_out_event(site: &DetailedSiteInfo) -> TrackEvent {
    TrackEvent {
        id: Uuid::new_v4(),
        action: "unauthenticated".to_string(),
        subject: "atlascode".to_string(),
        product: site.product.name().to_string(),
        host: site.host.clone(),
        timestamp: Utc::now(),
    }
}

#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_information(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// 直接输出到终端，供命令行使用
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show_information(&self, message: &str) {
        println!("{}", message);
    }
}

#[derive(Debug, Default)]
pub struct LogAnalyticsClient;

impl AnalyticsClient for LogAnalyticsClient {
    fn send_track_event(&self, event: TrackEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::debug!("统计事件: {}", json),
            Err(e) => tracing::warn!("统计事件序列化失败: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::model::auth_info::Product;

    #[test]
    fn test_logged_out_event() {
        let site = DetailedSiteInfo {
            id: "s1".to_string(),
            name: "Acme".to_string(),
            host: "acme.atlassian.net".to_string(),
            product: Product::Jira,
            is_cloud: true,
            credential_id: "c1".to_string(),
        };

        let event = logged_out_event(&site);
        assert_eq!(event.action, "unauthenticated");
        assert_eq!(event.product, "Jira");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["host"], "acme.atlassian.net");
        assert!(json["timestamp"].is_string());
    }
}
