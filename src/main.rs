mod atlas;
mod http_client;
mod model;

use std::sync::Arc;

use anyhow::Context;
use atlas::credential_manager::CredentialManager;
use atlas::model::auth_info::{AuthInfo, AuthSecret};
use atlas::notify::ConsoleNotifier;
use atlas::refresher::HttpOAuthRefresher;
use atlas::storage::{FileSecretStore, KeychainSecretStore, SecretStore};
use clap::Parser;
use model::arg::{Args, Command};
use model::config::Config;

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // 加载配置
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::error!("加载配置失败: {:#}", e);
        std::process::exit(1);
    });

    // 构建代理配置
    let proxy_config = config.proxy_url.as_ref().map(|url| {
        let mut proxy = http_client::ProxyConfig::new(url);
        if let (Some(username), Some(password)) = (&config.proxy_username, &config.proxy_password) {
            proxy = proxy.with_auth(username, password);
        }
        proxy
    });

    let client = http_client::build_client(proxy_config.as_ref(), config.request_timeout_secs)
        .unwrap_or_else(|e| {
            tracing::error!("创建 HTTP 客户端失败: {}", e);
            std::process::exit(1);
        });

    // 根据配置创建秘密存储后端
    let secret_store = create_secret_store(&config).await;
    let refresher = Arc::new(HttpOAuthRefresher::new(client, config.oauth.clone()));

    let manager = CredentialManager::new(
        secret_store,
        config.keychain_service_name(),
        refresher,
    )
    .with_notifier(Arc::new(ConsoleNotifier));

    let subscription = manager.on_did_auth_change(|event| {
        tracing::info!("认证变更: {:?}", event);
    });

    let exit_code = match run(&manager, args.command).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("{:#}", e);
            1
        }
    };

    // 等待排队中的存储写入落盘
    manager.flush().await;

    for (key, value) in manager.context().snapshot() {
        tracing::debug!("{} = {}", key, value);
    }

    subscription.dispose();
    manager.dispose();

    std::process::exit(exit_code);
}

async fn create_secret_store(config: &Config) -> Option<Arc<dyn SecretStore>> {
    match config.secret_store.as_str() {
        "keychain" => {
            tracing::info!("使用系统钥匙串: {}", config.keychain_service_name());
            Some(Arc::new(KeychainSecretStore::new()) as Arc<dyn SecretStore>)
        }
        "file" => {
            tracing::info!("使用文件存储后端: {}", config.secret_file);
            Some(Arc::new(FileSecretStore::new(&config.secret_file)) as Arc<dyn SecretStore>)
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let Some(pg_config) = config.postgres.as_ref() else {
                tracing::warn!(
                    "secretStore 为 postgres，但未配置 postgres 连接信息，凭据仅保存在内存中"
                );
                return None;
            };

            match atlas::storage::PostgresSecretStore::new(
                &pg_config.database_url,
                &pg_config.table_name,
                pg_config.max_connections,
            )
            .await
            {
                Ok(store) => {
                    tracing::info!("使用 PostgreSQL 存储后端: {}", pg_config.table_name);
                    Some(Arc::new(store) as Arc<dyn SecretStore>)
                }
                Err(e) => {
                    tracing::warn!("连接 PostgreSQL 失败，凭据仅保存在内存中: {}", e);
                    None
                }
            }
        }
        "none" => None,
        other => {
            tracing::warn!("不支持的 secretStore: {}，凭据仅保存在内存中", other);
            None
        }
    }
}

async fn run(manager: &CredentialManager, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Get(site) => {
            let site = site.to_site();
            match manager.get_auth_info(&site).await {
                Some(info) => println!("{}", serde_json::to_string_pretty(&describe(&info))?),
                None => println!("未找到 {} 凭据: {}", site.product, site.host),
            }
        }
        Command::Save { site, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("无法读取凭据文件: {}", file.display()))?;
            let info: AuthInfo = serde_json::from_str(&content)
                .with_context(|| format!("凭据文件格式错误: {}", file.display()))?;
            let site = site.to_site();
            manager.save_auth_info(&site, info).await;
            println!("已保存 {} 凭据: {}", site.product, site.host);
        }
        Command::Remove(site) => {
            // 结果提示由 CredentialManager 的 Notifier 输出
            manager.remove_auth_info(&site.to_site()).await;
        }
        Command::Refresh(site) => {
            let site = site.to_site();
            match manager.refresh_access_token(&site).await? {
                Some(_) => println!("已刷新 {} 访问令牌: {}", site.product, site.host),
                None => println!("无需刷新: 非 OAuth 凭据或站点不支持 OAuth"),
            }
        }
    }
    Ok(())
}

/// 脱敏后的凭据描述
fn describe(info: &AuthInfo) -> serde_json::Value {
    let kind = match &info.secret {
        AuthSecret::Basic { username, .. } => {
            serde_json::json!({ "kind": "basic", "username": username })
        }
        AuthSecret::OAuth { .. } => serde_json::json!({ "kind": "oauth" }),
    };
    serde_json::json!({
        "user": info.user,
        "secret": kind,
        "fingerprint": info.fingerprint(),
    })
}
