use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use crate::atlas::model::auth_info::Product;
use crate::atlas::model::site::DetailedSiteInfo;

/// Atlassian 站点凭据管理
#[derive(Parser, Debug)]
#[command(name = "atlas-auth")]
#[command(about = "Jira / Bitbucket 站点凭据缓存与钥匙串同步", long_about = None)]
pub struct Args {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 查看站点凭据（秘密已脱敏）
    Get(SiteArgs),
    /// 从 JSON 文件保存站点凭据
    Save {
        #[command(flatten)]
        site: SiteArgs,
        /// AuthInfo JSON 文件
        #[arg(short, long)]
        file: PathBuf,
    },
    /// 登出站点
    Remove(SiteArgs),
    /// 刷新 OAuth 访问令牌
    Refresh(SiteArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProductArg {
    Jira,
    Bitbucket,
}

impl From<ProductArg> for Product {
    fn from(arg: ProductArg) -> Self {
        match arg {
            ProductArg::Jira => Product::Jira,
            ProductArg::Bitbucket => Product::Bitbucket,
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SiteArgs {
    #[arg(long, value_enum)]
    pub product: ProductArg,

    #[arg(long)]
    pub credential_id: String,

    /// 站点主机名，如 acme.atlassian.net
    #[arg(long)]
    pub host: String,

    /// 站点显示名，默认同主机名
    #[arg(long)]
    pub name: Option<String>,

    /// 是否为 Cloud 站点
    #[arg(long)]
    pub cloud: bool,
}

impl SiteArgs {
    pub fn to_site(&self) -> DetailedSiteInfo {
        DetailedSiteInfo {
            id: self.host.clone(),
            name: self.name.clone().unwrap_or_else(|| self.host.clone()),
            host: self.host.clone(),
            product: self.product.into(),
            is_cloud: self.cloud,
            credential_id: self.credential_id.clone(),
        }
    }
}
