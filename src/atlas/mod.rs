//! Jira / Bitbucket 站点凭据管理

pub mod context;
pub mod credential_manager;
pub mod events;
pub mod model;
pub mod notify;
pub mod queue;
pub mod refresher;
pub mod storage;
