pub mod auth_info;
pub mod site;
