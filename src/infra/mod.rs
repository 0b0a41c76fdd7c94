pub mod http;
pub mod jira;
pub mod store;
