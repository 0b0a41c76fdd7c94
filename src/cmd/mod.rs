pub mod batch;
pub mod config;
pub mod import;
pub mod ticket;
