pub mod api;
pub mod config;
pub mod notifications;
pub mod store;
pub mod types;
