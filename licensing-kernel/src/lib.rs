pub mod alerts;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod licensing;
pub mod models;
pub mod mqtt;
pub mod store;
