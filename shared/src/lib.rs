pub mod block;
pub mod crawler;
pub mod error;
pub mod id;
pub mod log_config;
pub mod point;
pub mod rate_limit;
pub mod retry;
