pub mod app_state;
pub mod config;
pub mod context;
pub mod pipelines;
pub mod repository;
pub mod server;
pub mod services;
