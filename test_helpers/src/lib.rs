pub mod chain;
pub mod db;
pub mod services;
