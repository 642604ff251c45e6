pub mod btc_reward;
pub mod core_reward;
pub mod diff;
pub mod exchange_rate;
pub mod persister;
pub mod points;
pub mod reward;
pub mod submission;
