pub mod btc_positions;
pub mod points;
