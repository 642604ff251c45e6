pub mod btc_positions;
pub mod migrations;
pub mod points;
pub mod schema;
