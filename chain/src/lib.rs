pub mod accounts;
pub mod address_set;
pub mod checkpoint;
pub mod contracts;
pub mod crawler;
pub mod multicall;
pub mod rpc;
pub mod staging;
pub mod stream;
mod utils;
