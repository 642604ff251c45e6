use std::path::PathBuf;

use alloy::primitives::Address;
use chain::multicall::MulticallConfig;
use shared::log_config::LogConfig;
use shared::retry::RetryPolicy;

#[derive(clap::Parser)]
pub struct AppConfig {
    #[clap(long, env)]
    pub rpc_url: String,

    #[clap(long, env)]
    pub database_url: String,

    #[clap(long, env, default_value_t = 8)]
    pub database_pool_size: usize,

    #[clap(
        long,
        env,
        default_value = "volumes",
        help = "Checkpoints, address sets, caches and snapshot dumps"
    )]
    pub data_dir: PathBuf,

    #[clap(long, env)]
    pub dual_core_address: Address,

    #[clap(long, env, help = "Total asset onchain contract")]
    pub asset_onchain_address: Address,

    #[clap(long, env)]
    pub bitcoin_stake_address: Address,

    #[clap(
        long,
        env,
        default_value = "0x04EA61C431F7934d51fEd2aCb2c5F942213f8967"
    )]
    pub marketplace_address: Address,

    #[clap(
        long,
        env,
        default_value = "0x0000000000000000000000000000000000001005"
    )]
    pub candidate_hub_address: Address,

    #[clap(
        long,
        env,
        default_value = "0xcA11bde05977b3631167028862bE2a173976CA11"
    )]
    pub multicall_address: Address,

    #[clap(
        long,
        env,
        default_value = "0xcd6d74b6852fbeeb1187ec0e231ab91e700ec3ba",
        help = "Vault holder excluded from every snapshot"
    )]
    pub vault_address: Address,

    #[clap(
        long,
        env,
        value_delimiter = ',',
        default_value = "0xee21ab613d30330823D35Cf91A84cE964808B83F,\
                         0xcd6D74b6852FbeEb1187ec0E231aB91E700eC3BA",
        help = "Core stakers read in addition to the crawled ones"
    )]
    pub extra_core_stakers: Vec<Address>,

    #[clap(
        long,
        env,
        default_value = "Stake(address,address,uint256,address)",
        help = "Canonical signature of the marketplace stake event"
    )]
    pub stake_event_signature: String,

    #[clap(long, env, default_value_t = 1)]
    pub stake_event_holder_topic: usize,

    #[clap(long, env, default_value_t = 2500)]
    pub address_window: u64,

    #[clap(long, env, default_value_t = 9999)]
    pub turn_round_window: u64,

    #[clap(
        long,
        env,
        default_value_t = 3001,
        help = "Port of the on demand snapshot endpoint"
    )]
    pub port: u16,

    #[clap(long, env, default_value_t = 180, help = "Seconds")]
    pub crawl_interval: u64,

    #[clap(long, env, default_value_t = 120, help = "Seconds")]
    pub snapshot_interval: u64,

    #[clap(long, env, default_value_t = 300, help = "Seconds")]
    pub reward_interval: u64,

    #[clap(
        long,
        env,
        default_value_t = 21,
        help = "Minutes after UTC midnight before the daily snapshot runs"
    )]
    pub snapshot_delay_minutes: u32,

    #[clap(
        long,
        env,
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Classify dual core holders as wallets or contracts"
    )]
    pub classify_accounts: bool,

    #[clap(long, env, default_value_t = 1.0)]
    pub marketplace_point_multiplier: f64,

    #[clap(long, env, default_value_t = 1.0)]
    pub dual_core_point_multiplier: f64,

    #[clap(
        long,
        env,
        default_value = "https://api.b14g.xyz/restake/vault/apy-chart"
    )]
    pub exchange_rate_url: String,

    #[clap(long, env)]
    pub save_point_endpoint: String,

    #[clap(long, env, hide_env_values = true)]
    pub save_point_private_key: String,

    #[clap(long, env, default_value_t = 100)]
    pub submit_chunk_size: usize,

    #[clap(flatten)]
    pub multicall: MulticallConfig,

    #[clap(flatten)]
    pub retry: RetryPolicy,

    #[clap(flatten)]
    pub log: LogConfig,
}
