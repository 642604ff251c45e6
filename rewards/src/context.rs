use std::sync::Arc;

use alloy::primitives::Address;
use chain::accounts::AccountClassifier;
use chain::crawler::EventCrawler;
use chain::multicall::{Multicall3, MulticallReader};
use chain::rpc::{ChainClient, RpcChainClient};
use chain::stream::EventStream;
use chrono::NaiveTime;
use shared::error::{AsRpcError, MainError};
use snapshot::btc_reward::BtcStakerSource;
use snapshot::exchange_rate::{ExchangeRateSource, HttpExchangeRates};
use snapshot::persister::SnapshotPersister;
use snapshot::submission::{PointSubmitter, SignedHttpSubmitter};

use crate::app_state::AppState;
use crate::config::AppConfig;
use crate::services::db::{PgBtcStakers, PgPointStore};

/// Contract addresses and tunables shared by the pipelines.
#[derive(Debug, Clone)]
pub struct Settings {
    pub dual_core_stream: EventStream,
    pub stake_stream: EventStream,
    pub turn_round_stream: EventStream,
    pub dual_core_token: Address,
    pub asset_onchain: Address,
    pub bitcoin_stake: Address,
    pub marketplace: Address,
    pub vault: Address,
    pub extra_core_stakers: Vec<Address>,
    pub marketplace_multiplier: f64,
    pub dual_core_multiplier: f64,
    /// Earliest UTC time of day the daily snapshot may run.
    pub snapshot_not_before: NaiveTime,
    pub classify_accounts: bool,
}

impl Settings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            dual_core_stream: EventStream::dual_core_transfers(
                config.dual_core_address,
                config.address_window,
            ),
            stake_stream: EventStream::marketplace_stakes(
                config.marketplace_address,
                &config.stake_event_signature,
                config.stake_event_holder_topic,
                config.address_window,
            ),
            turn_round_stream: EventStream::turn_round(
                config.candidate_hub_address,
                config.turn_round_window,
            ),
            dual_core_token: config.dual_core_address,
            asset_onchain: config.asset_onchain_address,
            bitcoin_stake: config.bitcoin_stake_address,
            marketplace: config.marketplace_address,
            vault: config.vault_address,
            extra_core_stakers: config.extra_core_stakers.clone(),
            marketplace_multiplier: config.marketplace_point_multiplier,
            dual_core_multiplier: config.dual_core_point_multiplier,
            snapshot_not_before: NaiveTime::from_num_seconds_from_midnight_opt(
                config.snapshot_delay_minutes.saturating_mul(60),
                0,
            )
            .unwrap_or(NaiveTime::MIN),
            classify_accounts: config.classify_accounts,
        }
    }
}

pub struct AppContext {
    pub chain: Arc<dyn ChainClient>,
    pub crawler: EventCrawler,
    pub reader: MulticallReader,
    pub classifier: AccountClassifier,
    pub persister: SnapshotPersister,
    pub submitter: Arc<dyn PointSubmitter>,
    pub btc_stakers: Arc<dyn BtcStakerSource>,
    pub exchange_rates: Arc<dyn ExchangeRateSource>,
    pub settings: Settings,
}

impl AppContext {
    pub fn from_config(
        config: &AppConfig,
        app_state: AppState,
    ) -> Result<Self, MainError> {
        let rpc = RpcChainClient::new(&config.rpc_url).into_rpc_error()?;
        let aggregator =
            Multicall3::new(rpc.provider(), config.multicall_address);
        let chain: Arc<dyn ChainClient> = Arc::new(rpc);

        let http = reqwest::Client::new();
        let submitter = SignedHttpSubmitter::new(
            http.clone(),
            config.save_point_endpoint.clone(),
            &config.save_point_private_key,
            config.submit_chunk_size,
        )?;

        Ok(Self {
            crawler: EventCrawler::new(chain.clone(), &config.data_dir),
            reader: MulticallReader::new(
                Arc::new(aggregator),
                config.multicall,
            ),
            classifier: AccountClassifier::new(
                chain.clone(),
                &config.data_dir,
            ),
            persister: SnapshotPersister::new(
                Arc::new(PgPointStore::new(app_state.clone())),
                &config.data_dir,
            ),
            submitter: Arc::new(submitter),
            btc_stakers: Arc::new(PgBtcStakers::new(app_state)),
            exchange_rates: Arc::new(HttpExchangeRates::new(
                http,
                config.exchange_rate_url.clone(),
            )),
            settings: Settings::from_config(config),
            chain,
        })
    }
}
