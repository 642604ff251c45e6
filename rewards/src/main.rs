use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use orm::migrations::run_migrations;
use rewards::app_state::AppState;
use rewards::config::AppConfig;
use rewards::context::AppContext;
use rewards::{pipelines, server};
use shared::crawler;
use shared::error::{AsDbError, MainError};

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let config = AppConfig::parse();

    config.log.init();

    let app_state =
        AppState::new(config.database_url.clone(), config.database_pool_size)
            .into_db_error()?;

    let conn = app_state.get_db_connection().await.into_db_error()?;

    // Run migrations
    run_migrations(&conn).await.into_db_error()?;
    drop(conn);

    let context = Arc::new(AppContext::from_config(&config, app_state)?);

    tracing::info!(
        data_dir = %config.data_dir.display(),
        dual_core = %config.dual_core_address,
        marketplace = %config.marketplace_address,
        "Starting reward indexer"
    );

    let stakes = crawler::poll(
        "stake_crawl",
        || {
            let context = context.clone();
            async move { pipelines::crawl_stakes(&context).await }
        },
        Duration::from_secs(config.crawl_interval),
        config.retry,
    );

    let dual_core = crawler::poll(
        "dual_core_snapshot",
        || {
            let context = context.clone();
            async move {
                pipelines::dual_core_snapshot(&context, Utc::now()).await
            }
        },
        Duration::from_secs(config.snapshot_interval),
        config.retry,
    );

    let marketplace = crawler::poll(
        "marketplace_snapshot",
        || {
            let context = context.clone();
            async move { pipelines::marketplace_snapshot(&context).await }
        },
        Duration::from_secs(config.reward_interval),
        config.retry,
    );

    let server = server::serve(context.clone(), config.port);

    let (stakes, dual_core, marketplace, server) =
        tokio::join!(stakes, dual_core, marketplace, server);

    stakes.and(dual_core).and(marketplace).and(server)
}
