use shared::error::MainError;

use crate::context::AppContext;

/// Discovers core stakers from the marketplace stake events.
pub async fn crawl_stakes(ctx: &AppContext) -> Result<(), MainError> {
    let outcome = ctx.crawler.crawl(&ctx.settings.stake_stream).await?;

    tracing::info!(
        new_stakers = outcome.new_addresses.len(),
        checkpoint = outcome.checkpoint_advanced_to,
        "Core stakers updated"
    );

    if outcome.event_blocks.is_empty() {
        return Err(MainError::NoAction);
    }
    Ok(())
}
