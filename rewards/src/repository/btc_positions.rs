use anyhow::Context;
use diesel::{
    ExpressionMethods, PgConnection, QueryDsl, RunQueryDsl, SelectableHelper,
};
use orm::btc_positions::BtcStakePositionDb;
use orm::schema::btc_stake_positions;

/// Positions that still carry a stake transaction and are not redeemed.
pub fn unredeemed_positions(
    conn: &mut PgConnection,
) -> anyhow::Result<Vec<BtcStakePositionDb>> {
    btc_stake_positions::table
        .filter(btc_stake_positions::redeemed.eq(false))
        .filter(btc_stake_positions::tx_hash.ne(""))
        .order(btc_stake_positions::id.asc())
        .select(BtcStakePositionDb::as_select())
        .load(conn)
        .context("Failed to query btc stake positions")
}
