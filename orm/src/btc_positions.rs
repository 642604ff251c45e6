use diesel::{Queryable, Selectable};
use serde::Serialize;

use crate::schema::btc_stake_positions;

/// Rows are written by the staking service; this indexer only reads them.
#[derive(Serialize, Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = btc_stake_positions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BtcStakePositionDb {
    pub id: i32,
    pub holder: String,
    pub receiver: String,
    pub tx_hash: String,
    pub redeemed: bool,
}
