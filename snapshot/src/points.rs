use std::collections::hash_map::Entry;
use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use shared::id::holder_id;
use shared::point::{PointRecord, PointType};

use crate::reward::RewardDelta;

const ETHER: f64 = 1e18;
const RATE_SCALE: f64 = 1e36;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

pub fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .rev()
        .fold(0.0, |acc, limb| acc * TWO_POW_64 + *limb as f64)
}

/// Rounds to 6 decimals, the precision points are stored with.
pub fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

pub fn marketplace_point(delta: U256, multiplier: f64) -> f64 {
    round6(u256_to_f64(delta) / ETHER * multiplier)
}

/// `rate_diff` is the change of the vault exchange rate over the day.
pub fn dual_core_point(amount: U256, rate_diff: f64, multiplier: f64) -> f64 {
    u256_to_f64(amount) * rate_diff / RATE_SCALE * multiplier
}

/// Records of a marketplace snapshot, one per holder in first-seen order.
/// Core and BTC deltas of the same holder are summed. Holders without a
/// positive point are dropped.
pub fn marketplace_records(
    deltas: &[RewardDelta],
    time: DateTime<Utc>,
    multiplier: f64,
) -> Vec<PointRecord> {
    let mut index: HashMap<Address, usize> = HashMap::new();
    let mut totals: Vec<(Address, U256)> = vec![];
    for delta in deltas {
        match index.entry(delta.holder) {
            Entry::Occupied(slot) => {
                let total = &mut totals[*slot.get()].1;
                *total = total.saturating_add(delta.delta);
            }
            Entry::Vacant(slot) => {
                slot.insert(totals.len());
                totals.push((delta.holder, delta.delta));
            }
        }
    }

    totals
        .into_iter()
        .map(|(holder, total)| {
            PointRecord::new(
                holder_id(&holder),
                total.to_string(),
                marketplace_point(total, multiplier),
                PointType::MarketplaceClaimReward,
                time,
            )
        })
        .filter(|record| record.point > 0.0)
        .collect()
}

/// Records of a dual core holding snapshot. Zero balances and `vault` are
/// dropped.
pub fn dual_core_records(
    balances: &[(Address, U256)],
    vault: Address,
    time: DateTime<Utc>,
    rate_diff: f64,
    multiplier: f64,
) -> Vec<PointRecord> {
    balances
        .iter()
        .filter(|(holder, balance)| !balance.is_zero() && *holder != vault)
        .map(|(holder, balance)| {
            PointRecord::new(
                holder_id(holder),
                balance.to_string(),
                dual_core_point(*balance, rate_diff, multiplier),
                PointType::DualCoreSnapshot,
                time,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::reward::RewardKind;

    fn delta(holder: u8, delta: U256) -> RewardDelta {
        RewardDelta {
            holder: Address::repeat_byte(holder),
            kind: RewardKind::Core,
            today: delta,
            yesterday: U256::ZERO,
            delta,
        }
    }

    #[test]
    fn test_u256_conversion() {
        assert_eq!(u256_to_f64(U256::ZERO), 0.0);
        assert_eq!(u256_to_f64(U256::from(300u64)), 300.0);
        assert_eq!(u256_to_f64(U256::from(1u128 << 64)), 2f64.powi(64));
        assert_eq!(
            u256_to_f64(U256::from(1_500_000_000_000_000_000u128)),
            1.5e18
        );
    }

    #[test]
    fn test_marketplace_point_is_rounded_ether() {
        let one_and_a_bit = U256::from(1_234_567_890_123_456_789u128);

        assert_eq!(marketplace_point(one_and_a_bit, 1.0), 1.234568);
        assert_eq!(marketplace_point(one_and_a_bit, 2.0), 2.469136);
        assert_eq!(marketplace_point(U256::from(300), 1.0), 0.0);
    }

    #[test]
    fn test_dual_core_point() {
        let amount = U256::from(2_000_000_000_000_000_000u128);
        let rate_diff = 5e15;

        let point = dual_core_point(amount, rate_diff, 3.0);

        assert!((point - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_dust_rewards_are_dropped() {
        let time = Utc.with_ymd_and_hms(2024, 9, 3, 12, 0, 0).unwrap();
        let deltas = vec![
            delta(1, U256::from(300)),
            delta(2, U256::from(2_000_000_000_000_000_000u128)),
            delta(3, U256::ZERO),
        ];

        let records = marketplace_records(&deltas, time, 1.0);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].holder, holder_id(&Address::repeat_byte(2)));
        assert_eq!(records[0].amount, "2000000000000000000");
        assert_eq!(records[0].point, 2.0);
        assert_eq!(records[0].time, time);
    }

    #[test]
    fn test_core_and_btc_deltas_of_a_holder_are_summed() {
        let time = Utc.with_ymd_and_hms(2024, 9, 3, 12, 0, 0).unwrap();
        let ether = U256::from(1_000_000_000_000_000_000u128);
        let btc = RewardDelta {
            kind: RewardKind::Btc,
            ..delta(1, ether)
        };
        let deltas = vec![delta(1, ether), delta(2, ether), btc];

        let records = marketplace_records(&deltas, time, 1.0);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].holder, holder_id(&Address::repeat_byte(1)));
        assert_eq!(records[0].point, 2.0);
        assert_eq!(records[1].point, 1.0);
    }

    #[test]
    fn test_dual_core_skips_zero_and_vault() {
        let time = Utc.with_ymd_and_hms(2024, 9, 3, 0, 0, 0).unwrap();
        let vault = Address::repeat_byte(0xcd);
        let balances = vec![
            (Address::repeat_byte(1), U256::from(10)),
            (Address::repeat_byte(2), U256::ZERO),
            (vault, U256::from(99)),
        ];

        let records = dual_core_records(&balances, vault, time, 1.0, 1.0);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, PointType::DualCoreSnapshot);
        assert_eq!(records[0].amount, "10");
    }
}
