use alloy::primitives::{keccak256, Address, B256};
use alloy::sol_types::SolEvent;
use shared::block::BlockWindow;
use shared::id::is_participant;

use crate::contracts::{ICandidateHub, IERC20};
use crate::rpc::{EventLog, LogQuery};

pub const DEFAULT_ADDRESS_WINDOW: u64 = 2500;
pub const DEFAULT_TURN_ROUND_WINDOW: u64 = 9999;

/// A logical event stream with its own checkpoint and staging log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStream {
    pub id: String,
    pub contract: Address,
    pub event_signature: B256,
    /// Topic positions holding participant addresses.
    pub participant_topics: Vec<usize>,
    pub window: u64,
    /// Address set the discovered participants are merged into.
    pub address_set: Option<String>,
}

impl EventStream {
    pub fn dual_core_transfers(token: Address, window: u64) -> Self {
        Self {
            id: "dual_core_transfers".to_string(),
            contract: token,
            event_signature: IERC20::Transfer::SIGNATURE_HASH,
            participant_topics: vec![1, 2],
            window,
            address_set: Some("dual_core".to_string()),
        }
    }

    /// `event_signature` is the canonical form, e.g.
    /// `Staked(address,uint256,uint256)`.
    pub fn marketplace_stakes(
        marketplace: Address,
        event_signature: &str,
        holder_topic: usize,
        window: u64,
    ) -> Self {
        Self {
            id: "marketplace_stakes".to_string(),
            contract: marketplace,
            event_signature: keccak256(event_signature.as_bytes()),
            participant_topics: vec![holder_topic],
            window,
            address_set: Some("core_stakers".to_string()),
        }
    }

    pub fn turn_round(candidate_hub: Address, window: u64) -> Self {
        Self {
            id: "turn_round".to_string(),
            contract: candidate_hub,
            event_signature: ICandidateHub::turnedRound::SIGNATURE_HASH,
            participant_topics: vec![],
            window,
            address_set: None,
        }
    }

    pub fn query(&self, window: BlockWindow) -> LogQuery {
        LogQuery {
            address: self.contract,
            event_signature: self.event_signature,
            window,
        }
    }

    /// Non-zero addresses found at the participant topic positions.
    pub fn participants<'a>(
        &'a self,
        log: &'a EventLog,
    ) -> impl Iterator<Item = Address> + 'a {
        self.participant_topics
            .iter()
            .filter_map(|index| log.topic(*index))
            .map(|topic| Address::from_word(*topic))
            .filter(is_participant)
    }
}
