use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use shared::id::holder_id;

use crate::rpc::ChainClient;
use crate::utils::write_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Wallet,
    Contract,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct KnownType {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<AccountKind>,
}

/// Wallet/contract classification through `eth_getCode`, cached in a JSON
/// map since an account kind never changes once known.
pub struct AccountClassifier {
    client: Arc<dyn ChainClient>,
    cache_path: PathBuf,
}

impl AccountClassifier {
    pub fn new(
        client: Arc<dyn ChainClient>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            cache_path: data_dir.into().join("known_types.json"),
        }
    }

    async fn load_cache(
        &self,
    ) -> anyhow::Result<BTreeMap<String, KnownType>> {
        match tokio::fs::read(&self.cache_path).await {
            Ok(raw) => serde_json::from_slice(&raw).with_context(|| {
                format!("Failed to parse {}", self.cache_path.display())
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to read {}", self.cache_path.display())
            }),
        }
    }

    pub async fn classify(
        &self,
        addresses: &BTreeSet<Address>,
    ) -> anyhow::Result<BTreeMap<Address, AccountKind>> {
        let mut cache = self.load_cache().await?;
        let mut kinds = BTreeMap::new();
        let mut fresh = 0;

        for address in addresses {
            let id = holder_id(address);
            let kind = match cache.get(&id).and_then(|known| known.kind) {
                Some(kind) => kind,
                None => {
                    let code = self.client.code(*address).await?;
                    let kind = if code.is_empty() {
                        AccountKind::Wallet
                    } else {
                        AccountKind::Contract
                    };
                    cache.insert(id, KnownType { kind: Some(kind) });
                    fresh += 1;
                    kind
                }
            };
            kinds.insert(*address, kind);
        }

        if fresh > 0 {
            let contents = serde_json::to_vec_pretty(&cache)
                .context("Failed to serialize account kinds")?;
            write_atomic(&self.cache_path, &contents).await?;
            tracing::debug!(fresh, total = cache.len(), "Classified accounts");
        }

        Ok(kinds)
    }
}
