use std::collections::BTreeSet;
use std::sync::Arc;

use alloy::primitives::Address;
use chain::accounts::{AccountClassifier, AccountKind};
use test_helpers::chain::MockChain;

#[tokio::test]
async fn test_code_decides_the_kind_and_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::new(1));
    let wallet = Address::repeat_byte(1);
    let contract = Address::repeat_byte(2);
    chain.set_code(contract, vec![0x60, 0x80]);
    let classifier = AccountClassifier::new(chain.clone(), dir.path());
    let addresses = BTreeSet::from([wallet, contract]);

    let kinds = classifier.classify(&addresses).await.unwrap();
    let again = classifier.classify(&addresses).await.unwrap();

    assert_eq!(kinds[&wallet], AccountKind::Wallet);
    assert_eq!(kinds[&contract], AccountKind::Contract);
    assert_eq!(again, kinds);
    assert_eq!(chain.code_queries(), 2);

    let cache: serde_json::Value = serde_json::from_slice(
        &std::fs::read(dir.path().join("known_types.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        cache[format!("0x{}", "02".repeat(20))]["type"],
        "contract"
    );
}
