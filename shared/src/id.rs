use std::str::FromStr;

use alloy::primitives::Address;

/// Lowercase `0x`-prefixed rendering used for every persisted holder.
pub fn holder_id(address: &Address) -> String {
    format!("{address:#x}")
}

pub fn parse_address(value: &str) -> anyhow::Result<Address> {
    Address::from_str(value.trim())
        .map_err(|e| anyhow::anyhow!("Invalid address {}: {}", value, e))
}

pub fn is_participant(address: &Address) -> bool {
    !address.is_zero()
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    #[test]
    fn test_holder_id_is_lowercase() {
        let holder = address!("cd6D74b6852FbeEb1187ec0E231aB91E700eC3BA");

        assert_eq!(
            holder_id(&holder),
            "0xcd6d74b6852fbeeb1187ec0e231ab91e700ec3ba"
        );
    }

    #[test]
    fn test_parse_address_accepts_mixed_case() {
        let parsed =
            parse_address(" 0xee21ab613d30330823D35Cf91A84cE964808B83F ")
                .unwrap();

        assert_eq!(
            holder_id(&parsed),
            "0xee21ab613d30330823d35cf91a84ce964808b83f"
        );
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_zero_address_is_not_a_participant() {
        assert!(!is_participant(&Address::ZERO));
        assert!(is_participant(&Address::repeat_byte(1)));
    }
}
