//! Chain support for SignVault signer drivers
//!
//! Pure payload codecs, no device or network I/O: the EVM module encodes
//! RLP transactions, the bitcoin module builds the simplified UTXO payload
//! and derives txids.

pub mod bitcoin;
pub mod ethereum;

use serde::{Deserialize, Serialize};

/// Chains the signing subsystem understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Polygon,
    Bsc,
    Bitcoin,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Polygon => "polygon",
            Chain::Bsc => "bsc",
            Chain::Bitcoin => "bitcoin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ethereum" => Some(Chain::Ethereum),
            "polygon" => Some(Chain::Polygon),
            "bsc" => Some(Chain::Bsc),
            "bitcoin" => Some(Chain::Bitcoin),
            _ => None,
        }
    }

    pub fn is_evm(&self) -> bool {
        matches!(self, Chain::Ethereum | Chain::Polygon | Chain::Bsc)
    }

    /// BIP44 coin type for derivation paths
    pub fn coin_type(&self) -> u32 {
        match self {
            Chain::Ethereum | Chain::Polygon | Chain::Bsc => 60,
            Chain::Bitcoin => 0,
        }
    }

    /// Ticker shown next to amounts in display data
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ETH",
            Chain::Polygon => "MATIC",
            Chain::Bsc => "BNB",
            Chain::Bitcoin => "BTC",
        }
    }

    /// Decimal places of the native unit (wei or satoshi)
    pub fn native_decimals(&self) -> i32 {
        match self {
            Chain::Ethereum | Chain::Polygon | Chain::Bsc => 18,
            Chain::Bitcoin => 8,
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_round_trip() {
        for chain in [Chain::Ethereum, Chain::Polygon, Chain::Bsc, Chain::Bitcoin] {
            assert_eq!(Chain::parse(chain.as_str()), Some(chain));
        }
        assert_eq!(Chain::parse("dogecoin"), None);
    }

    #[test]
    fn test_coin_types() {
        assert_eq!(Chain::Ethereum.coin_type(), 60);
        assert_eq!(Chain::Polygon.coin_type(), 60);
        assert_eq!(Chain::Bitcoin.coin_type(), 0);
    }
}
