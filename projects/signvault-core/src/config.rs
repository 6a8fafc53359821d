use crate::chains::Chain;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Built-in EVM chain ids. Copied into `ChainDefaults::default()` so a
/// deployment can override per-chain values without touching shared state.
static DEFAULT_CHAIN_IDS: Lazy<HashMap<Chain, u64>> = Lazy::new(|| {
    HashMap::from([
        (Chain::Ethereum, 1),
        (Chain::Polygon, 137),
        (Chain::Bsc, 56),
    ])
});

/// Per-chain numeric defaults used when a transaction leaves them unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChainDefaults {
    pub chain_ids: HashMap<Chain, u64>,
    /// 21000, the plain-transfer gas cost
    pub gas_limit: u64,
    /// 1 gwei
    pub gas_price_wei: u64,
}

impl Default for ChainDefaults {
    fn default() -> Self {
        ChainDefaults {
            chain_ids: DEFAULT_CHAIN_IDS.clone(),
            gas_limit: 21_000,
            gas_price_wei: 1_000_000_000,
        }
    }
}

impl ChainDefaults {
    pub fn chain_id(&self, chain: Chain) -> Option<u64> {
        self.chain_ids.get(&chain).copied()
    }
}

/// Orchestrator configuration, injected at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManagerConfig {
    pub max_associations_per_user: usize,
    pub max_pending_requests_per_user: usize,
    pub signing_request_ttl_seconds: i64,
    pub chain_defaults: ChainDefaults,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            max_associations_per_user: 10,
            max_pending_requests_per_user: 5,
            signing_request_ttl_seconds: 300,
            chain_defaults: ChainDefaults::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.max_associations_per_user, 10);
        assert_eq!(config.max_pending_requests_per_user, 5);
        assert_eq!(config.signing_request_ttl_seconds, 300);
        assert_eq!(config.chain_defaults.chain_id(Chain::Ethereum), Some(1));
        assert_eq!(config.chain_defaults.chain_id(Chain::Polygon), Some(137));
        assert_eq!(config.chain_defaults.chain_id(Chain::Bsc), Some(56));
        assert_eq!(config.chain_defaults.chain_id(Chain::Bitcoin), None);
    }

    #[test]
    fn test_overrides_deserialize() {
        let config: ManagerConfig = serde_json::from_str(
            r#"{"maxPendingRequestsPerUser": 2, "chainDefaults": {"chainIds": {"polygon": 80002}}}"#,
        )
        .unwrap();
        assert_eq!(config.max_pending_requests_per_user, 2);
        assert_eq!(config.max_associations_per_user, 10);
        assert_eq!(config.chain_defaults.chain_id(Chain::Polygon), Some(80002));
    }
}
