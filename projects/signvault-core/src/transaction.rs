use crate::chains::Chain;
use crate::errors::{Result, WalletError};
use serde::{Deserialize, Serialize};

/// Immutable description of an unsigned transaction.
///
/// Amounts are decimal strings in the chain's smallest unit (wei,
/// satoshi) to preserve precision across serialization boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionData {
    pub chain: Chain,
    pub from: String,
    pub to: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
}

impl TransactionData {
    pub fn transfer(chain: Chain, from: &str, to: &str, value: &str) -> Self {
        TransactionData {
            chain,
            from: from.to_string(),
            to: to.to_string(),
            value: value.to_string(),
            data: None,
            nonce: None,
            gas_limit: None,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        }
    }

    pub fn with_data(mut self, data: &str) -> Self {
        self.data = Some(data.to_string());
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: &str) -> Self {
        self.gas_limit = Some(gas_limit.to_string());
        self
    }

    pub fn with_gas_price(mut self, gas_price: &str) -> Self {
        self.gas_price = Some(gas_price.to_string());
        self
    }

    pub fn with_fee_market(mut self, max_fee_per_gas: &str, max_priority_fee_per_gas: &str) -> Self {
        self.max_fee_per_gas = Some(max_fee_per_gas.to_string());
        self.max_priority_fee_per_gas = Some(max_priority_fee_per_gas.to_string());
        self
    }

    /// True when the transaction carries EIP-1559 fee-market pricing
    pub fn uses_fee_market(&self) -> bool {
        self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some()
    }

    /// Check the gas-pricing invariant: legacy OR fee-market, never both,
    /// never a half-filled fee-market pair.
    pub fn validate(&self) -> Result<()> {
        if self.to.is_empty() {
            return Err(WalletError::InvalidTransaction(
                "recipient address is empty".to_string(),
            ));
        }
        if self.value.is_empty() || !self.value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WalletError::InvalidTransaction(format!(
                "value must be a decimal string, got {:?}",
                self.value
            )));
        }
        if self.gas_price.is_some() && self.uses_fee_market() {
            return Err(WalletError::InvalidTransaction(
                "gasPrice and maxFeePerGas/maxPriorityFeePerGas are mutually exclusive".to_string(),
            ));
        }
        if self.max_fee_per_gas.is_some() != self.max_priority_fee_per_gas.is_some() {
            return Err(WalletError::InvalidTransaction(
                "fee-market pricing requires both maxFeePerGas and maxPriorityFeePerGas"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// A signed, broadcast-ready transaction. Produced only by a signer
/// driver - the orchestrator never assembles one itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    raw_transaction: String,
    hash: String,
    transaction: TransactionData,
}

impl SignedTransaction {
    pub(crate) fn new(raw_transaction: String, hash: String, transaction: TransactionData) -> Self {
        SignedTransaction {
            raw_transaction,
            hash,
            transaction,
        }
    }

    /// Hex-encoded wire bytes, `0x`-prefixed
    pub fn raw_transaction(&self) -> &str {
        &self.raw_transaction
    }

    /// Derived transaction identifier
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The transaction this signature was produced for
    pub fn transaction(&self) -> &TransactionData {
        &self.transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_and_fee_market_are_exclusive() {
        let tx = TransactionData::transfer(Chain::Ethereum, "0xaa", "0xbb", "1000")
            .with_gas_price("1000000000")
            .with_fee_market("2000000000", "1000000000");
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_half_filled_fee_market_rejected() {
        let mut tx = TransactionData::transfer(Chain::Ethereum, "0xaa", "0xbb", "1000");
        tx.max_fee_per_gas = Some("2000000000".to_string());
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_plain_transfer_is_valid() {
        let tx = TransactionData::transfer(Chain::Ethereum, "0xaa", "0xbb", "1000");
        assert!(tx.validate().is_ok());

        let tx = tx.with_fee_market("2000000000", "1000000000");
        assert!(tx.validate().is_ok());
        assert!(tx.uses_fee_market());
    }

    #[test]
    fn test_non_decimal_value_rejected() {
        let tx = TransactionData::transfer(Chain::Ethereum, "0xaa", "0xbb", "0x10");
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let tx = TransactionData::transfer(
            Chain::Polygon,
            "0x1111111111111111111111111111111111111111",
            "0x2222222222222222222222222222222222222222",
            "5000000000000000000",
        )
        .with_nonce(7)
        .with_gas_price("30000000000");

        let snapshot = serde_json::to_value(&tx).unwrap();
        assert_eq!(snapshot["chain"], "polygon");
        assert_eq!(snapshot["gasPrice"], "30000000000");
        let back: TransactionData = serde_json::from_value(snapshot).unwrap();
        assert_eq!(back, tx);
    }
}
