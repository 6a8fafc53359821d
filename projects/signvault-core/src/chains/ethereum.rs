//! EVM transaction payload encoding
//!
//! Builds the RLP payloads hardware devices sign for EVM-style chains:
//! legacy EIP-155 lists and `0x02`-tagged EIP-1559 envelopes, plus the
//! signed re-serialization and keccak256 hash derivation.

use crate::config::ChainDefaults;
use crate::transaction::TransactionData;
use anyhow::{anyhow, bail, Context, Result};
use ethereum_types::{Address, U256};
use ethers_core::utils::{format_units, keccak256};
use rlp::RlpStream;

/// Transaction type tag for EIP-1559 fee-market envelopes
pub const EIP1559_TX_TYPE: u8 = 0x02;

/// Fee pricing for an EVM transaction
#[derive(Debug, Clone, PartialEq)]
pub enum FeeParams {
    Legacy {
        gas_price: U256,
    },
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

/// Numeric view of a `TransactionData` with chain defaults applied
#[derive(Debug, Clone)]
pub struct EvmTxParams {
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub gas_limit: U256,
    pub fee: FeeParams,
}

impl EvmTxParams {
    /// Normalize a transaction for encoding. Unset gas fields take the
    /// configured defaults; the fee style follows the populated fields.
    pub fn from_transaction(tx: &TransactionData, defaults: &ChainDefaults) -> Result<Self> {
        if !tx.chain.is_evm() {
            bail!("{} is not an EVM chain", tx.chain);
        }
        let chain_id = defaults
            .chain_id(tx.chain)
            .ok_or_else(|| anyhow!("no chain id configured for {}", tx.chain))?;

        let to = parse_address(&tx.to)?;
        let value = parse_decimal(&tx.value).context("invalid value")?;
        let data = match tx.data.as_deref() {
            Some(raw) => decode_hex(raw).context("invalid call data")?,
            None => Vec::new(),
        };
        let gas_limit = match tx.gas_limit.as_deref() {
            Some(raw) => parse_decimal(raw).context("invalid gas limit")?,
            None => U256::from(defaults.gas_limit),
        };

        let fee = if tx.uses_fee_market() {
            let max_fee = tx
                .max_fee_per_gas
                .as_deref()
                .ok_or_else(|| anyhow!("missing maxFeePerGas"))?;
            let max_priority = tx
                .max_priority_fee_per_gas
                .as_deref()
                .ok_or_else(|| anyhow!("missing maxPriorityFeePerGas"))?;
            FeeParams::Eip1559 {
                max_fee_per_gas: parse_decimal(max_fee).context("invalid maxFeePerGas")?,
                max_priority_fee_per_gas: parse_decimal(max_priority)
                    .context("invalid maxPriorityFeePerGas")?,
            }
        } else {
            let gas_price = match tx.gas_price.as_deref() {
                Some(raw) => parse_decimal(raw).context("invalid gasPrice")?,
                None => U256::from(defaults.gas_price_wei),
            };
            FeeParams::Legacy { gas_price }
        };

        Ok(EvmTxParams {
            chain_id,
            nonce: tx.nonce.unwrap_or(0),
            to,
            value,
            data,
            gas_limit,
            fee,
        })
    }
}

/// RLP-encode the unsigned payload a device signs.
///
/// Legacy transactions use the nine-item EIP-155 list (chain id and two
/// empty placeholders in the signature slots); fee-market transactions
/// use the `0x02`-tagged typed envelope with an empty access list.
pub fn encode_unsigned(params: &EvmTxParams) -> Vec<u8> {
    match &params.fee {
        FeeParams::Legacy { gas_price } => {
            let mut stream = RlpStream::new_list(9);
            stream.append(&params.nonce);
            append_u256(&mut stream, *gas_price);
            append_u256(&mut stream, params.gas_limit);
            stream.append(&params.to.as_bytes().to_vec());
            append_u256(&mut stream, params.value);
            stream.append(&params.data);
            stream.append(&params.chain_id);
            stream.append(&0u8);
            stream.append(&0u8);
            stream.out().to_vec()
        }
        FeeParams::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let mut stream = RlpStream::new_list(9);
            stream.append(&params.chain_id);
            stream.append(&params.nonce);
            append_u256(&mut stream, *max_priority_fee_per_gas);
            append_u256(&mut stream, *max_fee_per_gas);
            append_u256(&mut stream, params.gas_limit);
            stream.append(&params.to.as_bytes().to_vec());
            append_u256(&mut stream, params.value);
            stream.append(&params.data);
            stream.begin_list(0);
            let mut out = vec![EIP1559_TX_TYPE];
            out.extend_from_slice(&stream.out());
            out
        }
    }
}

/// Components of a 65-byte compact ECDSA signature
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureParts {
    pub r: Vec<u8>,
    pub s: Vec<u8>,
    pub v: u8,
}

impl SignatureParts {
    /// Re-serialize to the compact `r || s || v` hex layout
    pub fn to_compact_hex(&self) -> String {
        format!(
            "0x{}{}{:02x}",
            hex::encode(&self.r),
            hex::encode(&self.s),
            self.v
        )
    }
}

/// Parse a compact `r || s || v` signature: 130 hex characters after an
/// optional `0x` prefix.
pub fn parse_compact_signature(signature: &str) -> Result<SignatureParts> {
    let stripped = signature.strip_prefix("0x").unwrap_or(signature);
    if stripped.len() != 130 {
        bail!(
            "compact signature must be 130 hex characters, got {}",
            stripped.len()
        );
    }
    let bytes = hex::decode(stripped).context("signature is not valid hex")?;
    Ok(SignatureParts {
        r: bytes[0..32].to_vec(),
        s: bytes[32..64].to_vec(),
        v: bytes[64],
    })
}

/// Reduce any of the common `v` conventions (0/1, 27/28, EIP-155) to the
/// recovery parity bit.
pub fn recovery_parity(v: u8) -> u8 {
    match v {
        27 | 28 => v - 27,
        v if v >= 35 => ((v as u16 - 35) % 2) as u8,
        v => v & 1,
    }
}

/// Re-serialize the full signed transaction from the unsigned params and
/// the device's signature components.
pub fn encode_signed(params: &EvmTxParams, sig: &SignatureParts) -> Vec<u8> {
    let parity = recovery_parity(sig.v);
    match &params.fee {
        FeeParams::Legacy { gas_price } => {
            let v = params.chain_id * 2 + 35 + parity as u64;
            let mut stream = RlpStream::new_list(9);
            stream.append(&params.nonce);
            append_u256(&mut stream, *gas_price);
            append_u256(&mut stream, params.gas_limit);
            stream.append(&params.to.as_bytes().to_vec());
            append_u256(&mut stream, params.value);
            stream.append(&params.data);
            stream.append(&v);
            append_trimmed(&mut stream, &sig.r);
            append_trimmed(&mut stream, &sig.s);
            stream.out().to_vec()
        }
        FeeParams::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let mut stream = RlpStream::new_list(12);
            stream.append(&params.chain_id);
            stream.append(&params.nonce);
            append_u256(&mut stream, *max_priority_fee_per_gas);
            append_u256(&mut stream, *max_fee_per_gas);
            append_u256(&mut stream, params.gas_limit);
            stream.append(&params.to.as_bytes().to_vec());
            append_u256(&mut stream, params.value);
            stream.append(&params.data);
            stream.begin_list(0);
            stream.append(&parity);
            append_trimmed(&mut stream, &sig.r);
            append_trimmed(&mut stream, &sig.s);
            let mut out = vec![EIP1559_TX_TYPE];
            out.extend_from_slice(&stream.out());
            out
        }
    }
}

/// keccak256 of the serialized wire bytes, `0x`-prefixed
pub fn transaction_hash(raw: &[u8]) -> String {
    format!("0x{}", hex::encode(keccak256(raw)))
}

/// Human-readable projection of an EVM transaction for device screens.
///
/// Amounts are exact unit conversions of what gets signed - formatting
/// must not add or drop precision.
pub fn display_data(tx: &TransactionData, params: &EvmTxParams) -> serde_json::Value {
    let mut fields = serde_json::json!({
        "chain": tx.chain.as_str(),
        "from": tx.from,
        "to": tx.to,
        "amount": format_amount(params.value, tx.chain.native_decimals(), tx.chain.native_symbol()),
        "nonce": params.nonce,
        "gasLimit": params.gas_limit.to_string(),
    });
    match &params.fee {
        FeeParams::Legacy { gas_price } => {
            fields["gasPrice"] = format_amount(*gas_price, 9, "gwei").into();
        }
        FeeParams::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            fields["maxFeePerGas"] = format_amount(*max_fee_per_gas, 9, "gwei").into();
            fields["maxPriorityFeePerGas"] =
                format_amount(*max_priority_fee_per_gas, 9, "gwei").into();
        }
    }
    if !params.data.is_empty() {
        fields["dataLength"] = params.data.len().into();
    }
    fields
}

/// Exact amount in the chain's native unit, trailing zeros trimmed
pub fn format_amount(value: U256, decimals: i32, symbol: &str) -> String {
    let units = format_units(value, decimals).unwrap_or_else(|_| value.to_string());
    let trimmed = match units.find('.') {
        Some(_) => {
            let stripped = units.trim_end_matches('0');
            let stripped = stripped.strip_suffix('.').unwrap_or(stripped);
            stripped.to_string()
        }
        None => units,
    };
    format!("{} {}", trimmed, symbol)
}

pub fn parse_address(raw: &str) -> Result<Address> {
    let bytes = decode_hex(raw).context("invalid address hex")?;
    if bytes.len() != 20 {
        bail!("invalid address length: {}", bytes.len());
    }
    Ok(Address::from_slice(&bytes))
}

pub fn parse_decimal(raw: &str) -> Result<U256> {
    U256::from_dec_str(raw).map_err(|e| anyhow!("invalid decimal string {:?}: {:?}", raw, e))
}

pub fn decode_hex(raw: &str) -> Result<Vec<u8>> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    Ok(hex::decode(stripped)?)
}

fn append_u256(stream: &mut RlpStream, value: U256) {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    append_trimmed(stream, &buf);
}

// RLP integers are minimal big-endian: leading zero bytes must go
fn append_trimmed(stream: &mut RlpStream, bytes: &[u8]) {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    stream.append(&bytes[first..].to_vec());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::Chain;

    fn defaults() -> ChainDefaults {
        ChainDefaults::default()
    }

    fn legacy_tx() -> TransactionData {
        TransactionData::transfer(
            Chain::Ethereum,
            "0x1111111111111111111111111111111111111111",
            "0x2222222222222222222222222222222222222222",
            "1000000000000000000",
        )
        .with_nonce(3)
    }

    fn valid_signature() -> String {
        format!("0x{}{}{}", "11".repeat(32), "22".repeat(32), "1b")
    }

    #[test]
    fn test_legacy_unsigned_is_nine_item_list() {
        let params = EvmTxParams::from_transaction(&legacy_tx(), &defaults()).unwrap();
        let encoded = encode_unsigned(&params);

        let decoded = rlp::Rlp::new(&encoded);
        assert!(decoded.is_list());
        assert_eq!(decoded.item_count().unwrap(), 9);
        // EIP-155: chain id sits in slot 6, placeholders after it
        assert_eq!(decoded.at(6).unwrap().as_val::<u64>().unwrap(), 1);
    }

    #[test]
    fn test_fee_market_unsigned_is_typed_envelope() {
        let tx = legacy_tx().with_fee_market("2000000000", "1000000000");
        let params = EvmTxParams::from_transaction(&tx, &defaults()).unwrap();
        let encoded = encode_unsigned(&params);

        assert_eq!(encoded[0], EIP1559_TX_TYPE);
        let decoded = rlp::Rlp::new(&encoded[1..]);
        assert_eq!(decoded.item_count().unwrap(), 9);
        assert_eq!(decoded.at(0).unwrap().as_val::<u64>().unwrap(), 1);
    }

    #[test]
    fn test_defaults_applied() {
        let params = EvmTxParams::from_transaction(&legacy_tx(), &defaults()).unwrap();
        assert_eq!(params.gas_limit, U256::from(21_000));
        assert_eq!(
            params.fee,
            FeeParams::Legacy {
                gas_price: U256::from(1_000_000_000u64)
            }
        );
    }

    #[test]
    fn test_signed_legacy_has_eip155_v() {
        let params = EvmTxParams::from_transaction(&legacy_tx(), &defaults()).unwrap();
        let sig = parse_compact_signature(&valid_signature()).unwrap();
        let encoded = encode_signed(&params, &sig);

        let decoded = rlp::Rlp::new(&encoded);
        assert_eq!(decoded.item_count().unwrap(), 9);
        // v = chain_id * 2 + 35 + parity, parity 0 for v=27
        assert_eq!(decoded.at(6).unwrap().as_val::<u64>().unwrap(), 37);
    }

    #[test]
    fn test_signed_fee_market_has_twelve_items() {
        let tx = legacy_tx().with_fee_market("2000000000", "1000000000");
        let params = EvmTxParams::from_transaction(&tx, &defaults()).unwrap();
        let sig = parse_compact_signature(&valid_signature()).unwrap();
        let encoded = encode_signed(&params, &sig);

        assert_eq!(encoded[0], EIP1559_TX_TYPE);
        assert_eq!(rlp::Rlp::new(&encoded[1..]).item_count().unwrap(), 12);
    }

    #[test]
    fn test_parse_compact_signature() {
        let sig = parse_compact_signature(&valid_signature()).unwrap();
        assert_eq!(sig.r, vec![0x11; 32]);
        assert_eq!(sig.s, vec![0x22; 32]);
        assert_eq!(sig.v, 27);

        assert!(parse_compact_signature("0xdeadbeef").is_err());
        assert!(parse_compact_signature(&"zz".repeat(65)).is_err());
    }

    #[test]
    fn test_recovery_parity() {
        assert_eq!(recovery_parity(0), 0);
        assert_eq!(recovery_parity(1), 1);
        assert_eq!(recovery_parity(27), 0);
        assert_eq!(recovery_parity(28), 1);
        assert_eq!(recovery_parity(37), 0);
        assert_eq!(recovery_parity(38), 1);
    }

    #[test]
    fn test_hash_tracks_value() {
        let params = EvmTxParams::from_transaction(&legacy_tx(), &defaults()).unwrap();
        let mut bumped = legacy_tx();
        bumped.value = "1000000000000000001".to_string();
        let bumped = EvmTxParams::from_transaction(&bumped, &defaults()).unwrap();

        let a = transaction_hash(&encode_unsigned(&params));
        let b = transaction_hash(&encode_unsigned(&params));
        let c = transaction_hash(&encode_unsigned(&bumped));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_format_amount_is_exact() {
        assert_eq!(
            format_amount(U256::from_dec_str("1000000000000000000").unwrap(), 18, "ETH"),
            "1 ETH"
        );
        assert_eq!(
            format_amount(U256::from_dec_str("1000000000000000001").unwrap(), 18, "ETH"),
            "1.000000000000000001 ETH"
        );
        assert_eq!(format_amount(U256::from(150_000_000u64), 8, "BTC"), "1.5 BTC");
    }
}
