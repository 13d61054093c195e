//! L1 action signing.
//!
//! An action is hashed as `keccak256(msgpack(action) || nonce_be || 0x00)` and the
//! hash is signed as the `connectionId` of an EIP-712 "phantom agent". The same serde
//! structs produce the msgpack bytes and the JSON body, so the two cannot drift.

use anyhow::{Context, Result};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip712::TypedData;
use ethers::types::Signature;
use ethers::utils::keccak256;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Limit {
    /// Time in force, e.g. `Ioc`.
    pub tif: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit(Limit),
}

/// Order wire format. Field order is significant: it fixes the msgpack encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWire {
    /// Asset index in the perpetuals universe.
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "b")]
    pub is_buy: bool,
    #[serde(rename = "p")]
    pub limit_px: String,
    #[serde(rename = "s")]
    pub size: String,
    #[serde(rename = "r")]
    pub reduce_only: bool,
    #[serde(rename = "t")]
    pub order_type: OrderType,
    /// Client order id, `0x` followed by 32 hex digits.
    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
}

impl OrderWire {
    #[must_use]
    pub fn ioc(
        asset: u32,
        is_buy: bool,
        limit_px: String,
        size: String,
        reduce_only: bool,
        cloid: Option<String>,
    ) -> Self {
        Self {
            asset,
            is_buy,
            limit_px,
            size,
            reduce_only,
            order_type: OrderType::Limit(Limit {
                tif: "Ioc".to_string(),
            }),
            cloid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkOrder {
    pub orders: Vec<OrderWire>,
    pub grouping: String,
}

/// `{"type": "order", "orders": [...], "grouping": "na"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Order(BulkOrder),
}

impl Action {
    #[must_use]
    pub fn orders(orders: Vec<OrderWire>) -> Self {
        Self::Order(BulkOrder {
            orders,
            grouping: "na".to_string(),
        })
    }

    /// # Errors
    /// Returns an error if the action cannot be serialized.
    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self).context("Failed to serialize action")
    }

    /// Connection id signed by the phantom agent.
    ///
    /// # Errors
    /// Returns an error if the action cannot be encoded as msgpack.
    pub fn hash(&self, nonce: u64) -> Result<[u8; 32]> {
        let mut bytes = rmp_serde::to_vec_named(self).context("Failed to encode action")?;
        bytes.extend_from_slice(&nonce.to_be_bytes());
        // No vault address
        bytes.push(0x00);
        Ok(keccak256(bytes))
    }
}

/// EIP-712 payload wrapping `connection_id`.
///
/// # Errors
/// Returns an error if the typed data cannot be built.
pub fn phantom_agent(connection_id: [u8; 32], is_mainnet: bool) -> Result<TypedData> {
    serde_json::from_value(json!({
        "types": {
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "version", "type": "string" },
                { "name": "chainId", "type": "uint256" },
                { "name": "verifyingContract", "type": "address" }
            ],
            "Agent": [
                { "name": "source", "type": "string" },
                { "name": "connectionId", "type": "bytes32" }
            ]
        },
        "primaryType": "Agent",
        "domain": {
            "name": "Exchange",
            "version": "1",
            "chainId": 1337,
            "verifyingContract": "0x0000000000000000000000000000000000000000"
        },
        "message": {
            "source": if is_mainnet { "a" } else { "b" },
            "connectionId": format!("0x{}", hex::encode(connection_id)),
        }
    }))
    .context("Failed to build phantom agent payload")
}

/// Signs `action` for submission at `nonce`.
///
/// # Errors
/// Returns error if encoding or signing fails
pub async fn sign_l1_action(
    wallet: &LocalWallet,
    action: &Action,
    nonce: u64,
    is_mainnet: bool,
) -> Result<Signature> {
    let typed = phantom_agent(action.hash(nonce)?, is_mainnet)?;
    wallet
        .sign_typed_data(&typed)
        .await
        .context("Failed to sign phantom agent")
}

/// Signature in the `{r, s, v}` form the exchange endpoint expects.
#[must_use]
pub fn signature_to_json(signature: &Signature) -> Value {
    let word = |value: ethers::types::U256| {
        let mut buf = [0u8; 32];
        value.to_big_endian(&mut buf);
        format!("0x{}", hex::encode(buf))
    };
    json!({
        "r": word(signature.r),
        "s": word(signature.s),
        "v": signature.v,
    })
}
