use crate::client::HyperliquidClient;
use crate::info::{parse_decimal, UserFill};
use crate::signing::{sign_l1_action, signature_to_json, Action, OrderWire};
use crate::wallet::WalletConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use risk_agent_core::sizing::truncate_quantity;
use risk_agent_core::{OrderRequest, OrderResult, OrderSide, OrderStatus};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

const BPS: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);
const MAX_PRICE_DECIMALS: u32 = 6;
const PRICE_SIGNIFICANT_FIGURES: u32 = 5;

/// Signed immediate-or-cancel orders against the `/exchange` endpoint.
pub struct LiveExecution {
    client: HyperliquidClient,
    wallet: WalletConfig,
    max_slippage_bps: Decimal,
}

impl LiveExecution {
    #[must_use]
    pub const fn new(client: HyperliquidClient, wallet: WalletConfig, max_slippage_bps: Decimal) -> Self {
        Self {
            client,
            wallet,
            max_slippage_bps,
        }
    }

    /// Submits `order` as an IOC limit at `reference_price` plus the slippage allowance.
    ///
    /// # Errors
    /// Returns an error if signing or the request fails, or the order does not fill.
    pub async fn submit(
        &self,
        order: &OrderRequest,
        asset: u32,
        sz_decimals: u32,
        reference_price: Decimal,
    ) -> Result<OrderResult> {
        let limit = order.price.unwrap_or_else(|| {
            let slip = reference_price * self.max_slippage_bps / BPS;
            match order.side {
                OrderSide::Buy => reference_price + slip,
                OrderSide::Sell => reference_price - slip,
            }
        });

        let action = Action::orders(vec![OrderWire::ioc(
            asset,
            order.side.is_buy(),
            format_price(limit, sz_decimals),
            format_size(order.quantity, sz_decimals),
            order.reduce_only,
            Some(order.client_order_id.clone()),
        )]);

        let nonce = self.wallet.next_nonce();
        let signature =
            sign_l1_action(&self.wallet.wallet, &action, nonce, self.client.is_mainnet()).await?;

        let payload = json!({
            "action": action.to_json()?,
            "nonce": nonce,
            "signature": signature_to_json(&signature),
            "vaultAddress": Value::Null,
        });

        tracing::info!(
            symbol = %order.symbol,
            side = %order.side,
            size = %order.quantity,
            limit = %limit,
            cloid = %order.client_order_id,
            "Submitting IOC order"
        );
        let response = self.client.post("/exchange", &payload).await?;
        parse_fill(order, &response)
    }

    /// Resolves an order by client order id. Fill price and fees come from the
    /// account's fills, since `orderStatus` only reports sizes.
    ///
    /// # Errors
    /// Returns an error if either lookup fails or the venue payload is malformed.
    pub async fn status(&self, symbol: &str, client_order_id: &str) -> Result<OrderStatus> {
        let user = &self.wallet.account_address;
        let reply = self.client.order_status(user, client_order_id).await?;
        let Some(info) = reply.order else {
            tracing::info!(
                %symbol,
                cloid = %client_order_id,
                status = %reply.status,
                "Order unknown to venue"
            );
            return Ok(OrderStatus::NotFilled);
        };

        let filled = info.order.filled_size()?;
        if matches!(info.status.as_str(), "open" | "triggered") {
            return Ok(OrderStatus::Pending);
        }
        if filled <= Decimal::ZERO {
            return Ok(OrderStatus::NotFilled);
        }

        let fills = self.client.user_fills(user).await?;
        let side = if info.order.side == "B" {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        match aggregate_fills(symbol, side, info.order.oid, &fills)? {
            Some(result) => Ok(OrderStatus::Filled(result)),
            // Fills can trail the order status briefly.
            None => Ok(OrderStatus::Pending),
        }
    }
}

/// Volume-weighted fill for venue order `oid`, or `None` if no fill is listed yet.
///
/// # Errors
/// Returns an error if a fill carries a malformed number.
pub fn aggregate_fills(
    symbol: &str,
    side: OrderSide,
    oid: u64,
    fills: &[UserFill],
) -> Result<Option<OrderResult>> {
    let mut quantity = Decimal::ZERO;
    let mut notional = Decimal::ZERO;
    let mut commission = Decimal::ZERO;
    let mut last_time = None;
    for fill in fills.iter().filter(|f| f.oid == oid) {
        let sz = parse_decimal("fill sz", &fill.sz)?;
        quantity += sz;
        notional += sz * parse_decimal("fill px", &fill.px)?;
        if let Some(fee) = &fill.fee {
            commission += parse_decimal("fill fee", fee)?;
        }
        last_time = last_time.max(Some(fill.time));
    }
    if quantity <= Decimal::ZERO {
        return Ok(None);
    }

    Ok(Some(OrderResult {
        order_id: oid.to_string(),
        symbol: symbol.to_string(),
        side,
        filled_quantity: quantity,
        avg_price: notional / quantity,
        commission,
        timestamp: last_time
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now),
    }))
}

/// Extracts the fill from an `/exchange` order response.
///
/// # Errors
/// Returns an error for rejected, resting or malformed responses.
pub fn parse_fill(order: &OrderRequest, response: &Value) -> Result<OrderResult> {
    let status = response
        .get("status")
        .and_then(Value::as_str)
        .context("Missing status in order response")?;

    if status != "ok" {
        let error = response
            .get("response")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        anyhow::bail!("Order failed: {error}");
    }

    let first_status = response
        .pointer("/response/data/statuses/0")
        .context("No order status in response")?;

    if let Some(error) = first_status.get("error").and_then(Value::as_str) {
        anyhow::bail!("Order rejected: {error}");
    }

    let filled = first_status
        .get("filled")
        .and_then(Value::as_object)
        .context("Order not filled")?;

    let decimal = |field: &str| -> Result<Decimal> {
        let raw = filled
            .get(field)
            .and_then(Value::as_str)
            .with_context(|| format!("Missing {field} in fill"))?;
        Decimal::from_str(raw).with_context(|| format!("Invalid {field}: {raw}"))
    };

    Ok(OrderResult {
        order_id: filled
            .get("oid")
            .and_then(Value::as_u64)
            .map(|o| o.to_string())
            .unwrap_or_default(),
        symbol: order.symbol.clone(),
        side: order.side,
        filled_quantity: decimal("totalSz")?,
        avg_price: decimal("avgPx")?,
        commission: Decimal::ZERO,
        timestamp: Utc::now(),
    })
}

/// Price string with at most five significant figures and `6 - sz_decimals` decimals.
/// Integer prices are always allowed.
#[must_use]
pub fn format_price(price: Decimal, sz_decimals: u32) -> String {
    let integer_digits = {
        let trunc = price.trunc().abs();
        if trunc.is_zero() {
            0
        } else {
            u32::try_from(trunc.to_string().len()).unwrap_or(u32::MAX)
        }
    };
    let decimals = MAX_PRICE_DECIMALS
        .saturating_sub(sz_decimals)
        .min(PRICE_SIGNIFICANT_FIGURES.saturating_sub(integer_digits));
    price.round_dp(decimals).normalize().to_string()
}

#[must_use]
pub fn format_size(quantity: Decimal, sz_decimals: u32) -> String {
    truncate_quantity(quantity, sz_decimals).normalize().to_string()
}
