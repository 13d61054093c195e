use crate::client::HyperliquidClient;
use crate::execution::LiveExecution;
use crate::info::MetaResponse;
use crate::paper_execution::PaperExecution;
use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use risk_agent_core::{
    AgentError, AssetMeta, Exchange, OrderRequest, OrderResult, OrderStatus, Result,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;

/// How orders reach the venue.
pub enum Executor {
    Paper(PaperExecution),
    Live(LiveExecution),
}

/// [`Exchange`] backed by Hyperliquid perpetuals.
///
/// Prices always come from the live `allMids` feed. The asset universe is fetched once
/// and refreshed only when a symbol is missing from the cached copy.
pub struct HyperliquidExchange {
    client: HyperliquidClient,
    executor: Executor,
    min_notional: Decimal,
    min_position_size: Decimal,
    meta: RwLock<Option<Arc<MetaResponse>>>,
}

impl HyperliquidExchange {
    #[must_use]
    pub fn new(
        client: HyperliquidClient,
        executor: Executor,
        min_notional: Decimal,
        min_position_size: Decimal,
    ) -> Self {
        Self {
            client,
            executor,
            min_notional,
            min_position_size,
            meta: RwLock::new(None),
        }
    }

    #[must_use]
    pub const fn is_paper(&self) -> bool {
        matches!(self.executor, Executor::Paper(_))
    }

    async fn universe(&self, symbol: &str) -> AnyResult<(u32, u32)> {
        if let Some(meta) = self.meta.read().await.as_ref() {
            if let Some((index, asset)) = meta.find(symbol) {
                return Ok((index, asset.sz_decimals));
            }
        }

        let fresh = Arc::new(self.client.meta().await?);
        *self.meta.write().await = Some(Arc::clone(&fresh));
        fresh
            .find(symbol)
            .map(|(index, asset)| (index, asset.sz_decimals))
            .with_context(|| format!("Unknown asset {symbol}"))
    }

    async fn mid(&self, symbol: &str) -> AnyResult<Decimal> {
        let mids = self.client.all_mids().await?;
        mids.get(symbol)
            .or_else(|| mids.get(&symbol.to_ascii_uppercase()))
            .copied()
            .with_context(|| format!("No mid price for {symbol}"))
    }

    async fn execute(&self, order: &OrderRequest) -> AnyResult<OrderResult> {
        let reference = self.mid(&order.symbol).await?;
        match &self.executor {
            Executor::Paper(paper) => Ok(paper.fill(order, order.price.unwrap_or(reference))),
            Executor::Live(live) => {
                let (asset, sz_decimals) = self.universe(&order.symbol).await?;
                live.submit(order, asset, sz_decimals, reference).await
            }
        }
    }
}

#[async_trait]
impl Exchange for HyperliquidExchange {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderResult> {
        let fill = self
            .execute(order)
            .await
            .map_err(|e| AgentError::exchange(format!("{} {}: {e:#}", order.side, order.symbol)))?;
        tracing::info!(
            order_id = %fill.order_id,
            symbol = %fill.symbol,
            side = %fill.side,
            quantity = %fill.filled_quantity,
            price = %fill.avg_price,
            paper = self.is_paper(),
            "Order filled"
        );
        Ok(fill)
    }

    async fn get_market_price(&self, symbol: &str) -> Result<Decimal> {
        self.mid(symbol)
            .await
            .map_err(|e| AgentError::exchange(format!("price for {symbol}: {e:#}")))
    }

    async fn asset_meta(&self, symbol: &str) -> Result<AssetMeta> {
        let (_, size_decimals) = self
            .universe(symbol)
            .await
            .map_err(|e| AgentError::exchange(format!("meta for {symbol}: {e:#}")))?;
        Ok(AssetMeta {
            symbol: symbol.to_string(),
            size_decimals,
            min_notional: self.min_notional,
            min_position_size: self.min_position_size,
        })
    }

    async fn order_status(&self, symbol: &str, client_order_id: &str) -> Result<OrderStatus> {
        match &self.executor {
            Executor::Paper(paper) => Ok(paper.status(client_order_id)),
            Executor::Live(live) => live.status(symbol, client_order_id).await.map_err(|e| {
                AgentError::exchange(format!("status of {symbol} order {client_order_id}: {e:#}"))
            }),
        }
    }
}
