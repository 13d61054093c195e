use chrono::Utc;
use parking_lot::Mutex;
use risk_agent_core::{OrderRequest, OrderResult, OrderSide, OrderStatus};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

const BPS: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Simulated fills against a reference price.
///
/// Makes zero calls to the exchange: the only network traffic in paper mode is the
/// price lookup done by the caller.
#[derive(Debug)]
pub struct PaperExecution {
    slippage_bps: Decimal,
    commission_rate: Decimal,
    next_id: AtomicU64,
    fills: Mutex<HashMap<String, OrderResult>>,
}

impl PaperExecution {
    /// * `slippage_bps` - adverse price move per fill, e.g. 5 = 0.05%
    /// * `commission_rate` - fee as a fraction of notional, e.g. 0.00035
    #[must_use]
    pub fn new(slippage_bps: Decimal, commission_rate: Decimal) -> Self {
        Self {
            slippage_bps,
            commission_rate,
            next_id: AtomicU64::new(1),
            fills: Mutex::new(HashMap::new()),
        }
    }

    /// Fills `order` in full at `reference_price` moved against the taker.
    #[must_use]
    pub fn fill(&self, order: &OrderRequest, reference_price: Decimal) -> OrderResult {
        let slip = reference_price * self.slippage_bps / BPS;
        let price = match order.side {
            OrderSide::Buy => reference_price + slip,
            OrderSide::Sell => reference_price - slip,
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let result = OrderResult {
            order_id: format!("paper-{id}"),
            symbol: order.symbol.clone(),
            side: order.side,
            filled_quantity: order.quantity,
            avg_price: price,
            commission: order.quantity * price * self.commission_rate,
            timestamp: Utc::now(),
        };
        self.fills
            .lock()
            .insert(order.client_order_id.clone(), result.clone());
        result
    }

    /// Simulated fills are immediate, so an id is either filled or was never seen.
    #[must_use]
    pub fn status(&self, client_order_id: &str) -> OrderStatus {
        self.fills
            .lock()
            .get(client_order_id)
            .cloned()
            .map_or(OrderStatus::NotFilled, OrderStatus::Filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(symbol: &str, side: OrderSide, quantity: Decimal) -> OrderRequest {
        OrderRequest::market(symbol, side, quantity, false)
    }

    #[test]
    fn test_buy_fills_above_reference() {
        let paper = PaperExecution::new(dec!(5), dec!(0.001));
        let fill = paper.fill(&order("BTC", OrderSide::Buy, dec!(1)), dec!(50000));

        assert_eq!(fill.symbol, "BTC");
        assert_eq!(fill.filled_quantity, dec!(1));
        assert_eq!(fill.avg_price, dec!(50025));
    }

    #[test]
    fn test_sell_fills_below_reference() {
        let paper = PaperExecution::new(dec!(5), dec!(0.001));
        let fill = paper.fill(&order("ETH", OrderSide::Sell, dec!(10)), dec!(3000));

        assert_eq!(fill.filled_quantity, dec!(10));
        assert!(fill.avg_price < dec!(3000));
    }

    #[test]
    fn test_commission_applied() {
        let paper = PaperExecution::new(Decimal::ZERO, dec!(0.001));
        let fill = paper.fill(&order("BTC", OrderSide::Buy, dec!(1)), dec!(50000));

        // 50000 * 1 * 0.001
        assert_eq!(fill.commission, dec!(50));
    }

    #[test]
    fn test_order_ids_are_unique() {
        let paper = PaperExecution::new(Decimal::ZERO, Decimal::ZERO);
        let a = paper.fill(&order("BTC", OrderSide::Buy, dec!(1)), dec!(1));
        let b = paper.fill(&order("BTC", OrderSide::Buy, dec!(1)), dec!(1));
        assert_ne!(a.order_id, b.order_id);
    }

    #[test]
    fn test_status_finds_fill_by_client_order_id() {
        let paper = PaperExecution::new(Decimal::ZERO, Decimal::ZERO);
        let request = order("BTC", OrderSide::Buy, dec!(1));
        let fill = paper.fill(&request, dec!(50000));

        assert_eq!(paper.status(&request.client_order_id), OrderStatus::Filled(fill));
        assert_eq!(paper.status("0x00"), OrderStatus::NotFilled);
    }
}
