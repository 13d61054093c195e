use chrono::{DateTime, Utc};
use risk_agent_core::{AgentError, Trade};
use rust_decimal::Decimal;

/// Row of the `trades` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TradeRow {
    pub id: i64,
    pub symbol: String,
    pub option_type: String,
    pub strike_price: Decimal,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub exit_price: Option<Decimal>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = AgentError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            option_type: row.option_type.parse().map_err(AgentError::storage)?,
            status: row.status.parse().map_err(AgentError::storage)?,
            symbol: row.symbol,
            strike_price: row.strike_price,
            entry_price: row.entry_price,
            quantity: row.quantity,
            exit_price: row.exit_price,
            created_at: row.created_at,
            closed_at: row.closed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use risk_agent_core::{InstrumentSide, TradeStatus};
    use rust_decimal_macros::dec;

    fn row(option_type: &str, status: &str) -> TradeRow {
        TradeRow {
            id: 7,
            symbol: "BTC".to_string(),
            option_type: option_type.to_string(),
            strike_price: dec!(50000),
            entry_price: dec!(50025),
            quantity: dec!(0.0003),
            exit_price: None,
            status: status.to_string(),
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    #[test]
    fn test_row_converts() {
        let trade = Trade::try_from(row("long", "open")).unwrap();
        assert_eq!(trade.option_type, InstrumentSide::Long);
        assert_eq!(trade.status, TradeStatus::Open);
        assert_eq!(trade.quantity, dec!(0.0003));
    }

    #[test]
    fn test_unknown_enum_text_is_storage_error() {
        assert!(matches!(
            Trade::try_from(row("straddle", "open")),
            Err(AgentError::Storage(_))
        ));
        assert!(matches!(
            Trade::try_from(row("call", "pending")),
            Err(AgentError::Storage(_))
        ));
    }
}
