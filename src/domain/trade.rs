// ============================================================================
// Trade Domain Model
// ============================================================================

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A matched trade between two orders, as assembled by the trade tape from
/// the per-leg execution callbacks. Metadata only: engine state never reads
/// a trade back.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trade {
    /// Unique trade identifier
    pub id: Uuid,

    /// Symbol the trade printed on
    pub symbol_id: u32,

    /// Order id of the passive side (was resting in the book)
    pub maker_order_id: u64,

    /// Order id of the aggressive side
    pub taker_order_id: u64,

    /// Execution price in ticks
    pub price: u64,

    /// Executed quantity in lots
    pub quantity: u64,

    /// Wall-clock time the trade was observed
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    pub fn new(
        symbol_id: u32,
        maker_order_id: u64,
        taker_order_id: u64,
        price: u64,
        quantity: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol_id,
            maker_order_id,
            taker_order_id,
            price,
            quantity,
            timestamp: Utc::now(),
        }
    }

    /// Notional value of the trade in tick-lots
    pub fn notional_value(&self) -> u128 {
        self.price as u128 * self.quantity as u128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_creation() {
        let trade = Trade::new(1, 10, 20, 100, 5);
        assert_eq!(trade.symbol_id, 1);
        assert_eq!(trade.maker_order_id, 10);
        assert_eq!(trade.taker_order_id, 20);
        assert_eq!(trade.notional_value(), 500);
    }
}
