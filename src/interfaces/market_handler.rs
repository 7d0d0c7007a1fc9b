// ============================================================================
// Market Handler Interface
// Defines the contract for observing market events
// ============================================================================

use chrono::{DateTime, Utc};

use crate::domain::{Level, Order, Symbol, Trade};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Observer capability the market manager emits into.
///
/// Every callback has a default no-op body, so implementations override only
/// what they care about. Callbacks run synchronously on the command path, in
/// a total order; implementations must not call back into the manager.
pub trait MarketHandler {
    fn on_add_symbol(&mut self, _symbol: &Symbol) {}
    fn on_delete_symbol(&mut self, _symbol: &Symbol) {}

    fn on_add_order_book(&mut self, _symbol_id: u32) {}
    /// `top` is true when the best bid or best ask moved
    fn on_update_order_book(&mut self, _symbol_id: u32, _top: bool) {}
    fn on_delete_order_book(&mut self, _symbol_id: u32) {}

    fn on_add_level(&mut self, _symbol_id: u32, _level: &Level, _top: bool) {}
    fn on_update_level(&mut self, _symbol_id: u32, _level: &Level, _top: bool) {}
    fn on_delete_level(&mut self, _symbol_id: u32, _level: &Level, _top: bool) {}

    fn on_add_order(&mut self, _order: &Order) {}
    fn on_update_order(&mut self, _order: &Order) {}
    fn on_delete_order(&mut self, _order: &Order) {}
    /// One execution leg; every trade emits the aggressor leg first, then
    /// the resting leg, both with their pre-fill state
    fn on_execute_order(&mut self, _order: &Order, _price: u64, _quantity: u64) {}
}

/// No-op handler for benchmarks and tests that ignore events
pub struct NoOpMarketHandler;

impl MarketHandler for NoOpMarketHandler {}

/// Forwards every callback to `tracing` at debug level
pub struct LoggingMarketHandler;

impl MarketHandler for LoggingMarketHandler {
    fn on_add_symbol(&mut self, symbol: &Symbol) {
        tracing::debug!(?symbol, "add symbol");
    }

    fn on_delete_symbol(&mut self, symbol: &Symbol) {
        tracing::debug!(?symbol, "delete symbol");
    }

    fn on_add_order_book(&mut self, symbol_id: u32) {
        tracing::debug!(symbol_id, "add order book");
    }

    fn on_update_order_book(&mut self, symbol_id: u32, top: bool) {
        tracing::debug!(symbol_id, top, "update order book");
    }

    fn on_delete_order_book(&mut self, symbol_id: u32) {
        tracing::debug!(symbol_id, "delete order book");
    }

    fn on_add_level(&mut self, symbol_id: u32, level: &Level, top: bool) {
        tracing::debug!(symbol_id, ?level, top, "add level");
    }

    fn on_update_level(&mut self, symbol_id: u32, level: &Level, top: bool) {
        tracing::debug!(symbol_id, ?level, top, "update level");
    }

    fn on_delete_level(&mut self, symbol_id: u32, level: &Level, top: bool) {
        tracing::debug!(symbol_id, ?level, top, "delete level");
    }

    fn on_add_order(&mut self, order: &Order) {
        tracing::debug!(?order, "add order");
    }

    fn on_update_order(&mut self, order: &Order) {
        tracing::debug!(?order, "update order");
    }

    fn on_delete_order(&mut self, order: &Order) {
        tracing::debug!(?order, "delete order");
    }

    fn on_execute_order(&mut self, order: &Order, price: u64, quantity: u64) {
        tracing::debug!(order_id = order.id, price, quantity, "execute order");
    }
}

// ============================================================================
// Recording Handler
// ============================================================================

/// Events captured by [`RecordingMarketHandler`], one per callback.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MarketEvent {
    SymbolAdded {
        symbol: Symbol,
        timestamp: DateTime<Utc>,
    },
    SymbolDeleted {
        symbol: Symbol,
        timestamp: DateTime<Utc>,
    },
    OrderBookAdded {
        symbol_id: u32,
        timestamp: DateTime<Utc>,
    },
    OrderBookUpdated {
        symbol_id: u32,
        top: bool,
        timestamp: DateTime<Utc>,
    },
    OrderBookDeleted {
        symbol_id: u32,
        timestamp: DateTime<Utc>,
    },
    LevelAdded {
        symbol_id: u32,
        level: Level,
        top: bool,
        timestamp: DateTime<Utc>,
    },
    LevelUpdated {
        symbol_id: u32,
        level: Level,
        top: bool,
        timestamp: DateTime<Utc>,
    },
    LevelDeleted {
        symbol_id: u32,
        level: Level,
        top: bool,
        timestamp: DateTime<Utc>,
    },
    OrderAdded {
        order: Order,
        timestamp: DateTime<Utc>,
    },
    OrderUpdated {
        order: Order,
        timestamp: DateTime<Utc>,
    },
    OrderDeleted {
        order: Order,
        timestamp: DateTime<Utc>,
    },
    OrderExecuted {
        order: Order,
        price: u64,
        quantity: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Buffers every event in arrival order; the workhorse of scenario tests.
#[derive(Debug, Default)]
pub struct RecordingMarketHandler {
    pub events: Vec<MarketEvent>,
}

impl RecordingMarketHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// All execution legs as `(order id, price, quantity)`
    pub fn executions(&self) -> Vec<(u64, u64, u64)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                MarketEvent::OrderExecuted {
                    order,
                    price,
                    quantity,
                    ..
                } => Some((order.id, *price, *quantity)),
                _ => None,
            })
            .collect()
    }

    /// Ids of orders announced as deleted, in order
    pub fn deleted_order_ids(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|event| match event {
                MarketEvent::OrderDeleted { order, .. } => Some(order.id),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl MarketHandler for RecordingMarketHandler {
    fn on_add_symbol(&mut self, symbol: &Symbol) {
        self.events.push(MarketEvent::SymbolAdded {
            symbol: symbol.clone(),
            timestamp: Utc::now(),
        });
    }

    fn on_delete_symbol(&mut self, symbol: &Symbol) {
        self.events.push(MarketEvent::SymbolDeleted {
            symbol: symbol.clone(),
            timestamp: Utc::now(),
        });
    }

    fn on_add_order_book(&mut self, symbol_id: u32) {
        self.events.push(MarketEvent::OrderBookAdded {
            symbol_id,
            timestamp: Utc::now(),
        });
    }

    fn on_update_order_book(&mut self, symbol_id: u32, top: bool) {
        self.events.push(MarketEvent::OrderBookUpdated {
            symbol_id,
            top,
            timestamp: Utc::now(),
        });
    }

    fn on_delete_order_book(&mut self, symbol_id: u32) {
        self.events.push(MarketEvent::OrderBookDeleted {
            symbol_id,
            timestamp: Utc::now(),
        });
    }

    fn on_add_level(&mut self, symbol_id: u32, level: &Level, top: bool) {
        self.events.push(MarketEvent::LevelAdded {
            symbol_id,
            level: *level,
            top,
            timestamp: Utc::now(),
        });
    }

    fn on_update_level(&mut self, symbol_id: u32, level: &Level, top: bool) {
        self.events.push(MarketEvent::LevelUpdated {
            symbol_id,
            level: *level,
            top,
            timestamp: Utc::now(),
        });
    }

    fn on_delete_level(&mut self, symbol_id: u32, level: &Level, top: bool) {
        self.events.push(MarketEvent::LevelDeleted {
            symbol_id,
            level: *level,
            top,
            timestamp: Utc::now(),
        });
    }

    fn on_add_order(&mut self, order: &Order) {
        self.events.push(MarketEvent::OrderAdded {
            order: *order,
            timestamp: Utc::now(),
        });
    }

    fn on_update_order(&mut self, order: &Order) {
        self.events.push(MarketEvent::OrderUpdated {
            order: *order,
            timestamp: Utc::now(),
        });
    }

    fn on_delete_order(&mut self, order: &Order) {
        self.events.push(MarketEvent::OrderDeleted {
            order: *order,
            timestamp: Utc::now(),
        });
    }

    fn on_execute_order(&mut self, order: &Order, price: u64, quantity: u64) {
        self.events.push(MarketEvent::OrderExecuted {
            order: *order,
            price,
            quantity,
            timestamp: Utc::now(),
        });
    }
}

// ============================================================================
// Trade Tape
// ============================================================================

/// Pairs the two execution legs of each trade into [`Trade`] records.
///
/// The engine emits the aggressor leg first and the resting leg second, so
/// legs are paired by simple alternation.
#[derive(Debug, Default)]
pub struct TradeTapeHandler {
    pending_taker: Option<(u64, u32)>,
    pub trades: Vec<Trade>,
}

impl TradeTapeHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarketHandler for TradeTapeHandler {
    fn on_execute_order(&mut self, order: &Order, price: u64, quantity: u64) {
        match self.pending_taker.take() {
            None => self.pending_taker = Some((order.id, order.symbol_id)),
            Some((taker_order_id, symbol_id)) => {
                self.trades.push(Trade::new(
                    symbol_id,
                    order.id,
                    taker_order_id,
                    price,
                    quantity,
                ));
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;

    #[test]
    fn test_default_bodies_are_noops() {
        let mut handler = NoOpMarketHandler;
        handler.on_add_symbol(&Symbol::new(1, "TEST"));
        handler.on_execute_order(&Order::limit(1, 1, Side::Buy, 100, 10), 100, 10);
        // Should not panic
    }

    #[test]
    fn test_recording_handler_captures_executions() {
        let mut handler = RecordingMarketHandler::new();
        let taker = Order::market(2, 1, Side::Buy, 10);
        let maker = Order::limit(1, 1, Side::Sell, 100, 10);
        handler.on_execute_order(&taker, 100, 10);
        handler.on_execute_order(&maker, 100, 10);
        assert_eq!(handler.executions(), vec![(2, 100, 10), (1, 100, 10)]);
    }

    #[test]
    fn test_trade_tape_pairs_legs() {
        let mut tape = TradeTapeHandler::new();
        let taker = Order::market(2, 7, Side::Buy, 10);
        let maker = Order::limit(1, 7, Side::Sell, 100, 10);
        tape.on_execute_order(&taker, 100, 10);
        tape.on_execute_order(&maker, 100, 10);

        assert_eq!(tape.trades.len(), 1);
        let trade = &tape.trades[0];
        assert_eq!(trade.symbol_id, 7);
        assert_eq!(trade.maker_order_id, 1);
        assert_eq!(trade.taker_order_id, 2);
        assert_eq!(trade.price, 100);
        assert_eq!(trade.quantity, 10);
    }
}
