// ============================================================================
// Matchbook
// Deterministic in-memory limit order book matching engine
// ============================================================================

//! # Matchbook
//!
//! A single-threaded, deterministic matching engine for limit order books.
//!
//! ## Features
//!
//! - **Price-time priority matching** with per-symbol books
//! - **Full order lifecycle**: add, reduce, modify, replace, cancel
//! - **Order types**: market (with slippage caps), limit, stop, stop-limit,
//!   trailing stop, trailing stop-limit
//! - **Attributes**: iceberg display caps, IOC/FOK time-in-force,
//!   All-Or-None indivisibility
//! - **Observer callbacks** for every symbol, book, level, and order event,
//!   emitted synchronously in a total order
//! - **Integer-only arithmetic**: prices and quantities are u64 ticks and
//!   lots; the engine never touches floating point
//!
//! ## Example
//!
//! ```rust
//! use matchbook::prelude::*;
//!
//! let mut market = MarketManager::new(RecordingMarketHandler::new());
//! market.add_symbol(Symbol::new(1, "BTCUSD")).unwrap();
//! market.add_order_book(1).unwrap();
//!
//! market.add_order(Order::limit(1, 1, Side::Sell, 50_000, 10)).unwrap();
//! market.add_order(Order::limit(2, 1, Side::Buy, 50_000, 10)).unwrap();
//!
//! // Both orders executed in full at the resting price
//! assert_eq!(
//!     market.handler().executions(),
//!     vec![(2, 50_000, 10), (1, 50_000, 10)],
//! );
//! let book = market.order_book(1).unwrap();
//! assert_eq!(book.best_bid(), None);
//! assert_eq!(book.best_ask(), None);
//! ```

pub mod domain;
pub mod engine;
pub mod error;
pub mod interfaces;

// Re-exports for convenience
pub mod prelude {
    pub use crate::domain::{
        Level, LevelSide, LevelUpdate, Order, OrderBook, OrderBookSnapshot, OrderType, Side,
        Symbol, TimeInForce, Trade, UpdateKind,
    };
    pub use crate::engine::MarketManager;
    pub use crate::error::{MarketError, MarketResult};
    pub use crate::interfaces::{
        LoggingMarketHandler, MarketEvent, MarketHandler, NoOpMarketHandler,
        RecordingMarketHandler, TradeTapeHandler,
    };
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;

    fn market() -> MarketManager<RecordingMarketHandler> {
        let mut market = MarketManager::new(RecordingMarketHandler::new());
        market.add_symbol(Symbol::new(1, "TEST")).unwrap();
        market.add_order_book(1).unwrap();
        market.handler_mut().clear();
        market
    }

    #[test]
    fn test_end_to_end_cross() {
        let mut market = market();
        market.add_order(Order::limit(1, 1, Side::Sell, 100, 10)).unwrap();
        market.add_order(Order::limit(2, 1, Side::Buy, 100, 4)).unwrap();

        assert_eq!(
            market.handler().executions(),
            vec![(2, 100, 4), (1, 100, 4)],
        );
        assert_eq!(market.get_order(1).map(|o| o.remaining()), Some(6));
        assert_eq!(market.get_order(2), None);

        let book = market.order_book(1).unwrap();
        assert_eq!(book.best_ask(), Some(100));
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.last_trade_price(), Some(100));
    }

    #[test]
    fn test_trade_tape_records_maker_and_taker() {
        let mut market = MarketManager::new(TradeTapeHandler::new());
        market.add_symbol(Symbol::new(1, "TEST")).unwrap();
        market.add_order_book(1).unwrap();

        market.add_order(Order::limit(1, 1, Side::Sell, 100, 10)).unwrap();
        market.add_order(Order::market(2, 1, Side::Buy, 10)).unwrap();

        let tape = market.handler();
        assert_eq!(tape.trades.len(), 1);
        assert_eq!(tape.trades[0].maker_order_id, 1);
        assert_eq!(tape.trades[0].taker_order_id, 2);
        assert_eq!(tape.trades[0].price, 100);
        assert_eq!(tape.trades[0].quantity, 10);
    }
}
