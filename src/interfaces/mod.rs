// ============================================================================
// Interfaces Module
// Observer surface between the engine and the outside world
// ============================================================================

pub mod market_handler;

pub use market_handler::{
    LoggingMarketHandler, MarketEvent, MarketHandler, NoOpMarketHandler, RecordingMarketHandler,
    TradeTapeHandler,
};
