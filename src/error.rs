// ============================================================================
// Market Errors
// Status taxonomy returned by every market command
// ============================================================================

use std::fmt;

/// Failure kinds for market commands.
///
/// Every command on the market manager either succeeds (`Ok(())`) or fails
/// with exactly one of these kinds, leaving no partial mutation behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketError {
    /// AddSymbol with an id that is already registered
    SymbolDuplicate,
    /// Operation references a symbol that does not exist
    SymbolNotFound,
    /// An order book already exists for the symbol
    OrderBookDuplicate,
    /// No order book exists for the symbol
    OrderBookNotFound,
    /// The symbol still has an order book bound to it
    OrderBookExists,
    /// AddOrder or ReplaceOrder with an id that is already live
    OrderDuplicate,
    /// Operation references an order that is not live
    OrderNotFound,
    /// Order id is zero
    OrderIdInvalid,
    /// Quantity (or iceberg display cap) is zero
    OrderQuantityInvalid,
    /// Price, stop price, or trailing distance is zero where one is required
    OrderPriceInvalid,
    /// Operation is incompatible with the order's type
    OrderTypeInvalid,
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketError::SymbolDuplicate => write!(f, "symbol already exists"),
            MarketError::SymbolNotFound => write!(f, "symbol not found"),
            MarketError::OrderBookDuplicate => {
                write!(f, "order book already exists for symbol")
            },
            MarketError::OrderBookNotFound => write!(f, "order book not found"),
            MarketError::OrderBookExists => {
                write!(f, "symbol still has an order book bound to it")
            },
            MarketError::OrderDuplicate => write!(f, "order id already exists"),
            MarketError::OrderNotFound => write!(f, "order not found"),
            MarketError::OrderIdInvalid => write!(f, "order id must be non-zero"),
            MarketError::OrderQuantityInvalid => {
                write!(f, "order quantity must be non-zero")
            },
            MarketError::OrderPriceInvalid => {
                write!(f, "order price is invalid for this order type")
            },
            MarketError::OrderTypeInvalid => {
                write!(f, "operation is incompatible with the order type")
            },
        }
    }
}

impl std::error::Error for MarketError {}

/// Result type alias for market commands
pub type MarketResult<T = ()> = Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(MarketError::SymbolDuplicate.to_string(), "symbol already exists");
        assert_eq!(MarketError::OrderNotFound.to_string(), "order not found");
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(MarketError::OrderDuplicate, MarketError::OrderDuplicate);
        assert_ne!(MarketError::OrderDuplicate, MarketError::OrderNotFound);
    }
}
