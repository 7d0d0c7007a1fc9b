// ============================================================================
// Symbol Domain Model
// ============================================================================

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A traded instrument registered with the market manager.
///
/// The name is opaque to matching; only the id participates in routing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Symbol {
    /// Unique symbol id within the registry
    pub id: u32,
    /// Short human-readable identifier (e.g. "BTCUSD")
    pub name: String,
}

impl Symbol {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol(#{}, {})", self.id, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_creation() {
        let symbol = Symbol::new(1, "BTCUSD");
        assert_eq!(symbol.id, 1);
        assert_eq!(symbol.name, "BTCUSD");
        assert_eq!(symbol.to_string(), "Symbol(#1, BTCUSD)");
    }
}
