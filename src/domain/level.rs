// ============================================================================
// Price Level Snapshots
// ============================================================================

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which ladder a price level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LevelSide {
    Bid,
    Ask,
    BuyStop,
    SellStop,
    TrailingBuyStop,
    TrailingSellStop,
}

impl LevelSide {
    /// Stop and trailing ladders are internal; only bid/ask levels are
    /// announced to observers.
    pub fn is_visible(self) -> bool {
        matches!(self, LevelSide::Bid | LevelSide::Ask)
    }
}

/// Immutable snapshot of a price level, as handed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Level {
    pub side: LevelSide,
    pub price: u64,
    /// Total displayed quantity across the level's orders
    pub volume: u64,
    /// Total iceberg reserve across the level's orders
    pub hidden_volume: u64,
    /// Number of live orders at this level
    pub orders: usize,
}

/// What happened to a level during a book mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UpdateKind {
    Add,
    Update,
    Delete,
}

/// A level change produced by a book mutation, ready for dispatch.
///
/// `top` is true when the affected level is the best of its side (or was,
/// for deletions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LevelUpdate {
    pub kind: UpdateKind,
    pub level: Level,
    pub top: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_sides() {
        assert!(LevelSide::Bid.is_visible());
        assert!(LevelSide::Ask.is_visible());
        assert!(!LevelSide::BuyStop.is_visible());
        assert!(!LevelSide::TrailingSellStop.is_visible());
    }
}
