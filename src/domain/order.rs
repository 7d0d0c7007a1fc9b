// ============================================================================
// Order Domain Model
// ============================================================================

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sentinel meaning "no visible-quantity cap" (the order is fully displayed).
pub const FULLY_VISIBLE: u64 = u64::MAX;

/// Sentinel meaning "no slippage cap" for market orders.
pub const UNLIMITED_SLIPPAGE: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
    TrailingStop,
    TrailingStopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimeInForce {
    /// Good Till Cancel - rests until filled or cancelled
    GoodTillCancel,
    /// Immediate Or Cancel - fill what is possible on arrival, cancel the rest
    ImmediateOrCancel,
    /// Fill Or Kill - fill entirely on arrival or leave no trace
    FillOrKill,
}

// ============================================================================
// Order Entity
// ============================================================================

/// A single order as tracked by the engine.
///
/// Prices and quantities are unsigned integers in venue-defined ticks and
/// lots; the engine never performs floating-point arithmetic.
///
/// Quantity accounting: `quantity` is the total the order was (last) sized
/// to, `executed_quantity` what has traded, `leaves_quantity` the visible
/// slice currently eligible to trade, and `hidden_quantity` the iceberg
/// reserve that replenishes the slice. `remaining()` is the untraded total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Order {
    pub id: u64,
    pub symbol_id: u32,
    pub order_type: OrderType,
    pub side: Side,
    /// Limit price; for stop-limit orders the post-trigger limit price.
    /// Zero for market and plain stop orders.
    pub price: u64,
    /// Trigger price for stop and trailing variants, zero otherwise
    pub stop_price: u64,
    /// Trailing offset: positive = absolute ticks, negative = basis points
    /// of the reference price, zero = non-trailing
    pub trail_distance: i64,
    pub quantity: u64,
    pub executed_quantity: u64,
    pub leaves_quantity: u64,
    pub hidden_quantity: u64,
    /// Display cap for iceberg orders; [`FULLY_VISIBLE`] for plain orders
    pub max_visible_quantity: u64,
    pub time_in_force: TimeInForce,
    /// All-Or-None attribute: never partially fills while resting
    pub all_or_none: bool,
    /// Market orders only: cap on divergence from the first-match price
    pub slippage: u64,
}

impl Order {
    fn base(id: u64, symbol_id: u32, order_type: OrderType, side: Side, quantity: u64) -> Self {
        Self {
            id,
            symbol_id,
            order_type,
            side,
            price: 0,
            stop_price: 0,
            trail_distance: 0,
            quantity,
            executed_quantity: 0,
            leaves_quantity: quantity,
            hidden_quantity: 0,
            max_visible_quantity: FULLY_VISIBLE,
            time_in_force: TimeInForce::GoodTillCancel,
            all_or_none: false,
            slippage: UNLIMITED_SLIPPAGE,
        }
    }

    /// Market order with unlimited slippage
    pub fn market(id: u64, symbol_id: u32, side: Side, quantity: u64) -> Self {
        Self::base(id, symbol_id, OrderType::Market, side, quantity)
    }

    /// Market order that cancels once the fill price diverges from the
    /// first-match price by more than `slippage` ticks
    pub fn market_with_slippage(
        id: u64,
        symbol_id: u32,
        side: Side,
        quantity: u64,
        slippage: u64,
    ) -> Self {
        let mut order = Self::base(id, symbol_id, OrderType::Market, side, quantity);
        order.slippage = slippage;
        order
    }

    /// Limit order, Good-Till-Cancel by default
    pub fn limit(id: u64, symbol_id: u32, side: Side, price: u64, quantity: u64) -> Self {
        let mut order = Self::base(id, symbol_id, OrderType::Limit, side, quantity);
        order.price = price;
        order
    }

    /// Iceberg limit order: only `visible` lots are displayed at a time,
    /// the rest waits in a hidden reserve
    pub fn limit_iceberg(
        id: u64,
        symbol_id: u32,
        side: Side,
        price: u64,
        quantity: u64,
        visible: u64,
    ) -> Self {
        let mut order = Self::limit(id, symbol_id, side, price, quantity);
        order.max_visible_quantity = visible;
        order.leaves_quantity = quantity.min(visible);
        order.hidden_quantity = quantity - order.leaves_quantity;
        order
    }

    /// Stop order: becomes a market order when triggered
    pub fn stop(id: u64, symbol_id: u32, side: Side, stop_price: u64, quantity: u64) -> Self {
        let mut order = Self::base(id, symbol_id, OrderType::Stop, side, quantity);
        order.stop_price = stop_price;
        order
    }

    /// Stop-limit order: becomes a limit order at `price` when triggered
    pub fn stop_limit(
        id: u64,
        symbol_id: u32,
        side: Side,
        stop_price: u64,
        price: u64,
        quantity: u64,
    ) -> Self {
        let mut order = Self::base(id, symbol_id, OrderType::StopLimit, side, quantity);
        order.stop_price = stop_price;
        order.price = price;
        order
    }

    /// Trailing stop: the trigger price ratchets as the reference market
    /// price moves favorably, by `trail_distance` ticks (or basis points
    /// when negative)
    pub fn trailing_stop(
        id: u64,
        symbol_id: u32,
        side: Side,
        stop_price: u64,
        quantity: u64,
        trail_distance: i64,
    ) -> Self {
        let mut order = Self::stop(id, symbol_id, side, stop_price, quantity);
        order.order_type = OrderType::TrailingStop;
        order.trail_distance = trail_distance;
        order
    }

    /// Trailing stop-limit: trailing trigger, limit execution
    pub fn trailing_stop_limit(
        id: u64,
        symbol_id: u32,
        side: Side,
        stop_price: u64,
        price: u64,
        quantity: u64,
        trail_distance: i64,
    ) -> Self {
        let mut order = Self::stop_limit(id, symbol_id, side, stop_price, price, quantity);
        order.order_type = OrderType::TrailingStopLimit;
        order.trail_distance = trail_distance;
        order
    }

    /// Builder method: set the time-in-force
    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    /// Builder method: mark the order All-Or-None
    pub fn with_all_or_none(mut self) -> Self {
        self.all_or_none = true;
        self
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }

    pub fn is_market(&self) -> bool {
        self.order_type == OrderType::Market
    }

    pub fn is_limit(&self) -> bool {
        self.order_type == OrderType::Limit
    }

    pub fn is_stop(&self) -> bool {
        matches!(self.order_type, OrderType::Stop | OrderType::StopLimit)
    }

    pub fn is_trailing(&self) -> bool {
        matches!(
            self.order_type,
            OrderType::TrailingStop | OrderType::TrailingStopLimit
        )
    }

    /// Whether the order carries a limit price through trigger conversion
    pub fn has_limit_price(&self) -> bool {
        matches!(
            self.order_type,
            OrderType::Limit | OrderType::StopLimit | OrderType::TrailingStopLimit
        )
    }

    pub fn is_iceberg(&self) -> bool {
        self.max_visible_quantity != FULLY_VISIBLE
    }

    pub fn is_ioc(&self) -> bool {
        self.time_in_force == TimeInForce::ImmediateOrCancel
    }

    pub fn is_fok(&self) -> bool {
        self.time_in_force == TimeInForce::FillOrKill
    }

    /// Untraded total: visible slice plus hidden reserve
    pub fn remaining(&self) -> u64 {
        self.leaves_quantity + self.hidden_quantity
    }

    /// Currently displayed quantity
    pub fn visible_quantity(&self) -> u64 {
        self.leaves_quantity
    }

    pub fn is_filled(&self) -> bool {
        self.remaining() == 0
    }

    // ========================================================================
    // Quantity accounting
    // ========================================================================

    /// Consume `quantity` as the aggressor: drains the visible slice first,
    /// then the reserve.
    pub(crate) fn fill(&mut self, quantity: u64) {
        debug_assert!(quantity <= self.remaining());
        let from_leaves = quantity.min(self.leaves_quantity);
        self.leaves_quantity -= from_leaves;
        self.hidden_quantity -= quantity - from_leaves;
        self.executed_quantity += quantity;
    }

    /// Recompute the visible/hidden split against the display cap. Called
    /// before the order (re-)enters a book.
    pub(crate) fn reslice(&mut self) {
        let remaining = self.remaining();
        self.leaves_quantity = remaining.min(self.max_visible_quantity);
        self.hidden_quantity = remaining - self.leaves_quantity;
    }

    /// Shrink the untraded total to `new_remaining`, draining the reserve
    /// before the visible slice so queue position is unaffected. Also
    /// re-bases `quantity` so conservation holds.
    pub(crate) fn set_remaining(&mut self, new_remaining: u64) {
        debug_assert!(new_remaining <= self.remaining());
        self.leaves_quantity = self.leaves_quantity.min(new_remaining);
        self.hidden_quantity = new_remaining - self.leaves_quantity;
        self.quantity = self.executed_quantity + new_remaining;
    }

    /// Re-base the untraded total to `new_remaining` (grow or shrink) and
    /// rebuild the visible/hidden split. Queue position is the caller's
    /// concern; this is the modify/replace path.
    pub(crate) fn resize_remaining(&mut self, new_remaining: u64) {
        self.leaves_quantity = new_remaining.min(self.max_visible_quantity);
        self.hidden_quantity = new_remaining - self.leaves_quantity;
        self.quantity = self.executed_quantity + new_remaining;
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
            OrderType::Stop => write!(f, "stop"),
            OrderType::StopLimit => write!(f, "stop-limit"),
            OrderType::TrailingStop => write!(f, "trailing-stop"),
            OrderType::TrailingStopLimit => write!(f, "trailing-stop-limit"),
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::GoodTillCancel => write!(f, "GTC"),
            TimeInForce::ImmediateOrCancel => write!(f, "IOC"),
            TimeInForce::FillOrKill => write!(f, "FOK"),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order(#{}, {} {} {}@{}, {} of {} left)",
            self.id,
            self.side,
            self.order_type,
            self.quantity,
            if self.has_limit_price() { self.price } else { self.stop_price },
            self.remaining(),
            self.quantity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_out() {
        assert_eq!(Side::Buy.to_string(), "buy");
        assert_eq!(OrderType::TrailingStop.to_string(), "trailing-stop");
        assert_eq!(TimeInForce::FillOrKill.to_string(), "FOK");
        let order = Order::limit(7, 1, Side::Sell, 100, 10);
        assert_eq!(order.to_string(), "Order(#7, sell limit 10@100, 10 of 10 left)");
    }

    #[test]
    fn test_limit_order_defaults() {
        let order = Order::limit(1, 1, Side::Buy, 100, 10);
        assert_eq!(order.leaves_quantity, 10);
        assert_eq!(order.hidden_quantity, 0);
        assert_eq!(order.remaining(), 10);
        assert_eq!(order.time_in_force, TimeInForce::GoodTillCancel);
        assert!(!order.is_iceberg());
        assert!(!order.all_or_none);
    }

    #[test]
    fn test_iceberg_split() {
        let order = Order::limit_iceberg(1, 1, Side::Sell, 100, 10, 2);
        assert_eq!(order.leaves_quantity, 2);
        assert_eq!(order.hidden_quantity, 8);
        assert_eq!(order.remaining(), 10);
        assert!(order.is_iceberg());
    }

    #[test]
    fn test_fill_drains_visible_then_hidden() {
        let mut order = Order::limit_iceberg(1, 1, Side::Sell, 100, 10, 4);
        order.fill(6);
        assert_eq!(order.executed_quantity, 6);
        assert_eq!(order.leaves_quantity, 0);
        assert_eq!(order.hidden_quantity, 4);
        order.reslice();
        assert_eq!(order.leaves_quantity, 4);
        assert_eq!(order.hidden_quantity, 0);
    }

    #[test]
    fn test_set_remaining_drains_reserve_first() {
        let mut order = Order::limit_iceberg(1, 1, Side::Sell, 100, 10, 4);
        order.set_remaining(5);
        assert_eq!(order.leaves_quantity, 4);
        assert_eq!(order.hidden_quantity, 1);
        order.set_remaining(2);
        assert_eq!(order.leaves_quantity, 2);
        assert_eq!(order.hidden_quantity, 0);
        assert_eq!(order.quantity, 2);
    }

    #[test]
    fn test_builders() {
        let order = Order::limit(1, 1, Side::Buy, 100, 10)
            .with_time_in_force(TimeInForce::ImmediateOrCancel)
            .with_all_or_none();
        assert!(order.is_ioc());
        assert!(order.all_or_none);
    }

    #[test]
    fn test_trailing_constructor() {
        let order = Order::trailing_stop(7, 1, Side::Sell, 97, 5, 3);
        assert_eq!(order.order_type, OrderType::TrailingStop);
        assert_eq!(order.stop_price, 97);
        assert_eq!(order.trail_distance, 3);
        assert!(order.is_trailing());
        assert!(!order.is_stop());
    }
}
