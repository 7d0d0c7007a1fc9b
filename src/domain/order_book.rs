// ============================================================================
// Order Book Domain Model
// ============================================================================

use std::collections::BTreeMap;

use crate::domain::arena::{FifoList, OrderArena, OrderSlot};
use crate::domain::level::{Level, LevelSide, LevelUpdate, UpdateKind};
use crate::domain::order::{Order, OrderType, Side};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Aggregate state of one price level.
#[derive(Debug, Default)]
pub(crate) struct LevelData {
    pub list: FifoList,
    /// Sum of the visible slices of the level's orders
    pub volume: u64,
    /// Sum of the iceberg reserves of the level's orders
    pub hidden_volume: u64,
}

impl LevelData {
    fn new() -> Self {
        Self::default()
    }
}

/// Immutable depth snapshot of one book, for drivers and market data.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderBookSnapshot {
    pub symbol_id: u32,
    /// Bid levels best-first as `(price, visible volume)`
    pub bids: Vec<(u64, u64)>,
    /// Ask levels best-first as `(price, visible volume)`
    pub asks: Vec<(u64, u64)>,
    /// Ask minus bid, absent when a side is empty or the book is crossed
    pub spread: Option<u64>,
    /// Top-of-book midpoint, rounding toward zero
    pub mid_price: Option<u64>,
    pub last_trade_price: Option<u64>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<u64> {
        self.bids.first().map(|(price, _)| *price)
    }

    pub fn best_ask(&self) -> Option<u64> {
        self.asks.first().map(|(price, _)| *price)
    }

    pub fn total_bid_volume(&self) -> u64 {
        self.bids.iter().map(|(_, volume)| volume).sum()
    }

    pub fn total_ask_volume(&self) -> u64 {
        self.asks.iter().map(|(_, volume)| volume).sum()
    }
}

/// Outcome of consuming quantity from a resting order.
#[derive(Debug)]
pub(crate) enum RestingFill {
    /// The order still has displayed quantity at its level
    Partial { update: LevelUpdate },
    /// The visible slice was exhausted and refilled from the reserve;
    /// the order moved to the tail of its level
    Replenished { order: Order, update: LevelUpdate },
    /// The order was fully consumed and left the book
    Completed { order: Order, update: LevelUpdate },
}

// ============================================================================
// Order Book
// ============================================================================

/// Single-symbol order book.
///
/// Six price ladders (bid, ask, two stop, two trailing-stop), each a sorted
/// map from price to a FIFO level. Order nodes live in a slab arena and are
/// threaded into their level's intrusive list, so lookup by handle, in-level
/// removal, and tail requeue are all O(1); level discovery is O(log L).
///
/// The book also tracks the reference prices stop triggering and trailing
/// recomputation read: the last trade prices per side and the per-side
/// matching prices.
#[derive(Debug)]
pub struct OrderBook {
    symbol_id: u32,
    pub(crate) arena: OrderArena,
    ladders: [BTreeMap<u64, LevelData>; 6],

    last_trade_price: Option<u64>,
    last_bid_price: Option<u64>,
    last_ask_price: Option<u64>,
    matching_bid: Option<u64>,
    matching_ask: Option<u64>,

    /// Last trailing references applied, used to batch recomputation
    /// to one pass per reference move
    pub(crate) trailing_bid: Option<u64>,
    pub(crate) trailing_ask: Option<u64>,
}

impl LevelSide {
    fn index(self) -> usize {
        match self {
            LevelSide::Bid => 0,
            LevelSide::Ask => 1,
            LevelSide::BuyStop => 2,
            LevelSide::SellStop => 3,
            LevelSide::TrailingBuyStop => 4,
            LevelSide::TrailingSellStop => 5,
        }
    }

    /// Whether best-first iteration runs from the highest price down
    fn descends(self) -> bool {
        matches!(
            self,
            LevelSide::Bid | LevelSide::SellStop | LevelSide::TrailingSellStop
        )
    }
}

impl OrderBook {
    pub fn new(symbol_id: u32) -> Self {
        Self {
            symbol_id,
            arena: OrderArena::new(),
            ladders: Default::default(),
            last_trade_price: None,
            last_bid_price: None,
            last_ask_price: None,
            matching_bid: None,
            matching_ask: None,
            trailing_bid: None,
            trailing_ask: None,
        }
    }

    pub fn symbol_id(&self) -> u32 {
        self.symbol_id
    }

    /// Which ladder hosts an order while it rests
    pub(crate) fn resting_side(order: &Order) -> LevelSide {
        match (order.order_type, order.side) {
            (OrderType::Market | OrderType::Limit, Side::Buy) => LevelSide::Bid,
            (OrderType::Market | OrderType::Limit, Side::Sell) => LevelSide::Ask,
            (OrderType::Stop | OrderType::StopLimit, Side::Buy) => LevelSide::BuyStop,
            (OrderType::Stop | OrderType::StopLimit, Side::Sell) => LevelSide::SellStop,
            (OrderType::TrailingStop | OrderType::TrailingStopLimit, Side::Buy) => {
                LevelSide::TrailingBuyStop
            },
            (OrderType::TrailingStop | OrderType::TrailingStopLimit, Side::Sell) => {
                LevelSide::TrailingSellStop
            },
        }
    }

    fn resting_key(order: &Order) -> u64 {
        match Self::resting_side(order) {
            LevelSide::Bid | LevelSide::Ask => order.price,
            _ => order.stop_price,
        }
    }

    fn best_key(&self, side: LevelSide) -> Option<u64> {
        let ladder = &self.ladders[side.index()];
        if side.descends() {
            ladder.keys().next_back().copied()
        } else {
            ladder.keys().next().copied()
        }
    }

    // ========================================================================
    // Top of book
    // ========================================================================

    pub fn best_bid(&self) -> Option<u64> {
        self.best_key(LevelSide::Bid)
    }

    pub fn best_ask(&self) -> Option<u64> {
        self.best_key(LevelSide::Ask)
    }

    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid(), self.best_ask()), (Some(b), Some(a)) if b >= a)
    }

    /// Best trigger price of a stop or trailing ladder
    pub(crate) fn best_stop_price(&self, side: LevelSide) -> Option<u64> {
        debug_assert!(!side.is_visible());
        self.best_key(side)
    }

    /// Head order of the best level of a ladder
    pub(crate) fn front_slot(&self, side: LevelSide) -> Option<OrderSlot> {
        let key = self.best_key(side)?;
        self.ladders[side.index()].get(&key).and_then(|level| level.list.front())
    }

    /// Best opposite level an aggressor of `side` would trade against:
    /// `(level price, head order slot)`
    pub(crate) fn best_opposite(&self, side: Side) -> Option<(u64, OrderSlot)> {
        let opposite = match side {
            Side::Buy => LevelSide::Ask,
            Side::Sell => LevelSide::Bid,
        };
        let price = self.best_key(opposite)?;
        let slot = self.ladders[opposite.index()]
            .get(&price)
            .and_then(|level| level.list.front())?;
        Some((price, slot))
    }

    // ========================================================================
    // Reference prices
    // ========================================================================

    /// Record one execution leg. The buy leg moves the bid references, the
    /// sell leg the ask references.
    pub(crate) fn record_trade(&mut self, leg_side: Side, price: u64) {
        self.last_trade_price = Some(price);
        match leg_side {
            Side::Buy => {
                self.last_bid_price = Some(price);
                self.matching_bid = Some(price);
            },
            Side::Sell => {
                self.last_ask_price = Some(price);
                self.matching_ask = Some(price);
            },
        }
    }

    pub fn last_trade_price(&self) -> Option<u64> {
        self.last_trade_price
    }

    pub fn matching_bid(&self) -> Option<u64> {
        self.matching_bid
    }

    pub fn matching_ask(&self) -> Option<u64> {
        self.matching_ask
    }

    /// Bid-side market reference for sell-stop triggering: the higher of the
    /// last bid-side trade and the best bid, or 0 with no market at all
    pub(crate) fn market_bid(&self) -> u64 {
        match (self.matching_bid, self.best_bid()) {
            (Some(m), Some(b)) => m.max(b),
            (Some(m), None) => m,
            (None, Some(b)) => b,
            (None, None) => 0,
        }
    }

    /// Ask-side market reference for buy-stop triggering: the lower of the
    /// last ask-side trade and the best ask, or `u64::MAX` with no market
    pub(crate) fn market_ask(&self) -> u64 {
        match (self.matching_ask, self.best_ask()) {
            (Some(m), Some(a)) => m.min(a),
            (Some(m), None) => m,
            (None, Some(a)) => a,
            (None, None) => u64::MAX,
        }
    }

    /// Conservative bid reference for sell trailing stops: ratchets only
    /// when both the printed and quoted bid have moved up
    pub(crate) fn trailing_ref_bid(&self) -> Option<u64> {
        match (self.last_bid_price, self.best_bid()) {
            (Some(l), Some(b)) => Some(l.min(b)),
            (Some(l), None) => Some(l),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// Conservative ask reference for buy trailing stops
    pub(crate) fn trailing_ref_ask(&self) -> Option<u64> {
        match (self.last_ask_price, self.best_ask()) {
            (Some(l), Some(a)) => Some(l.max(a)),
            (Some(l), None) => Some(l),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }

    // ========================================================================
    // Structural operations
    // ========================================================================

    fn level_snapshot(side: LevelSide, price: u64, level: &LevelData) -> Level {
        Level {
            side,
            price,
            volume: level.volume,
            hidden_volume: level.hidden_volume,
            orders: level.list.len(),
        }
    }

    /// Insert a limit order at the tail of its price level.
    pub(crate) fn insert_resting(
        &mut self,
        mut order: Order,
        sequence: u64,
    ) -> (OrderSlot, LevelUpdate) {
        order.reslice();
        let side = if order.is_buy() { LevelSide::Bid } else { LevelSide::Ask };
        let price = order.price;
        let leaves = order.leaves_quantity;
        let hidden = order.hidden_quantity;

        let slot = self.arena.insert(order, sequence);
        let Self { arena, ladders, .. } = self;
        let ladder = &mut ladders[side.index()];
        let is_new = !ladder.contains_key(&price);
        let level = ladder.entry(price).or_insert_with(LevelData::new);
        level.volume += leaves;
        level.hidden_volume += hidden;
        arena.push_back(&mut level.list, slot);
        let snapshot = Self::level_snapshot(side, price, level);

        let top = self.best_key(side) == Some(price);
        let kind = if is_new { UpdateKind::Add } else { UpdateKind::Update };
        (slot, LevelUpdate { kind, level: snapshot, top })
    }

    /// Insert a stop or trailing-stop order at the tail of its trigger level.
    /// Stop ladders are internal, so no level update is produced.
    pub(crate) fn insert_stop(&mut self, mut order: Order, sequence: u64) -> OrderSlot {
        order.reslice();
        let side = Self::resting_side(&order);
        debug_assert!(!side.is_visible());
        let key = order.stop_price;
        let leaves = order.leaves_quantity;
        let hidden = order.hidden_quantity;

        let slot = self.arena.insert(order, sequence);
        let Self { arena, ladders, .. } = self;
        let level = ladders[side.index()].entry(key).or_insert_with(LevelData::new);
        level.volume += leaves;
        level.hidden_volume += hidden;
        arena.push_back(&mut level.list, slot);
        slot
    }

    /// Remove an order from whichever ladder hosts it. Returns the order as
    /// it left the book, plus a level update when the ladder is visible.
    pub(crate) fn remove_order(&mut self, slot: OrderSlot) -> (Order, Option<LevelUpdate>) {
        let order = self.arena.get(slot).order;
        let side = Self::resting_side(&order);
        let key = Self::resting_key(&order);
        let was_top = self.best_key(side) == Some(key);

        let Self { arena, ladders, .. } = self;
        let ladder = &mut ladders[side.index()];
        let level = match ladder.get_mut(&key) {
            Some(level) => level,
            None => unreachable!("resting order without a level"),
        };
        arena.unlink(&mut level.list, slot);
        level.volume -= order.leaves_quantity;
        level.hidden_volume -= order.hidden_quantity;

        let (kind, snapshot) = if level.list.is_empty() {
            let snapshot = Self::level_snapshot(side, key, level);
            ladder.remove(&key);
            (UpdateKind::Delete, snapshot)
        } else {
            (UpdateKind::Update, Self::level_snapshot(side, key, level))
        };
        arena.remove(slot);

        let update = side
            .is_visible()
            .then_some(LevelUpdate { kind, level: snapshot, top: was_top });
        (order, update)
    }

    /// Consume `quantity` from a resting bid/ask order, handling iceberg
    /// replenishment and full-consumption removal.
    pub(crate) fn fill_resting(&mut self, slot: OrderSlot, quantity: u64) -> RestingFill {
        let before = self.arena.get(slot).order;
        let side = if before.is_buy() { LevelSide::Bid } else { LevelSide::Ask };
        let price = before.price;
        let top = self.best_key(side) == Some(price);
        let visible_used = quantity.min(before.leaves_quantity);
        let hidden_used = quantity - visible_used;

        let Self { arena, ladders, .. } = self;
        let ladder = &mut ladders[side.index()];
        let level = match ladder.get_mut(&price) {
            Some(level) => level,
            None => unreachable!("resting order without a level"),
        };
        level.volume -= visible_used;
        level.hidden_volume -= hidden_used;

        let node = arena.get_mut(slot);
        node.order.fill(quantity);
        let after = node.order;

        if after.leaves_quantity > 0 {
            let update = LevelUpdate {
                kind: UpdateKind::Update,
                level: Self::level_snapshot(side, price, level),
                top,
            };
            return RestingFill::Partial { update };
        }

        if after.hidden_quantity > 0 {
            // Refill the display slice and requeue behind the level
            let refill = after.hidden_quantity.min(after.max_visible_quantity);
            let node = arena.get_mut(slot);
            node.order.hidden_quantity -= refill;
            node.order.leaves_quantity = refill;
            let order = node.order;
            level.volume += refill;
            level.hidden_volume -= refill;
            arena.unlink(&mut level.list, slot);
            arena.push_back(&mut level.list, slot);
            let update = LevelUpdate {
                kind: UpdateKind::Update,
                level: Self::level_snapshot(side, price, level),
                top,
            };
            return RestingFill::Replenished { order, update };
        }

        arena.unlink(&mut level.list, slot);
        let (kind, snapshot) = if level.list.is_empty() {
            let snapshot = Self::level_snapshot(side, price, level);
            ladder.remove(&price);
            (UpdateKind::Delete, snapshot)
        } else {
            (UpdateKind::Update, Self::level_snapshot(side, price, level))
        };
        arena.remove(slot);
        RestingFill::Completed {
            order: after,
            update: LevelUpdate { kind, level: snapshot, top },
        }
    }

    /// Shrink a resting order's untraded total in place (reserve first), so
    /// queue position is kept. `new_remaining` must be non-zero.
    pub(crate) fn set_resting_quantity(
        &mut self,
        slot: OrderSlot,
        new_remaining: u64,
    ) -> (Order, Option<LevelUpdate>) {
        debug_assert!(new_remaining > 0);
        let before = self.arena.get(slot).order;
        let side = Self::resting_side(&before);
        let key = Self::resting_key(&before);
        let top = self.best_key(side) == Some(key);

        let Self { arena, ladders, .. } = self;
        let node = arena.get_mut(slot);
        node.order.set_remaining(new_remaining);
        let after = node.order;

        let level = match ladders[side.index()].get_mut(&key) {
            Some(level) => level,
            None => unreachable!("resting order without a level"),
        };
        level.volume -= before.leaves_quantity - after.leaves_quantity;
        level.hidden_volume -= before.hidden_quantity - after.hidden_quantity;

        let update = side.is_visible().then_some(LevelUpdate {
            kind: UpdateKind::Update,
            level: Self::level_snapshot(side, key, level),
            top,
        });
        (after, update)
    }

    /// Move a trailing stop to a new trigger level (tail of the new level).
    pub(crate) fn rekey_trailing(&mut self, slot: OrderSlot, new_stop: u64) -> Order {
        let order = self.arena.get(slot).order;
        let side = Self::resting_side(&order);
        debug_assert!(matches!(
            side,
            LevelSide::TrailingBuyStop | LevelSide::TrailingSellStop
        ));
        let old_key = order.stop_price;

        let Self { arena, ladders, .. } = self;
        let ladder = &mut ladders[side.index()];
        let level = match ladder.get_mut(&old_key) {
            Some(level) => level,
            None => unreachable!("trailing order without a level"),
        };
        arena.unlink(&mut level.list, slot);
        level.volume -= order.leaves_quantity;
        level.hidden_volume -= order.hidden_quantity;
        if level.list.is_empty() {
            ladder.remove(&old_key);
        }

        let node = arena.get_mut(slot);
        // Trailing stop-limits carry their limit price along with the
        // trigger, preserving the configured offset
        if node.order.order_type == OrderType::TrailingStopLimit {
            node.order.price = if new_stop >= old_key {
                node.order.price.saturating_add(new_stop - old_key)
            } else {
                node.order.price.saturating_sub(old_key - new_stop)
            };
        }
        node.order.stop_price = new_stop;
        let updated = node.order;

        let level = ladder.entry(new_stop).or_insert_with(LevelData::new);
        level.volume += updated.leaves_quantity;
        level.hidden_volume += updated.hidden_quantity;
        arena.push_back(&mut level.list, slot);
        updated
    }

    /// All orders of one trailing ladder, in trigger order.
    pub(crate) fn trailing_slots(&self, side: Side) -> Vec<OrderSlot> {
        let ladder_side = match side {
            Side::Buy => LevelSide::TrailingBuyStop,
            Side::Sell => LevelSide::TrailingSellStop,
        };
        let ladder = &self.ladders[ladder_side.index()];
        let mut slots = Vec::new();
        for level in ladder.values() {
            let mut cursor = level.list.front();
            while let Some(slot) = cursor {
                slots.push(slot);
                cursor = self.arena.next_of(slot);
            }
        }
        slots
    }

    /// Walk the opposite side best-first and decide whether `required`
    /// quantity is available at prices acceptable to the aggressor, with
    /// All-Or-None counterparties consumed whole. Overshooting the
    /// requirement through an indivisible counterparty fails the chain.
    pub(crate) fn matching_chain(
        &self,
        aggressor_side: Side,
        price_cap: u64,
        required: u64,
    ) -> bool {
        let opposite = match aggressor_side {
            Side::Buy => LevelSide::Ask,
            Side::Sell => LevelSide::Bid,
        };
        let ladder = &self.ladders[opposite.index()];
        let mut available: u64 = 0;

        let mut walk = |price: u64, level: &LevelData| -> Option<bool> {
            let acceptable = match aggressor_side {
                Side::Buy => price <= price_cap,
                Side::Sell => price >= price_cap,
            };
            if !acceptable {
                return Some(false);
            }
            let mut cursor = level.list.front();
            while let Some(slot) = cursor {
                let resting = &self.arena.get(slot).order;
                let need = required - available;
                let contribution = if resting.all_or_none {
                    resting.remaining()
                } else {
                    resting.remaining().min(need)
                };
                available += contribution;
                if available == required {
                    return Some(true);
                }
                if available > required {
                    return Some(false);
                }
                cursor = self.arena.next_of(slot);
            }
            None
        };

        if opposite.descends() {
            for (&price, level) in ladder.iter().rev() {
                if let Some(done) = walk(price, level) {
                    return done;
                }
            }
        } else {
            for (&price, level) in ladder.iter() {
                if let Some(done) = walk(price, level) {
                    return done;
                }
            }
        }
        false
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Ask minus bid; `None` when a side is empty or the book is crossed
    pub fn spread(&self) -> Option<u64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask.checked_sub(bid),
            _ => None,
        }
    }

    /// Midpoint of the top of book, rounding toward zero
    pub fn mid_price(&self) -> Option<u64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(((bid as u128 + ask as u128) / 2) as u64),
            _ => None,
        }
    }

    /// Best `depth` bid levels as `(price, visible volume)` pairs
    pub fn bid_depth(&self, depth: usize) -> Vec<(u64, u64)> {
        self.ladders[LevelSide::Bid.index()]
            .iter()
            .rev()
            .take(depth)
            .map(|(&price, level)| (price, level.volume))
            .collect()
    }

    /// Best `depth` ask levels as `(price, visible volume)` pairs
    pub fn ask_depth(&self, depth: usize) -> Vec<(u64, u64)> {
        self.ladders[LevelSide::Ask.index()]
            .iter()
            .take(depth)
            .map(|(&price, level)| (price, level.volume))
            .collect()
    }

    /// Depth snapshot of the visible book, `depth` levels per side
    pub fn snapshot(&self, depth: usize) -> OrderBookSnapshot {
        OrderBookSnapshot {
            symbol_id: self.symbol_id,
            bids: self.bid_depth(depth),
            asks: self.ask_depth(depth),
            spread: self.spread(),
            mid_price: self.mid_price(),
            last_trade_price: self.last_trade_price,
        }
    }

    /// Snapshot of one level of any ladder
    pub fn level(&self, side: LevelSide, price: u64) -> Option<Level> {
        self.ladders[side.index()]
            .get(&price)
            .map(|level| Self::level_snapshot(side, price, level))
    }

    /// Number of live orders across all ladders of this book
    pub fn order_count(&self) -> usize {
        self.arena.len()
    }

    /// Every live order in this book, in slot order
    pub(crate) fn all_orders(&self) -> Vec<Order> {
        self.arena.iter().map(|node| node.order).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> OrderBook {
        OrderBook::new(1)
    }

    #[test]
    fn test_insert_and_best_prices() {
        let mut book = book();
        book.insert_resting(Order::limit(1, 1, Side::Buy, 99, 10), 1);
        book.insert_resting(Order::limit(2, 1, Side::Buy, 100, 5), 2);
        book.insert_resting(Order::limit(3, 1, Side::Sell, 101, 7), 3);

        assert_eq!(book.best_bid(), Some(100));
        assert_eq!(book.best_ask(), Some(101));
        assert_eq!(book.spread(), Some(1));
        assert_eq!(book.mid_price(), Some(100));
        assert!(!book.is_crossed());
        assert_eq!(book.bid_depth(10), vec![(100, 5), (99, 10)]);
        assert_eq!(book.ask_depth(10), vec![(101, 7)]);
    }

    #[test]
    fn test_level_update_flags() {
        let mut book = book();
        let (_, update) = book.insert_resting(Order::limit(1, 1, Side::Buy, 100, 10), 1);
        assert_eq!(update.kind, UpdateKind::Add);
        assert!(update.top);

        let (_, update) = book.insert_resting(Order::limit(2, 1, Side::Buy, 100, 5), 2);
        assert_eq!(update.kind, UpdateKind::Update);
        assert_eq!(update.level.volume, 15);
        assert!(update.top);

        let (_, update) = book.insert_resting(Order::limit(3, 1, Side::Buy, 99, 5), 3);
        assert_eq!(update.kind, UpdateKind::Add);
        assert!(!update.top);
    }

    #[test]
    fn test_remove_deletes_empty_level() {
        let mut book = book();
        let (slot, _) = book.insert_resting(Order::limit(1, 1, Side::Sell, 101, 7), 1);
        let (order, update) = book.remove_order(slot);
        assert_eq!(order.id, 1);
        let update = update.expect("visible ladder produces an update");
        assert_eq!(update.kind, UpdateKind::Delete);
        assert!(update.top);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn test_fill_resting_partial_and_complete() {
        let mut book = book();
        let (slot, _) = book.insert_resting(Order::limit(1, 1, Side::Sell, 100, 10), 1);

        match book.fill_resting(slot, 4) {
            RestingFill::Partial { update } => {
                assert_eq!(update.level.volume, 6);
                assert!(update.top);
            },
            other => panic!("expected partial fill, got {other:?}"),
        }
        match book.fill_resting(slot, 6) {
            RestingFill::Completed { order, update } => {
                assert_eq!(order.executed_quantity, 10);
                assert_eq!(update.kind, UpdateKind::Delete);
            },
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn test_fill_resting_replenishes_iceberg_to_tail() {
        let mut book = book();
        let (iceberg, _) =
            book.insert_resting(Order::limit_iceberg(1, 1, Side::Sell, 100, 10, 2), 1);
        let (plain, _) = book.insert_resting(Order::limit(2, 1, Side::Sell, 100, 5), 2);

        match book.fill_resting(iceberg, 2) {
            RestingFill::Replenished { order, update } => {
                assert_eq!(order.leaves_quantity, 2);
                assert_eq!(order.hidden_quantity, 6);
                // 2 visible (replenished) + 5 plain
                assert_eq!(update.level.volume, 7);
                assert_eq!(update.level.hidden_volume, 6);
            },
            other => panic!("expected replenishment, got {other:?}"),
        }
        // The plain order is now at the head of the level
        assert_eq!(book.front_slot(LevelSide::Ask), Some(plain));
    }

    #[test]
    fn test_matching_chain_exact_fill() {
        let mut book = book();
        book.insert_resting(Order::limit(1, 1, Side::Sell, 100, 5), 1);
        book.insert_resting(Order::limit(2, 1, Side::Sell, 101, 5), 2);

        assert!(book.matching_chain(Side::Buy, 101, 10));
        assert!(book.matching_chain(Side::Buy, 101, 7));
        assert!(!book.matching_chain(Side::Buy, 100, 10));
        assert!(!book.matching_chain(Side::Buy, 101, 11));
    }

    #[test]
    fn test_matching_chain_aon_counterparty_is_indivisible() {
        let mut book = book();
        book.insert_resting(
            Order::limit(1, 1, Side::Sell, 100, 8).with_all_or_none(),
            1,
        );
        // A whole-AON counterparty overshoots a 5-lot requirement
        assert!(!book.matching_chain(Side::Buy, 100, 5));
        assert!(book.matching_chain(Side::Buy, 100, 8));
    }

    #[test]
    fn test_stop_ladder_orientation() {
        let mut book = book();
        book.insert_stop(Order::stop(1, 1, Side::Buy, 105, 5), 1);
        book.insert_stop(Order::stop(2, 1, Side::Buy, 103, 5), 2);
        book.insert_stop(Order::stop(3, 1, Side::Sell, 95, 5), 3);
        book.insert_stop(Order::stop(4, 1, Side::Sell, 97, 5), 4);

        // Nearest to the market triggers first
        assert_eq!(book.best_stop_price(LevelSide::BuyStop), Some(103));
        assert_eq!(book.best_stop_price(LevelSide::SellStop), Some(97));
    }

    #[test]
    fn test_market_references() {
        let mut book = book();
        assert_eq!(book.market_bid(), 0);
        assert_eq!(book.market_ask(), u64::MAX);

        book.insert_resting(Order::limit(1, 1, Side::Buy, 100, 10), 1);
        book.insert_resting(Order::limit(2, 1, Side::Sell, 102, 10), 2);
        assert_eq!(book.market_bid(), 100);
        assert_eq!(book.market_ask(), 102);

        book.record_trade(Side::Buy, 101);
        book.record_trade(Side::Sell, 101);
        assert_eq!(book.market_bid(), 101);
        assert_eq!(book.market_ask(), 101);
        assert_eq!(book.last_trade_price(), Some(101));
    }

    #[test]
    fn test_depth_snapshot() {
        let mut book = book();
        book.insert_resting(Order::limit(1, 1, Side::Buy, 99, 10), 1);
        book.insert_resting(Order::limit(2, 1, Side::Buy, 100, 5), 2);
        book.insert_resting(Order::limit(3, 1, Side::Sell, 102, 7), 3);

        let snapshot = book.snapshot(1);
        assert_eq!(snapshot.bids, vec![(100, 5)]);
        assert_eq!(snapshot.asks, vec![(102, 7)]);
        assert_eq!(snapshot.best_bid(), Some(100));
        assert_eq!(snapshot.best_ask(), Some(102));
        assert_eq!(snapshot.spread, Some(2));
        assert_eq!(snapshot.mid_price, Some(101));
        assert_eq!(snapshot.last_trade_price, None);

        let full = book.snapshot(10);
        assert_eq!(full.total_bid_volume(), 15);
        assert_eq!(full.total_ask_volume(), 7);
    }

    #[test]
    fn test_trailing_rekey() {
        let mut book = book();
        let slot = book.insert_stop(Order::trailing_stop(7, 1, Side::Sell, 97, 5, 3), 1);
        let updated = book.rekey_trailing(slot, 102);
        assert_eq!(updated.stop_price, 102);
        assert_eq!(book.best_stop_price(LevelSide::TrailingSellStop), Some(102));
        assert_eq!(book.level(LevelSide::TrailingSellStop, 97), None);
    }
}
