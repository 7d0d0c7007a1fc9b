// ============================================================================
// Market Manager
// Top-level orchestrator: registry, books, order index, command surface
// ============================================================================

use std::collections::HashMap;

use crate::domain::arena::OrderSlot;
use crate::domain::order::{Order, OrderType, Side};
use crate::domain::order_book::OrderBook;
use crate::domain::symbol::Symbol;
use crate::engine::matching::{match_aggressor, publish_level, rest_or_cancel};
use crate::engine::stops::{convert_triggered, drain, recalculate_trailing, stop_triggered, trail_offset};
use crate::error::{MarketError, MarketResult};
use crate::interfaces::MarketHandler;

/// Where a live order currently rests: which book, and which arena slot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OrderLocator {
    pub symbol_id: u32,
    pub slot: OrderSlot,
}

/// Flat map from order id to its location.
pub(crate) type OrderIndex = HashMap<u64, OrderLocator>;

/// The market manager owns all long-lived engine state: the symbol
/// registry, one order book per symbol, the global order index, and the
/// matching toggle. Commands run to completion synchronously; every effect
/// is announced to the injected [`MarketHandler`] in a total order.
///
/// Matching is enabled on construction. While disabled, commands may leave
/// books crossed; re-enabling drains every book immediately.
pub struct MarketManager<H: MarketHandler> {
    handler: H,
    symbols: HashMap<u32, Symbol>,
    books: HashMap<u32, OrderBook>,
    orders: OrderIndex,
    matching: bool,
    sequence: u64,
}

impl<H: MarketHandler> MarketManager<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            symbols: HashMap::new(),
            books: HashMap::new(),
            orders: OrderIndex::new(),
            matching: true,
            sequence: 0,
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    pub fn symbol(&self, id: u32) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    pub fn order_book(&self, symbol_id: u32) -> Option<&OrderBook> {
        self.books.get(&symbol_id)
    }

    /// Current state of a live order
    pub fn get_order(&self, id: u64) -> Option<Order> {
        let locator = self.orders.get(&id)?;
        let book = self.books.get(&locator.symbol_id)?;
        Some(book.arena.get(locator.slot).order)
    }

    /// Number of live orders across all books
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn is_matching_enabled(&self) -> bool {
        self.matching
    }

    // ========================================================================
    // Symbol and book lifecycle
    // ========================================================================

    pub fn add_symbol(&mut self, symbol: Symbol) -> MarketResult {
        if self.symbols.contains_key(&symbol.id) {
            return Err(MarketError::SymbolDuplicate);
        }
        self.symbols.insert(symbol.id, symbol.clone());
        self.handler.on_add_symbol(&symbol);
        Ok(())
    }

    pub fn delete_symbol(&mut self, id: u32) -> MarketResult {
        if !self.symbols.contains_key(&id) {
            return Err(MarketError::SymbolNotFound);
        }
        if self.books.contains_key(&id) {
            return Err(MarketError::OrderBookExists);
        }
        if let Some(symbol) = self.symbols.remove(&id) {
            self.handler.on_delete_symbol(&symbol);
        }
        Ok(())
    }

    pub fn add_order_book(&mut self, symbol_id: u32) -> MarketResult {
        if !self.symbols.contains_key(&symbol_id) {
            return Err(MarketError::SymbolNotFound);
        }
        if self.books.contains_key(&symbol_id) {
            return Err(MarketError::OrderBookDuplicate);
        }
        self.books.insert(symbol_id, OrderBook::new(symbol_id));
        self.handler.on_add_order_book(symbol_id);
        Ok(())
    }

    /// Remove a book together with every order resting in it. Each order is
    /// dropped from the index and announced before the book itself.
    pub fn delete_order_book(&mut self, symbol_id: u32) -> MarketResult {
        let Some(book) = self.books.remove(&symbol_id) else {
            return Err(MarketError::OrderBookNotFound);
        };
        for order in book.all_orders() {
            self.orders.remove(&order.id);
            self.handler.on_delete_order(&order);
        }
        self.handler.on_delete_order_book(symbol_id);
        Ok(())
    }

    // ========================================================================
    // Matching toggle
    // ========================================================================

    pub fn enable_matching(&mut self) {
        if self.matching {
            return;
        }
        self.matching = true;
        let Self {
            books,
            orders,
            handler,
            sequence,
            ..
        } = self;
        let mut symbol_ids: Vec<u32> = books.keys().copied().collect();
        symbol_ids.sort_unstable();
        for symbol_id in symbol_ids {
            if let Some(book) = books.get_mut(&symbol_id) {
                drain(book, orders, handler, sequence);
            }
        }
        self.check_integrity();
    }

    pub fn disable_matching(&mut self) {
        self.matching = false;
    }

    // ========================================================================
    // Order commands
    // ========================================================================

    pub fn add_order(&mut self, order: Order) -> MarketResult {
        self.validate_order(&order)?;
        match order.order_type {
            OrderType::Market => self.add_market_order(order),
            OrderType::Limit => self.add_limit_order(order),
            OrderType::Stop | OrderType::StopLimit => self.add_stop_order(order),
            OrderType::TrailingStop | OrderType::TrailingStopLimit => {
                self.add_trailing_stop_order(order)
            },
        }
        self.check_integrity();
        Ok(())
    }

    /// Decrease an order's untraded quantity without touching its price or
    /// queue position; at zero the order is cancelled.
    pub fn reduce_order(&mut self, id: u64, quantity: u64) -> MarketResult {
        if quantity == 0 {
            return Err(MarketError::OrderQuantityInvalid);
        }
        let (symbol_id, slot) = self.locate(id)?;
        let Self {
            books,
            orders,
            handler,
            matching,
            sequence,
            ..
        } = self;
        let Some(book) = books.get_mut(&symbol_id) else {
            return Err(MarketError::OrderNotFound);
        };

        let remaining = book.arena.get(slot).order.remaining();
        let new_remaining = remaining.saturating_sub(quantity);
        if new_remaining == 0 {
            let (order, update) = book.remove_order(slot);
            orders.remove(&id);
            handler.on_delete_order(&order);
            if let Some(update) = update {
                publish_level(handler, symbol_id, &update);
            }
        } else {
            let (order, update) = book.set_resting_quantity(slot, new_remaining);
            handler.on_update_order(&order);
            if let Some(update) = update {
                publish_level(handler, symbol_id, &update);
            }
        }

        if *matching {
            drain(book, orders, handler, sequence);
        } else {
            recalculate_trailing(book, handler);
        }
        self.check_integrity();
        Ok(())
    }

    /// In-place modification. A strict quantity decrease at the same price
    /// keeps time priority; any price change or quantity increase re-queues
    /// the order at the tail of its (new) level and re-matches it.
    pub fn modify_order(&mut self, id: u64, new_price: u64, new_quantity: u64) -> MarketResult {
        if new_price == 0 {
            return Err(MarketError::OrderPriceInvalid);
        }
        if new_quantity == 0 {
            return Err(MarketError::OrderQuantityInvalid);
        }
        let (symbol_id, slot) = self.locate(id)?;
        let Self {
            books,
            orders,
            handler,
            matching,
            sequence,
            ..
        } = self;
        let Some(book) = books.get_mut(&symbol_id) else {
            return Err(MarketError::OrderNotFound);
        };

        let current = book.arena.get(slot).order;
        if !current.is_limit() {
            return Err(MarketError::OrderTypeInvalid);
        }

        if new_price == current.price && new_quantity <= current.remaining() {
            if new_quantity < current.remaining() {
                let (order, update) = book.set_resting_quantity(slot, new_quantity);
                handler.on_update_order(&order);
                if let Some(update) = update {
                    publish_level(handler, symbol_id, &update);
                }
            } else {
                handler.on_update_order(&current);
            }
        } else {
            let (mut order, update) = book.remove_order(slot);
            orders.remove(&id);
            if let Some(update) = update {
                publish_level(handler, symbol_id, &update);
            }
            order.price = new_price;
            order.resize_remaining(new_quantity);
            handler.on_update_order(&order);
            if *matching {
                match_aggressor(book, orders, handler, &mut order);
            }
            rest_or_cancel(book, orders, handler, order, sequence);
        }

        if *matching {
            drain(book, orders, handler, sequence);
        } else {
            recalculate_trailing(book, handler);
        }
        self.check_integrity();
        Ok(())
    }

    /// Atomic cancel-then-add under a new id. The replacement is a fresh
    /// limit order and always starts at the tail of its level.
    pub fn replace_order(
        &mut self,
        id: u64,
        new_id: u64,
        new_price: u64,
        new_quantity: u64,
    ) -> MarketResult {
        if new_id == 0 {
            return Err(MarketError::OrderIdInvalid);
        }
        if new_price == 0 {
            return Err(MarketError::OrderPriceInvalid);
        }
        if new_quantity == 0 {
            return Err(MarketError::OrderQuantityInvalid);
        }
        let (symbol_id, slot) = self.locate(id)?;
        if new_id != id && self.orders.contains_key(&new_id) {
            return Err(MarketError::OrderDuplicate);
        }
        let Self {
            books,
            orders,
            handler,
            matching,
            sequence,
            ..
        } = self;
        let Some(book) = books.get_mut(&symbol_id) else {
            return Err(MarketError::OrderNotFound);
        };

        let current = book.arena.get(slot).order;
        if !current.is_limit() {
            return Err(MarketError::OrderTypeInvalid);
        }

        let (old, update) = book.remove_order(slot);
        orders.remove(&id);
        handler.on_delete_order(&old);
        if let Some(update) = update {
            publish_level(handler, symbol_id, &update);
        }

        let mut order = Order::limit(new_id, symbol_id, old.side, new_price, new_quantity)
            .with_time_in_force(old.time_in_force);
        order.all_or_none = old.all_or_none;
        order.max_visible_quantity = old.max_visible_quantity;
        order.reslice();

        handler.on_add_order(&order);
        if *matching {
            match_aggressor(book, orders, handler, &mut order);
        }
        rest_or_cancel(book, orders, handler, order, sequence);

        if *matching {
            drain(book, orders, handler, sequence);
        } else {
            recalculate_trailing(book, handler);
        }
        self.check_integrity();
        Ok(())
    }

    /// Unconditional cancel, regardless of which ladder hosts the order.
    pub fn delete_order(&mut self, id: u64) -> MarketResult {
        let (symbol_id, slot) = self.locate(id)?;
        let Self {
            books,
            orders,
            handler,
            matching,
            sequence,
            ..
        } = self;
        let Some(book) = books.get_mut(&symbol_id) else {
            return Err(MarketError::OrderNotFound);
        };

        let (order, update) = book.remove_order(slot);
        orders.remove(&id);
        handler.on_delete_order(&order);
        if let Some(update) = update {
            publish_level(handler, symbol_id, &update);
        }

        if *matching {
            drain(book, orders, handler, sequence);
        } else {
            recalculate_trailing(book, handler);
        }
        self.check_integrity();
        Ok(())
    }

    // ========================================================================
    // Add-order dispatch
    // ========================================================================

    fn add_market_order(&mut self, mut order: Order) {
        let Self {
            books,
            orders,
            handler,
            matching,
            sequence,
            ..
        } = self;
        let Some(book) = books.get_mut(&order.symbol_id) else {
            return;
        };
        handler.on_add_order(&order);
        if *matching {
            match_aggressor(book, orders, handler, &mut order);
        }
        // Market orders never rest
        handler.on_delete_order(&order);
        if *matching {
            drain(book, orders, handler, sequence);
        }
    }

    fn add_limit_order(&mut self, mut order: Order) {
        let Self {
            books,
            orders,
            handler,
            matching,
            sequence,
            ..
        } = self;
        let Some(book) = books.get_mut(&order.symbol_id) else {
            return;
        };
        // An infeasible Fill-Or-Kill leaves no trace at all, whether or not
        // automatic matching is running
        if order.is_fok() && !book.matching_chain(order.side, order.price, order.remaining()) {
            tracing::debug!(order_id = order.id, "fill-or-kill infeasible, killed");
            return;
        }
        handler.on_add_order(&order);
        if *matching {
            match_aggressor(book, orders, handler, &mut order);
        }
        rest_or_cancel(book, orders, handler, order, sequence);
        if *matching {
            drain(book, orders, handler, sequence);
        }
    }

    fn add_stop_order(&mut self, mut order: Order) {
        let Self {
            books,
            orders,
            handler,
            matching,
            sequence,
            ..
        } = self;
        let Some(book) = books.get_mut(&order.symbol_id) else {
            return;
        };

        if *matching && stop_triggered(book, &order) {
            // Triggered on arrival: convert and run immediately
            convert_triggered(&mut order);
            handler.on_add_order(&order);
            match_aggressor(book, orders, handler, &mut order);
            if order.has_limit_price() {
                rest_or_cancel(book, orders, handler, order, sequence);
            } else {
                handler.on_delete_order(&order);
            }
            drain(book, orders, handler, sequence);
            return;
        }

        handler.on_add_order(&order);
        *sequence += 1;
        let slot = book.insert_stop(order, *sequence);
        orders.insert(
            order.id,
            OrderLocator {
                symbol_id: order.symbol_id,
                slot,
            },
        );
        if *matching {
            drain(book, orders, handler, sequence);
        } else {
            recalculate_trailing(book, handler);
        }
    }

    fn add_trailing_stop_order(&mut self, mut order: Order) {
        let Self {
            books,
            orders,
            handler,
            matching,
            sequence,
            ..
        } = self;
        let Some(book) = books.get_mut(&order.symbol_id) else {
            return;
        };

        if *matching && stop_triggered(book, &order) {
            convert_triggered(&mut order);
            handler.on_add_order(&order);
            match_aggressor(book, orders, handler, &mut order);
            if order.has_limit_price() {
                rest_or_cancel(book, orders, handler, order, sequence);
            } else {
                handler.on_delete_order(&order);
            }
            drain(book, orders, handler, sequence);
            return;
        }

        // Base the trigger on the current trailing reference when one exists
        let reference = match order.side {
            Side::Sell => book.trailing_ref_bid(),
            Side::Buy => book.trailing_ref_ask(),
        };
        if let Some(reference) = reference {
            let offset = trail_offset(order.trail_distance, reference);
            order.stop_price = match order.side {
                Side::Sell => reference.saturating_sub(offset),
                Side::Buy => reference.saturating_add(offset),
            };
        }

        handler.on_add_order(&order);
        *sequence += 1;
        let slot = book.insert_stop(order, *sequence);
        orders.insert(
            order.id,
            OrderLocator {
                symbol_id: order.symbol_id,
                slot,
            },
        );
        if *matching {
            drain(book, orders, handler, sequence);
        } else {
            recalculate_trailing(book, handler);
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    fn validate_order(&self, order: &Order) -> MarketResult {
        if order.id == 0 {
            return Err(MarketError::OrderIdInvalid);
        }
        if order.quantity == 0 {
            return Err(MarketError::OrderQuantityInvalid);
        }
        if order.is_iceberg() && order.max_visible_quantity == 0 {
            return Err(MarketError::OrderQuantityInvalid);
        }
        match order.order_type {
            OrderType::Market => {},
            OrderType::Limit => {
                if order.price == 0 {
                    return Err(MarketError::OrderPriceInvalid);
                }
            },
            OrderType::Stop => {
                if order.stop_price == 0 {
                    return Err(MarketError::OrderPriceInvalid);
                }
            },
            OrderType::StopLimit => {
                if order.price == 0 || order.stop_price == 0 {
                    return Err(MarketError::OrderPriceInvalid);
                }
            },
            OrderType::TrailingStop => {
                if order.trail_distance == 0 {
                    return Err(MarketError::OrderPriceInvalid);
                }
            },
            OrderType::TrailingStopLimit => {
                if order.price == 0 || order.trail_distance == 0 {
                    return Err(MarketError::OrderPriceInvalid);
                }
            },
        }
        if !self.symbols.contains_key(&order.symbol_id) {
            return Err(MarketError::SymbolNotFound);
        }
        if !self.books.contains_key(&order.symbol_id) {
            return Err(MarketError::OrderBookNotFound);
        }
        if self.orders.contains_key(&order.id) {
            return Err(MarketError::OrderDuplicate);
        }
        Ok(())
    }

    fn locate(&self, id: u64) -> Result<(u32, OrderSlot), MarketError> {
        self.orders
            .get(&id)
            .map(|locator| (locator.symbol_id, locator.slot))
            .ok_or(MarketError::OrderNotFound)
    }

    /// Cross-structure consistency, checked at command boundaries in debug
    /// builds. A violation here is unrecoverable.
    fn check_integrity(&self) {
        #[cfg(debug_assertions)]
        {
            let book_total: usize = self.books.values().map(|book| book.order_count()).sum();
            debug_assert_eq!(self.orders.len(), book_total, "order index out of sync");
            for (id, locator) in &self.orders {
                let book = self
                    .books
                    .get(&locator.symbol_id)
                    .unwrap_or_else(|| unreachable!("indexed order without a book"));
                debug_assert_eq!(book.arena.get(locator.slot).order.id, *id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::NoOpMarketHandler;

    fn manager() -> MarketManager<NoOpMarketHandler> {
        MarketManager::new(NoOpMarketHandler)
    }

    #[test]
    fn test_symbol_lifecycle() {
        let mut market = manager();
        assert!(market.add_symbol(Symbol::new(1, "AAA")).is_ok());
        assert_eq!(
            market.add_symbol(Symbol::new(1, "AAA")),
            Err(MarketError::SymbolDuplicate)
        );
        assert_eq!(market.delete_symbol(2), Err(MarketError::SymbolNotFound));
        assert!(market.delete_symbol(1).is_ok());
    }

    #[test]
    fn test_delete_symbol_refused_while_book_exists() {
        let mut market = manager();
        market.add_symbol(Symbol::new(1, "AAA")).unwrap();
        market.add_order_book(1).unwrap();
        assert_eq!(market.delete_symbol(1), Err(MarketError::OrderBookExists));
        market.delete_order_book(1).unwrap();
        assert!(market.delete_symbol(1).is_ok());
    }

    #[test]
    fn test_order_book_lifecycle() {
        let mut market = manager();
        assert_eq!(market.add_order_book(1), Err(MarketError::SymbolNotFound));
        market.add_symbol(Symbol::new(1, "AAA")).unwrap();
        assert!(market.add_order_book(1).is_ok());
        assert_eq!(market.add_order_book(1), Err(MarketError::OrderBookDuplicate));
        assert_eq!(market.delete_order_book(2), Err(MarketError::OrderBookNotFound));
        assert!(market.delete_order_book(1).is_ok());
    }

    #[test]
    fn test_add_order_validation() {
        let mut market = manager();
        market.add_symbol(Symbol::new(1, "AAA")).unwrap();
        market.add_order_book(1).unwrap();

        assert_eq!(
            market.add_order(Order::limit(0, 1, Side::Buy, 100, 10)),
            Err(MarketError::OrderIdInvalid)
        );
        assert_eq!(
            market.add_order(Order::limit(1, 1, Side::Buy, 100, 0)),
            Err(MarketError::OrderQuantityInvalid)
        );
        assert_eq!(
            market.add_order(Order::limit(1, 1, Side::Buy, 0, 10)),
            Err(MarketError::OrderPriceInvalid)
        );
        assert_eq!(
            market.add_order(Order::limit(1, 9, Side::Buy, 100, 10)),
            Err(MarketError::SymbolNotFound)
        );

        assert!(market.add_order(Order::limit(1, 1, Side::Buy, 100, 10)).is_ok());
        assert_eq!(
            market.add_order(Order::limit(1, 1, Side::Buy, 101, 10)),
            Err(MarketError::OrderDuplicate)
        );
    }

    #[test]
    fn test_lifecycle_commands_on_unknown_order() {
        let mut market = manager();
        assert_eq!(market.reduce_order(5, 1), Err(MarketError::OrderNotFound));
        assert_eq!(market.modify_order(5, 100, 1), Err(MarketError::OrderNotFound));
        assert_eq!(
            market.replace_order(5, 6, 100, 1),
            Err(MarketError::OrderNotFound)
        );
        assert_eq!(market.delete_order(5), Err(MarketError::OrderNotFound));
    }

    #[test]
    fn test_modify_rejects_non_limit() {
        let mut market = manager();
        market.add_symbol(Symbol::new(1, "AAA")).unwrap();
        market.add_order_book(1).unwrap();
        // Resting sell stop far below the (empty) market would trigger, so
        // park liquidity first
        market.add_order(Order::limit(1, 1, Side::Buy, 90, 5)).unwrap();
        market
            .add_order(Order::stop(2, 1, Side::Sell, 50, 5))
            .unwrap();
        assert!(market.get_order(2).is_some());
        assert_eq!(market.modify_order(2, 60, 5), Err(MarketError::OrderTypeInvalid));
        assert!(market.reduce_order(2, 2).is_ok());
        assert_eq!(market.get_order(2).map(|o| o.remaining()), Some(3));
    }
}
