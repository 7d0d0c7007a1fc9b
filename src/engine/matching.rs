// ============================================================================
// Matching Core
// Aggressor matching, matching chains, and the resting-vs-resting uncross
// ============================================================================

use crate::domain::arena::OrderSlot;
use crate::domain::level::{LevelSide, LevelUpdate, UpdateKind};
use crate::domain::order::{Order, Side};
use crate::domain::order_book::{OrderBook, RestingFill};
use crate::engine::market_manager::{OrderIndex, OrderLocator};
use crate::interfaces::MarketHandler;

/// Dispatch one level change to the observer, followed by the book update
/// carrying the same top-of-book flag.
pub(crate) fn publish_level<H: MarketHandler>(
    handler: &mut H,
    symbol_id: u32,
    update: &LevelUpdate,
) {
    match update.kind {
        UpdateKind::Add => handler.on_add_level(symbol_id, &update.level, update.top),
        UpdateKind::Update => handler.on_update_level(symbol_id, &update.level, update.top),
        UpdateKind::Delete => handler.on_delete_level(symbol_id, &update.level, update.top),
    }
    handler.on_update_order_book(symbol_id, update.top);
}

/// The price beyond which an aggressor will not trade. Market orders are
/// capped relative to the first-match price by their slippage allowance;
/// `None` means there is no opposite liquidity at all.
fn effective_price_cap(book: &OrderBook, order: &Order) -> Option<u64> {
    if order.is_market() {
        let (first, _) = book.best_opposite(order.side)?;
        Some(match order.side {
            Side::Buy => first.saturating_add(order.slippage),
            Side::Sell => first.saturating_sub(order.slippage),
        })
    } else {
        Some(order.price)
    }
}

/// Match an incoming order against the opposite side of the book, consuming
/// liquidity in price-time order at resting prices.
///
/// Fill-Or-Kill and All-Or-None aggressors run the matching chain first and
/// trade only on exact coverage. A resting All-Or-None block larger than the
/// aggressor's remaining quantity stops the loop.
pub(crate) fn match_aggressor<H: MarketHandler>(
    book: &mut OrderBook,
    index: &mut OrderIndex,
    handler: &mut H,
    order: &mut Order,
) {
    let Some(cap) = effective_price_cap(book, order) else {
        return;
    };
    if (order.all_or_none || order.is_fok())
        && !book.matching_chain(order.side, cap, order.remaining())
    {
        return;
    }

    while order.remaining() > 0 {
        let Some((level_price, head_slot)) = book.best_opposite(order.side) else {
            break;
        };
        let acceptable = match order.side {
            Side::Buy => level_price <= cap,
            Side::Sell => level_price >= cap,
        };
        if !acceptable {
            break;
        }

        let resting = book.arena.get(head_slot).order;
        let quantity = if resting.all_or_none {
            if order.remaining() < resting.remaining() {
                break;
            }
            resting.remaining()
        } else {
            order.remaining().min(resting.leaves_quantity)
        };

        handler.on_execute_order(order, level_price, quantity);
        handler.on_execute_order(&resting, level_price, quantity);
        book.record_trade(order.side, level_price);
        book.record_trade(resting.side, level_price);

        order.fill(quantity);
        settle_resting_fill(book, index, handler, head_slot, quantity);
    }
}

/// Apply one fill to a resting order and dispatch whatever the book reports
/// back: a level update, an iceberg replenishment, or removal.
pub(crate) fn settle_resting_fill<H: MarketHandler>(
    book: &mut OrderBook,
    index: &mut OrderIndex,
    handler: &mut H,
    slot: OrderSlot,
    quantity: u64,
) {
    let symbol_id = book.symbol_id();
    match book.fill_resting(slot, quantity) {
        RestingFill::Partial { update } => publish_level(handler, symbol_id, &update),
        RestingFill::Replenished { order, update } => {
            handler.on_update_order(&order);
            publish_level(handler, symbol_id, &update);
        },
        RestingFill::Completed { order, update } => {
            index.remove(&order.id);
            handler.on_delete_order(&order);
            publish_level(handler, symbol_id, &update);
        },
    }
}

/// Rest the unfilled remainder of a limit order at the tail of its level, or
/// announce its cancellation for IOC/FOK and fully filled orders.
pub(crate) fn rest_or_cancel<H: MarketHandler>(
    book: &mut OrderBook,
    index: &mut OrderIndex,
    handler: &mut H,
    order: Order,
    sequence: &mut u64,
) {
    if order.remaining() > 0 && order.has_limit_price() && !order.is_ioc() && !order.is_fok() {
        *sequence += 1;
        let (slot, update) = book.insert_resting(order, *sequence);
        index.insert(
            order.id,
            OrderLocator {
                symbol_id: order.symbol_id,
                slot,
            },
        );
        publish_level(handler, book.symbol_id(), &update);
    } else {
        handler.on_delete_order(&order);
    }
}

/// Trade crossed resting liquidity away: while the best bid meets the best
/// ask, the later-arrived head is treated as the aggressor and trades at the
/// earlier order's price. An All-Or-None head routes through the block path;
/// an infeasible block stops the uncross.
pub(crate) fn uncross<H: MarketHandler>(
    book: &mut OrderBook,
    index: &mut OrderIndex,
    handler: &mut H,
) -> bool {
    let mut traded = false;
    loop {
        let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) else {
            break;
        };
        if bid < ask {
            break;
        }

        let (Some(bid_slot), Some(ask_slot)) = (
            book.front_slot(LevelSide::Bid),
            book.front_slot(LevelSide::Ask),
        ) else {
            break;
        };
        let bid_node = book.arena.get(bid_slot);
        let ask_node = book.arena.get(ask_slot);
        let (aggressor_slot, aggressor, resting_slot, resting) =
            if bid_node.sequence > ask_node.sequence {
                (bid_slot, bid_node.order, ask_slot, ask_node.order)
            } else {
                (ask_slot, ask_node.order, bid_slot, bid_node.order)
            };
        let price = resting.price;

        if aggressor.all_or_none || resting.all_or_none {
            let mut cleared = false;
            if resting.all_or_none {
                cleared = execute_aon_block(book, index, handler, resting_slot);
            }
            if !cleared && aggressor.all_or_none {
                cleared = execute_aon_block(book, index, handler, aggressor_slot);
            }
            if !cleared {
                break;
            }
            traded = true;
            continue;
        }

        let quantity = aggressor.leaves_quantity.min(resting.leaves_quantity);
        handler.on_execute_order(&aggressor, price, quantity);
        handler.on_execute_order(&resting, price, quantity);
        book.record_trade(aggressor.side, price);
        book.record_trade(resting.side, price);

        settle_resting_fill(book, index, handler, aggressor_slot, quantity);
        settle_resting_fill(book, index, handler, resting_slot, quantity);
        traded = true;
    }
    traded
}

/// Execute a resting All-Or-None order in one batch against as many opposite
/// counterparties as its quantity needs. Runs only when the matching chain
/// confirms exact coverage; each pair prices at the earlier arrival and
/// emits the later arrival's leg first.
fn execute_aon_block<H: MarketHandler>(
    book: &mut OrderBook,
    index: &mut OrderIndex,
    handler: &mut H,
    aon_slot: OrderSlot,
) -> bool {
    let aon_node = book.arena.get(aon_slot);
    let aon = aon_node.order;
    let aon_sequence = aon_node.sequence;
    debug_assert!(aon.all_or_none);
    if !book.matching_chain(aon.side, aon.price, aon.remaining()) {
        return false;
    }

    let mut need = aon.remaining();
    while need > 0 {
        let Some((_, head_slot)) = book.best_opposite(aon.side) else {
            break;
        };
        let counter_node = book.arena.get(head_slot);
        let counter = counter_node.order;
        let counter_sequence = counter_node.sequence;
        let quantity = if counter.all_or_none {
            counter.remaining().min(need)
        } else {
            counter.leaves_quantity.min(need)
        };
        let price = if counter_sequence < aon_sequence {
            counter.price
        } else {
            aon.price
        };

        let aon_current = book.arena.get(aon_slot).order;
        if aon_sequence > counter_sequence {
            handler.on_execute_order(&aon_current, price, quantity);
            handler.on_execute_order(&counter, price, quantity);
        } else {
            handler.on_execute_order(&counter, price, quantity);
            handler.on_execute_order(&aon_current, price, quantity);
        }
        book.record_trade(aon.side, price);
        book.record_trade(counter.side, price);

        settle_resting_fill(book, index, handler, head_slot, quantity);
        settle_resting_fill(book, index, handler, aon_slot, quantity);
        need -= quantity;
    }
    debug_assert_eq!(need, 0, "matching chain guaranteed exact coverage");
    true
}
