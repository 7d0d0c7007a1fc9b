// ============================================================================
// Stop Activation and Trailing Recomputation
// ============================================================================

use crate::domain::arena::OrderSlot;
use crate::domain::level::LevelSide;
use crate::domain::order::{Order, OrderType, Side, TimeInForce};
use crate::domain::order_book::OrderBook;
use crate::engine::market_manager::OrderIndex;
use crate::engine::matching::{match_aggressor, rest_or_cancel, uncross};
use crate::interfaces::MarketHandler;

/// Whether a stop order's trigger condition holds against the current
/// market references. Buy stops fire as the ask reference rises to the
/// trigger, sell stops as the bid reference falls to it.
pub(crate) fn stop_triggered(book: &OrderBook, order: &Order) -> bool {
    match order.side {
        Side::Buy => order.stop_price <= book.market_ask(),
        Side::Sell => order.stop_price >= book.market_bid(),
    }
}

/// Convert a triggered stop in place: a plain stop becomes an IOC market
/// order, a stop-limit becomes a limit order at its stored limit price with
/// its original time-in-force.
pub(crate) fn convert_triggered(order: &mut Order) {
    match order.order_type {
        OrderType::Stop | OrderType::TrailingStop => {
            order.order_type = OrderType::Market;
            order.price = 0;
            order.stop_price = 0;
            order.trail_distance = 0;
            order.time_in_force = TimeInForce::ImmediateOrCancel;
        },
        OrderType::StopLimit | OrderType::TrailingStopLimit => {
            order.order_type = OrderType::Limit;
            order.stop_price = 0;
            order.trail_distance = 0;
        },
        OrderType::Market | OrderType::Limit => {
            unreachable!("only stop orders are converted")
        },
    }
}

/// Absolute trailing offset in ticks. Negative distances are basis points
/// of the reference price, applied by integer multiply-and-divide rounding
/// toward zero.
pub(crate) fn trail_offset(trail_distance: i64, reference: u64) -> u64 {
    if trail_distance >= 0 {
        trail_distance as u64
    } else {
        ((trail_distance.unsigned_abs() as u128 * reference as u128) / 10_000) as u64
    }
}

/// The nearest triggered stop order, if any. Buy-side ladders are checked
/// before sell-side; within a side the plain and trailing ladders compete on
/// trigger price, FIFO within a level.
fn next_triggered_slot(book: &OrderBook) -> Option<OrderSlot> {
    let ask_reference = book.market_ask();
    let buy_candidate = nearest(
        book.best_stop_price(LevelSide::BuyStop).map(|p| (LevelSide::BuyStop, p)),
        book.best_stop_price(LevelSide::TrailingBuyStop)
            .map(|p| (LevelSide::TrailingBuyStop, p)),
        true,
    );
    if let Some((side, price)) = buy_candidate {
        if price <= ask_reference {
            return book.front_slot(side);
        }
    }

    let bid_reference = book.market_bid();
    let sell_candidate = nearest(
        book.best_stop_price(LevelSide::SellStop).map(|p| (LevelSide::SellStop, p)),
        book.best_stop_price(LevelSide::TrailingSellStop)
            .map(|p| (LevelSide::TrailingSellStop, p)),
        false,
    );
    if let Some((side, price)) = sell_candidate {
        if price >= bid_reference {
            return book.front_slot(side);
        }
    }
    None
}

fn nearest(
    a: Option<(LevelSide, u64)>,
    b: Option<(LevelSide, u64)>,
    lowest_first: bool,
) -> Option<(LevelSide, u64)> {
    match (a, b) {
        (Some(x), Some(y)) => {
            let pick_x = if lowest_first { x.1 <= y.1 } else { x.1 >= y.1 };
            Some(if pick_x { x } else { y })
        },
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    }
}

/// Pop and run the nearest triggered stop as an aggressor. Returns whether
/// an activation happened.
pub(crate) fn activate_next_stop<H: MarketHandler>(
    book: &mut OrderBook,
    index: &mut OrderIndex,
    handler: &mut H,
    sequence: &mut u64,
) -> bool {
    let Some(slot) = next_triggered_slot(book) else {
        return false;
    };
    let (mut order, update) = book.remove_order(slot);
    debug_assert!(update.is_none(), "stop ladders are silent");
    index.remove(&order.id);

    convert_triggered(&mut order);
    handler.on_update_order(&order);
    match_aggressor(book, index, handler, &mut order);
    if order.has_limit_price() {
        rest_or_cancel(book, index, handler, order, sequence);
    } else {
        handler.on_delete_order(&order);
    }
    true
}

/// Ratchet trailing stops toward the market after a reference-price move.
/// Sell stops only ever rise, buy stops only ever fall; each side is
/// re-evaluated once per reference change.
pub(crate) fn recalculate_trailing<H: MarketHandler>(book: &mut OrderBook, handler: &mut H) {
    if let Some(reference) = book.trailing_ref_bid() {
        if book.trailing_bid != Some(reference) {
            book.trailing_bid = Some(reference);
            for slot in book.trailing_slots(Side::Sell) {
                let order = book.arena.get(slot).order;
                let candidate =
                    reference.saturating_sub(trail_offset(order.trail_distance, reference));
                if candidate > order.stop_price {
                    let updated = book.rekey_trailing(slot, candidate);
                    handler.on_update_order(&updated);
                }
            }
        }
    }

    if let Some(reference) = book.trailing_ref_ask() {
        if book.trailing_ask != Some(reference) {
            book.trailing_ask = Some(reference);
            for slot in book.trailing_slots(Side::Buy) {
                let order = book.arena.get(slot).order;
                let candidate =
                    reference.saturating_add(trail_offset(order.trail_distance, reference));
                if candidate < order.stop_price {
                    let updated = book.rekey_trailing(slot, candidate);
                    handler.on_update_order(&updated);
                }
            }
        }
    }
}

/// Settle a book after a mutating command: resolve crossed liquidity,
/// ratchet trailing stops, and cascade stop activations until quiescent.
/// Everything that fires here belongs to the triggering command.
pub(crate) fn drain<H: MarketHandler>(
    book: &mut OrderBook,
    index: &mut OrderIndex,
    handler: &mut H,
    sequence: &mut u64,
) {
    loop {
        uncross(book, index, handler);
        recalculate_trailing(book, handler);
        if !activate_next_stop(book, index, handler, sequence) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trail_offset_absolute() {
        assert_eq!(trail_offset(3, 100), 3);
        assert_eq!(trail_offset(0, 100), 0);
    }

    #[test]
    fn test_trail_offset_basis_points() {
        // 50 bps of 10_000 = 50
        assert_eq!(trail_offset(-50, 10_000), 50);
        // Rounds toward zero: 25 bps of 999 = 2.4975
        assert_eq!(trail_offset(-25, 999), 2);
        assert_eq!(trail_offset(-10_000, 123), 123);
    }

    #[test]
    fn test_convert_stop_to_market_ioc() {
        let mut order = Order::stop(1, 1, Side::Sell, 99, 5);
        convert_triggered(&mut order);
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.time_in_force, TimeInForce::ImmediateOrCancel);
        assert_eq!(order.stop_price, 0);
    }

    #[test]
    fn test_convert_fok_stop_becomes_ioc_market() {
        let mut order =
            Order::stop(1, 1, Side::Sell, 99, 10).with_time_in_force(TimeInForce::FillOrKill);
        convert_triggered(&mut order);
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.time_in_force, TimeInForce::ImmediateOrCancel);
    }

    #[test]
    fn test_convert_stop_limit_keeps_tif_and_price() {
        let mut order = Order::stop_limit(1, 1, Side::Buy, 105, 106, 5);
        convert_triggered(&mut order);
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.price, 106);
        assert_eq!(order.time_in_force, TimeInForce::GoodTillCancel);
    }
}
