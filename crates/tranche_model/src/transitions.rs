//! State transition functions - all total, no panics
//!
//! Every transition takes the book by value and returns the new book, so a
//! caller either commits the result or keeps the old value untouched.

use crate::helpers::*;
use crate::math::*;
use crate::state::*;

/// Credit a deposit to one tranche
pub fn deposit(mut s: Book, side: Side, usd: u128) -> Book {
    let v = s.get_mut(side);
    *v = add_u128(*v, usd);
    s
}

/// Debit a withdrawal from one tranche (saturates at zero)
pub fn withdraw(mut s: Book, side: Side, usd: u128) -> Book {
    let v = s.get_mut(side);
    *v = sub_u128(*v, usd);
    s
}

/// Strategy gain: fee to Growth, net split by the distribution policy
pub fn handle_invest_gain(mut s: Book, gain: u128, p: &Params) -> Book {
    if gain == 0 {
        return s;
    }

    let fee = performance_fee(gain, p);
    let (to_gvt, to_pwrd) = split_profit(&s, gain - fee);

    s.gvt = add_u128(s.gvt, add_u128(to_gvt, fee));
    s.pwrd = add_u128(s.pwrd, to_pwrd);
    s
}

/// Price gain: entirely to Growth
pub fn handle_price_gain(mut s: Book, gain: u128) -> Book {
    s.gvt = add_u128(s.gvt, gain);
    s
}

/// Loss: Growth absorbs down to the floor, the remainder hits Protected.
///
/// Protected itself never drops below the floor; any loss beyond that is not
/// represented in the book and needs outside intervention.
pub fn handle_loss(mut s: Book, loss: u128, p: &Params) -> Book {
    if loss == 0 {
        return s;
    }

    let max_gvt_loss = sub_u128(s.gvt, p.min_unit);
    if loss > max_gvt_loss {
        let remainder = loss - max_gvt_loss;
        s.gvt = p.min_unit;
        s.pwrd = max_u128(sub_u128(s.pwrd, remainder), p.min_unit);
    } else {
        s.gvt -= loss;
    }
    s
}

/// Redistribute a withdrawal fee across both tranches
pub fn apply_bonus(mut s: Book, bonus: u128) -> Book {
    let (to_gvt, to_pwrd) = split_bonus(&s, bonus);
    s.gvt = add_u128(s.gvt, to_gvt);
    s.pwrd = add_u128(s.pwrd, to_pwrd);
    s
}

/// Reset the book against a live total (emergency path).
///
/// Protected is preserved whenever the total still covers it plus one floor
/// unit of Growth.
pub fn force_distribute(mut s: Book, total: u128, p: &Params) -> Book {
    if total > add_u128(s.pwrd, p.min_unit) {
        s.gvt = total - s.pwrd;
    } else {
        s.gvt = p.min_unit;
        s.pwrd = max_u128(sub_u128(total, p.min_unit), p.min_unit);
    }
    s
}

/// Raise any tranche that sits below the floor up to it
pub fn enforce_floor(mut s: Book, p: &Params) -> Book {
    s.gvt = max_u128(s.gvt, p.min_unit);
    s.pwrd = max_u128(s.pwrd, p.min_unit);
    s
}
