//! Bridge between the tranche records and the pure `tranche_model` types
//!
//! The PnL engine keeps one `Tranche` per share class; every value change is
//! computed by a `tranche_model` transition on a `Book` and written back.
//!
//! | Production field | Model field | Notes |
//! |------------------|-------------|-------|
//! | growth.last_assets | Book.gvt | direct |
//! | protected.last_assets | Book.pwrd | direct |
//! | protected.rebase_enabled | Book.pwrd_rebase | Growth always rebases |
//! | PnlParams.performance_fee_bps | Params.performance_fee_bps | u32 -> u128 |

use super::Tranche;
use crate::config::PnlParams;
use strata_common::MIN_UNIT;

/// Build a model book from the two tranche records
pub fn tranches_to_book(growth: &Tranche, protected: &Tranche) -> tranche_model::Book {
    tranche_model::Book {
        gvt: growth.last_assets,
        pwrd: protected.last_assets,
        pwrd_rebase: protected.rebase_enabled,
    }
}

/// Write a model book back into the tranche records
pub fn apply_book(book: &tranche_model::Book, growth: &mut Tranche, protected: &mut Tranche) {
    growth.last_assets = book.gvt;
    protected.last_assets = book.pwrd;
}

pub fn pnl_params_to_model(params: &PnlParams) -> tranche_model::Params {
    tranche_model::Params {
        min_unit: MIN_UNIT,
        performance_fee_bps: params.performance_fee_bps as u128,
    }
}
