//! Pure tranche state model

/// One USD in the 18-decimal accounting unit
pub const ONE_USD: u128 = 1_000_000_000_000_000_000;

/// Which side of the split a value belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Growth tranche (GVT): first loss, uncapped upside
    Growth,
    /// Protected tranche (PWRD): principal shielded while Growth lasts
    Protected,
}

/// Tranche ledger values (18-decimal USD)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Book {
    pub gvt: u128,
    pub pwrd: u128,
    /// Whether Protected participates in profit (rebase switch)
    pub pwrd_rebase: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Params {
    /// Floor each tranche is held at after a loss
    pub min_unit: u128,
    /// Share of strategy gains paid to Growth as a fee (bps)
    pub performance_fee_bps: u128,
}

impl Book {
    pub fn new(gvt: u128, pwrd: u128) -> Self {
        Self {
            gvt,
            pwrd,
            pwrd_rebase: true,
        }
    }

    pub fn total(&self) -> u128 {
        self.gvt.saturating_add(self.pwrd)
    }

    pub fn get(&self, side: Side) -> u128 {
        match side {
            Side::Growth => self.gvt,
            Side::Protected => self.pwrd,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut u128 {
        match side {
            Side::Growth => &mut self.gvt,
            Side::Protected => &mut self.pwrd,
        }
    }
}

impl Default for Book {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            min_unit: ONE_USD,          // $1
            performance_fee_bps: 2_000, // 20%
        }
    }
}
