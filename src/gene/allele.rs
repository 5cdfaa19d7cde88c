//! Single-parameter representation
//!
//! An [`Allele`] is one scalar optimization parameter: a value, its box
//! bounds, and a mutability kind. Static alleles carry fixed problem data
//! through the search untouched; dynamic alleles are the ones the genetic
//! operators act on.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Mutability kind of an allele
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlleleKind {
    /// Never touched by randomize/crossover/mutate
    Static,
    /// Searched within `[min, max]`
    Dynamic,
}

/// One scalar optimization parameter with bounds and a mutability kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allele {
    /// Lower bound (inclusive)
    pub min: f64,
    /// Current value
    pub val: f64,
    /// Upper bound (inclusive)
    pub max: f64,
    /// Mutability kind
    pub kind: AlleleKind,
    /// Whether the parameter is continuous (real-valued) or discrete
    pub continuous: bool,
}

impl Allele {
    /// Create a new allele
    ///
    /// # Panics
    /// Panics if min > max
    pub fn new(min: f64, val: f64, max: f64, kind: AlleleKind, continuous: bool) -> Self {
        assert!(
            min <= max,
            "Invalid allele bounds: min ({}) must be <= max ({})",
            min,
            max
        );
        Self {
            min,
            val,
            max,
            kind,
            continuous,
        }
    }

    /// Create a static allele pinned to a value
    pub fn fixed(val: f64) -> Self {
        Self::new(val, val, val, AlleleKind::Static, true)
    }

    /// Create a dynamic continuous allele
    pub fn continuous(min: f64, val: f64, max: f64) -> Self {
        Self::new(min, val, max, AlleleKind::Dynamic, true)
    }

    /// Create a dynamic discrete allele
    pub fn discrete(min: f64, val: f64, max: f64) -> Self {
        Self::new(min, val, max, AlleleKind::Dynamic, false)
    }

    /// Check whether this allele is dynamic
    pub fn is_dynamic(&self) -> bool {
        self.kind == AlleleKind::Dynamic
    }

    /// Check the validity invariant: dynamic alleles must satisfy
    /// `min <= val <= max`; static alleles are valid by definition.
    pub fn is_valid(&self) -> bool {
        !self.is_dynamic() || (self.val >= self.min && self.val <= self.max)
    }

    /// Get the bound range (max - min)
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Clamp the value into `[min, max]`
    pub fn clamp(&mut self) {
        self.val = self.val.clamp(self.min, self.max);
    }

    /// Resample the value uniformly in `[min, max)` (dynamic alleles only)
    pub fn randomize<R: Rng>(&mut self, rng: &mut R) {
        if self.is_dynamic() {
            self.val = self.min + rng.gen::<f64>() * self.range();
        }
    }
}

/// Filter selecting which alleles an operation acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KindFilter {
    /// Every allele
    All,
    /// Static alleles only
    Static,
    /// Dynamic alleles only
    Dynamic,
    /// Dynamic alleles that are also continuous
    DynamicContinuous,
}

impl KindFilter {
    /// Check whether an allele matches this filter
    pub fn matches(&self, allele: &Allele) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Static => allele.kind == AlleleKind::Static,
            KindFilter::Dynamic => allele.is_dynamic(),
            KindFilter::DynamicContinuous => allele.is_dynamic() && allele.continuous,
        }
    }
}
