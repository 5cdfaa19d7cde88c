//! Parameter representation
//!
//! Alleles (single bounded parameters) and genes (ordered allele
//! collections describing one candidate solution).

pub mod allele;
#[allow(clippy::module_inception)]
pub mod gene;

pub use allele::{Allele, AlleleKind, KindFilter};
pub use gene::Gene;
