//! # genefit
//!
//! A genetic-algorithm parameter fitter hybridized with Nelder-Mead
//! simplex refinement, for mixed continuous/discrete search spaces.
//!
//! A candidate solution is a [`Gene`](gene::Gene): an ordered vector of
//! bounded [`Allele`](gene::Allele)s, each either static (pinned) or
//! dynamic (searched), continuous or discrete. A population of
//! [`Individual`](individual::Individual)s evolves under elitist
//! replacement with tournament or fitness-proportional selection,
//! weighted-arithmetic crossover, and uniform-resample mutation. At each
//! ranking pass the top fraction of the population can be polished by a
//! derivative-free simplex minimizer (Lamarckian: improvements are written
//! back into the DNA), and an occupancy histogram can scale merits to keep
//! the population spread out.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use genefit::prelude::*;
//!
//! // fit x in [-10, 10] to the peak of -(x - 3)^2
//! let mut gene = Gene::from_alleles(vec![Allele::continuous(-10.0, 0.0, 10.0)]);
//! let eval: Arc<dyn Merit> = Arc::new(FnMerit::new(|g: &Gene| -(g[0].val - 3.0).powi(2)));
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let args = GeneticAlgArgs {
//!     population: 30,
//!     maxgeneration: 60,
//!     local_fit_max_individuals_prctage: 0.1,
//!     ..GeneticAlgArgs::default()
//! };
//! let mut ga = GeneticAlg::new(args);
//! let merit = ga.fit(&mut gene, eval, &mut rng).unwrap();
//!
//! assert!(merit > -1e-2);
//! assert!((gene[0].val - 3.0).abs() < 1e-1);
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): evaluate population merits across the rayon
//!   thread pool. Disable for single-threaded builds.

pub mod chromosome;
pub mod driver;
pub mod error;
pub mod gene;
pub mod generation;
pub mod histogram;
pub mod individual;
pub mod pool;
pub mod simplex;

pub use chromosome::Chromosome;
pub use driver::{CancelToken, GeneticAlg, GeneticAlgArgs};
pub use error::{FitError, FitResult};
pub use gene::{Allele, AlleleKind, Gene, KindFilter};
pub use individual::{FnMerit, Individual, Merit};

/// Convenience re-exports for typical use
pub mod prelude {
    pub use crate::chromosome::Chromosome;
    pub use crate::driver::{
        CancelToken, GeneticAlg, GeneticAlgArgs, LogSink, NullSink, ProgressReport, ProgressSink,
    };
    pub use crate::error::{FitError, FitResult};
    pub use crate::gene::{Allele, AlleleKind, Gene, KindFilter};
    pub use crate::generation::Generation;
    pub use crate::histogram::Histogram;
    pub use crate::individual::{FnMerit, Individual, Merit};
    pub use crate::simplex::{SimplexOptimizer, SimplexResult};
}
