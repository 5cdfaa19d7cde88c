//! Top-level genetic-algorithm driver
//!
//! [`GeneticAlg`] owns the run configuration, a cooperative [`CancelToken`],
//! and a [`ProgressSink`] for per-generation reporting. One call to
//! [`GeneticAlg::fit`] evolves a population until the damped convergence
//! criterion, the merit ceiling, the generation cap, or cancellation stops
//! it, then writes the best gene found back into the caller's gene.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{FitError, FitResult};
use crate::gene::{Gene, KindFilter};
use crate::generation::Generation;
use crate::individual::Merit;

/// EMA retention of the damped convergence signal:
/// `lmerit = RETAIN * lmerit + (1 - RETAIN) * merit`
const EMA_RETAIN: f64 = 0.75;

/// Run configuration for [`GeneticAlg`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticAlgArgs {
    /// Population size, constant for the whole run
    pub population: usize,
    /// Convergence tolerance on `|merit - lmerit|`
    pub tolerance: f64,
    /// Merit ceiling: the run stops as soon as the damped merit reaches it
    pub max_merit: f64,
    /// Fraction of the population replaced by children each generation
    pub replace: f64,
    /// Fraction of the population refined by the simplex optimizer at each
    /// ranking pass (zero disables hybridization)
    pub local_fit_max_individuals_prctage: f64,
    /// Simplex fractional convergence tolerance
    pub local_fit_tolerance: f64,
    /// Simplex iteration cap
    pub local_fit_max_iteration: usize,
    /// Simplex initial-vertex perturbation, as a fraction of each box width
    pub local_fit_initial_step: f64,
    /// Per-event crossover probability
    pub crossprob: f64,
    /// Per-locus mutation probability
    pub mutprob: f64,
    /// Generation cap
    pub maxgeneration: usize,
    /// Scale merits by the occupancy-histogram diversity factor
    pub encourage_diversity: bool,
    /// Bins per continuous dimension of the diversity histogram
    pub diversity_grid_cols: usize,
    /// Fraction of the initial population seeded with the caller's gene
    /// values instead of random ones (resume or bias a search)
    pub seed_fraction: f64,
    /// Select parents fitness-proportionally instead of by 2-way tournament
    pub use_proportional: bool,
}

impl Default for GeneticAlgArgs {
    fn default() -> Self {
        Self {
            population: 100,
            tolerance: 1e-6,
            max_merit: f64::INFINITY,
            replace: 0.5,
            local_fit_max_individuals_prctage: 0.0,
            local_fit_tolerance: 1e-6,
            local_fit_max_iteration: 100,
            local_fit_initial_step: 0.05,
            crossprob: 0.9,
            mutprob: 0.05,
            maxgeneration: 200,
            encourage_diversity: false,
            diversity_grid_cols: 16,
            seed_fraction: 0.0,
            use_proportional: false,
        }
    }
}

impl GeneticAlgArgs {
    /// Reject configurations no run can execute
    pub fn validate(&self) -> FitResult<()> {
        if self.population == 0 {
            return Err(FitError::Configuration(
                "population must be at least 1".to_string(),
            ));
        }
        for (name, p) in [
            ("replace", self.replace),
            ("crossprob", self.crossprob),
            ("mutprob", self.mutprob),
            (
                "local_fit_max_individuals_prctage",
                self.local_fit_max_individuals_prctage,
            ),
            ("seed_fraction", self.seed_fraction),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(FitError::Configuration(format!(
                    "{name} must lie in [0, 1], got {p}"
                )));
            }
        }
        if self.tolerance < 0.0 {
            return Err(FitError::Configuration(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        if self.diversity_grid_cols == 0 && self.encourage_diversity {
            return Err(FitError::Configuration(
                "diversity_grid_cols must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared cooperative cancellation flag. Clone it, hand the clone to a
/// signal handler or another thread, and the running fit stops at its next
/// safe point with the population intact.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// One generation's worth of progress data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    /// Generations completed so far
    pub generation: usize,
    /// Mean merit of the top-ranked individuals
    pub merit: f64,
    /// Damped (EMA) merit used for convergence
    pub lmerit: f64,
    /// Merit of the single best individual
    pub best_merit: f64,
}

/// Per-generation progress consumer
pub trait ProgressSink {
    /// Called after each completed generation
    fn on_generation(&mut self, _report: &ProgressReport) {}

    /// Called once when the run stops, whatever the reason
    fn on_finished(&mut self, _report: &ProgressReport) {}
}

/// Sink that discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {}

/// Sink that routes reports through the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn on_generation(&mut self, report: &ProgressReport) {
        log::info!(
            "generation {}: merit {:.6e} (ema {:.6e}, best {:.6e})",
            report.generation,
            report.merit,
            report.lmerit,
            report.best_merit
        );
    }

    fn on_finished(&mut self, report: &ProgressReport) {
        log::info!(
            "fit finished after {} generations: best merit {:.6e}",
            report.generation,
            report.best_merit
        );
    }
}

/// The evolutionary optimization driver
pub struct GeneticAlg {
    args: GeneticAlgArgs,
    cancel: CancelToken,
    sink: Box<dyn ProgressSink>,
}

impl GeneticAlg {
    /// Create a driver reporting through the `log` facade
    pub fn new(args: GeneticAlgArgs) -> Self {
        Self {
            args,
            cancel: CancelToken::new(),
            sink: Box::new(LogSink),
        }
    }

    /// Replace the progress sink
    pub fn with_sink(mut self, sink: Box<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The run configuration
    pub fn args(&self) -> &GeneticAlgArgs {
        &self.args
    }

    /// A clone of the cancel token, for signal handlers or other threads
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Evolve a population built from `gene` until convergence, the merit
    /// ceiling, the generation cap, or cancellation.
    ///
    /// On return `gene` holds the best DNA found and the best individual's
    /// merit is the return value. Convergence compares the mean top merit
    /// against its own exponential moving average: a plateau of the leading
    /// individuals is what stops the run, not a single lucky sample.
    /// Cancellation is not an error, and mid-run failures in breeding or
    /// ranking stop the loop instead of propagating: the best-so-far
    /// result is still written back and returned either way. Only pre-run
    /// failures (invalid configuration, a gene with nothing to search)
    /// surface as `Err`, since no result exists yet.
    pub fn fit<R: Rng>(
        &mut self,
        gene: &mut Gene,
        eval: Arc<dyn Merit>,
        rng: &mut R,
    ) -> FitResult<f64> {
        self.args.validate()?;
        if gene.num_alleles(KindFilter::Dynamic) == 0 {
            return Err(FitError::EmptyDynamicDna);
        }

        let mut generation = Generation::new(gene, eval, self.args.clone())?;
        generation.randomize(rng);
        if self.args.seed_fraction > 0.0 {
            generation.seed(gene, self.args.seed_fraction);
        }
        generation.sort()?;

        let mut merit = generation.mean_top_merit();
        let mut lmerit = merit;
        let mut completed = 0;

        while completed < self.args.maxgeneration && merit < self.args.max_merit {
            if self.cancel.is_cancelled() {
                break;
            }
            let bred = if self.args.use_proportional {
                generation.proportional(rng, &self.cancel)
            } else {
                generation.tournament(rng, &self.cancel)
            };
            match bred {
                Ok(()) => {}
                Err(FitError::Cancelled) => break,
                Err(e) => {
                    log::error!("replacement failed at generation {}: {e}", completed + 1);
                    break;
                }
            }
            if let Err(e) = generation.sort() {
                log::error!("ranking failed at generation {}: {e}", completed + 1);
                break;
            }
            completed += 1;

            merit = generation.mean_top_merit();
            lmerit = EMA_RETAIN * lmerit + (1.0 - EMA_RETAIN) * merit;
            self.sink.on_generation(&ProgressReport {
                generation: completed,
                merit,
                lmerit,
                best_merit: generation.members()[0].cached_merit(),
            });
            if (merit - lmerit).abs() < self.args.tolerance {
                break;
            }
        }

        gene.clone_from(generation.best_gene());
        let best = generation.members()[0].cached_merit();
        self.sink.on_finished(&ProgressReport {
            generation: completed,
            merit,
            lmerit,
            best_merit: best,
        });
        Ok(best)
    }
}

impl std::fmt::Debug for GeneticAlg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneticAlg")
            .field("args", &self.args)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
