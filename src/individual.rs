//! Individual wrapper type
//!
//! An [`Individual`] owns one [`Chromosome`] ("DNA"), a cached merit value
//! with a dirty flag, and a shared merit-evaluation capability. The cache
//! is invalidated whenever the DNA changes and refilled lazily on the next
//! [`Individual::merit`] call.

use std::sync::Arc;

use crate::chromosome::Chromosome;
use crate::error::GeneError;
use crate::gene::{Gene, KindFilter};

/// Merit-evaluation capability: maps a gene to a fitness value,
/// higher is better. Whatever external context the evaluation needs is
/// captured by the implementor.
pub trait Merit: Send + Sync {
    /// Evaluate the merit of a gene
    fn evaluate(&self, gene: &Gene) -> f64;
}

/// A simple closure wrapper for merit evaluation
pub struct FnMerit<F>
where
    F: Fn(&Gene) -> f64,
{
    f: F,
}

impl<F> FnMerit<F>
where
    F: Fn(&Gene) -> f64,
{
    /// Create a new closure-based merit evaluator
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Merit for FnMerit<F>
where
    F: Fn(&Gene) -> f64 + Send + Sync,
{
    fn evaluate(&self, gene: &Gene) -> f64 {
        (self.f)(gene)
    }
}

/// Pluggable Individual constructor used when a generation is built or
/// copied. The default factory is [`Individual::new`].
pub type Factory = Arc<dyn Fn(Chromosome, Arc<dyn Merit>) -> Individual + Send + Sync>;

/// A chromosome plus cached fitness
pub struct Individual {
    dna: Chromosome,
    merit: f64,
    dirty: bool,
    eval: Arc<dyn Merit>,
}

impl Individual {
    /// Create a new individual with an unevaluated DNA
    pub fn new(dna: Chromosome, eval: Arc<dyn Merit>) -> Self {
        Self {
            dna,
            merit: f64::NEG_INFINITY,
            dirty: true,
            eval,
        }
    }

    /// Get the DNA
    pub fn dna(&self) -> &Chromosome {
        &self.dna
    }

    /// Get the DNA mutably, invalidating the merit cache
    pub fn dna_mut(&mut self) -> &mut Chromosome {
        self.dirty = true;
        &mut self.dna
    }

    /// Check whether the cached merit is stale
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Get the merit, evaluating the capability on the current DNA if the
    /// cache is stale
    pub fn merit(&mut self) -> f64 {
        if self.dirty {
            self.merit = self.eval.evaluate(self.dna.gene());
            self.dirty = false;
        }
        self.merit
    }

    /// Get the cached merit without triggering evaluation
    pub fn cached_merit(&self) -> f64 {
        self.merit
    }

    /// Overwrite the cached merit and mark it fresh. Used by the simplex
    /// commit, where the refined merit was already evaluated. The stored
    /// value must always be a raw evaluation of the current DNA.
    pub fn set_merit(&mut self, merit: f64) {
        self.merit = merit;
        self.dirty = false;
    }

    /// Replace the DNA content by value, invalidating the cache
    pub fn regene_from(&mut self, gene: &Gene) {
        *self.dna.gene_mut() = gene.clone();
        self.dirty = true;
    }

    /// Bulk-assign matching alleles (clamped), invalidating the cache
    pub fn regene(&mut self, values: &[f64], filter: KindFilter) -> Result<(), GeneError> {
        self.dna.gene_mut().regene(values, filter)?;
        self.dirty = true;
        Ok(())
    }

    /// Evaluate the merit capability against a hypothetical allele
    /// substitution without mutating the stored DNA or the cache.
    /// Used by the local simplex optimizer.
    pub fn test_merit(&self, values: &[f64], filter: KindFilter) -> Result<f64, GeneError> {
        let mut trial = self.dna.gene().clone();
        trial.regene(values, filter)?;
        Ok(self.eval.evaluate(&trial))
    }

    /// Resample every dynamic allele, invalidating the cache
    pub fn randomize<R: rand::Rng>(&mut self, rng: &mut R) {
        self.dna.gene_mut().randomize(rng);
        self.dirty = true;
    }

    /// Mutate the DNA with the given per-locus probability; the cache is
    /// invalidated only if some locus actually changed
    pub fn mutate<R: rand::Rng>(&mut self, mut_prob: f64, rng: &mut R) -> usize {
        let count = self.dna.mutate(mut_prob, rng);
        if count > 0 {
            self.dirty = true;
        }
        count
    }

    /// Clone this individual's DNA into a fresh individual sharing the same
    /// merit capability
    pub fn clone_dna(&self) -> Self {
        Self {
            dna: self.dna.clone(),
            merit: self.merit,
            dirty: self.dirty,
            eval: Arc::clone(&self.eval),
        }
    }

    /// The shared merit capability
    pub fn capability(&self) -> Arc<dyn Merit> {
        Arc::clone(&self.eval)
    }
}

impl std::fmt::Debug for Individual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Individual")
            .field("dna", &self.dna)
            .field("merit", &self.merit)
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::Allele;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sum_merit() -> Arc<dyn Merit> {
        Arc::new(FnMerit::new(|g: &Gene| {
            g.values(KindFilter::All).iter().sum::<f64>()
        }))
    }

    fn test_dna(vals: &[f64]) -> Chromosome {
        Chromosome::new(
            vals.iter()
                .map(|&v| Allele::continuous(-100.0, v, 100.0))
                .collect(),
        )
    }

    #[test]
    fn test_merit_is_cached() {
        struct Counting(AtomicUsize);
        impl Merit for Counting {
            fn evaluate(&self, _gene: &Gene) -> f64 {
                self.0.fetch_add(1, Ordering::SeqCst);
                42.0
            }
        }

        let eval = Arc::new(Counting(AtomicUsize::new(0)));
        let mut ind = Individual::new(test_dna(&[1.0]), eval.clone());

        assert!(ind.is_dirty());
        assert_eq!(ind.merit(), 42.0);
        assert_eq!(ind.merit(), 42.0);
        assert_eq!(eval.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_regene_invalidates_cache() {
        let mut ind = Individual::new(test_dna(&[1.0, 2.0]), sum_merit());
        assert_eq!(ind.merit(), 3.0);
        assert!(!ind.is_dirty());

        ind.regene(&[5.0, 5.0], KindFilter::Dynamic).unwrap();
        assert!(ind.is_dirty());
        assert_eq!(ind.merit(), 10.0);
    }

    #[test]
    fn test_regene_from_copies_by_value() {
        let mut ind = Individual::new(test_dna(&[1.0]), sum_merit());
        let mut donor = test_dna(&[7.0]).into_gene();
        ind.regene_from(&donor);

        donor[0].val = -1.0; // donor changes must not leak into the individual
        assert_eq!(ind.merit(), 7.0);
    }

    #[test]
    fn test_test_merit_leaves_state_untouched() {
        let mut ind = Individual::new(test_dna(&[1.0, 2.0]), sum_merit());
        assert_eq!(ind.merit(), 3.0);

        let hypothetical = ind.test_merit(&[10.0, 10.0], KindFilter::Dynamic).unwrap();
        assert_eq!(hypothetical, 20.0);

        assert!(!ind.is_dirty());
        assert_eq!(ind.cached_merit(), 3.0);
        assert_eq!(ind.dna().values(KindFilter::Dynamic), vec![1.0, 2.0]);
    }

    #[test]
    fn test_mutate_sets_dirty_only_on_change() {
        let mut rng = rand::rngs::mock::StepRng::new(0, 0);
        let mut ind = Individual::new(test_dna(&[1.0]), sum_merit());
        let _ = ind.merit();

        // probability zero: no locus changes, cache stays fresh
        let count = ind.mutate(0.0, &mut rng);
        assert_eq!(count, 0);
        assert!(!ind.is_dirty());
    }

    #[test]
    fn test_clone_dna_shares_capability() {
        let mut ind = Individual::new(test_dna(&[2.0, 3.0]), sum_merit());
        let _ = ind.merit();

        let mut copy = ind.clone_dna();
        assert_eq!(copy.merit(), 5.0);
        assert_eq!(
            copy.dna().values(KindFilter::All),
            ind.dna().values(KindFilter::All)
        );
    }
}
