//! Genetic operators over a gene
//!
//! A [`Chromosome`] is a [`Gene`] augmented with crossover and mutation
//! behavior. It carries no state of its own; it is a capability wrapper.
//!
//! Crossover is a weighted-arithmetic recombination with tail swap: at a
//! random dynamic locus `g` with weight `w`, child one receives
//! `w*a[g] + (1-w)*b[g]` and child two the mirror, and every dynamic locus
//! after `g` is exchanged between the pair. Invalid offspring are repaired
//! by retrying with a fresh locus; after ten failed attempts the event is
//! skipped and the pair left unchanged for that event.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GeneError, OperatorError};
use crate::gene::{Gene, KindFilter};

/// Maximum validity-repair attempts per crossover event
const CROSSOVER_RETRIES: usize = 10;

/// A gene plus genetic-operator behavior
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chromosome {
    gene: Gene,
}

impl Chromosome {
    /// Wrap a gene into a chromosome
    pub fn new(gene: Gene) -> Self {
        Self { gene }
    }

    /// Get the wrapped gene
    pub fn gene(&self) -> &Gene {
        &self.gene
    }

    /// Get the wrapped gene mutably
    pub fn gene_mut(&mut self) -> &mut Gene {
        &mut self.gene
    }

    /// Take the gene out of the chromosome
    pub fn into_gene(self) -> Gene {
        self.gene
    }

    /// Recombine a pair of chromosomes in place.
    ///
    /// Draws a stochastically-rounded number of crossover events scaled by
    /// `num_alleles(Dynamic) * uniform()`; each event fires with probability
    /// `cross_prob`. Returns whether any event actually recombined the pair.
    pub fn crossover<R: Rng>(
        a: &mut Chromosome,
        b: &mut Chromosome,
        cross_prob: f64,
        rng: &mut R,
    ) -> Result<bool, OperatorError> {
        let n = a.gene.num_alleles(KindFilter::Dynamic);
        let nb = b.gene.num_alleles(KindFilter::Dynamic);
        if n != nb {
            return Err(OperatorError::AlleleCountMismatch { left: n, right: nb });
        }
        if n == 0 {
            return Ok(false);
        }

        // absolute positions of the dynamic loci, identical for both parents
        let loci: Vec<usize> = (0..n)
            .map(|i| a.gene.real_index(i, KindFilter::Dynamic))
            .collect::<Result<_, GeneError>>()?;

        let raw = n as f64 * rng.gen::<f64>();
        let mut events = raw.floor() as usize;
        if rng.gen::<f64>() < raw.fract() {
            events += 1;
        }

        let mut crossed = false;
        for _ in 0..events {
            if rng.gen::<f64>() >= cross_prob {
                continue;
            }
            for _attempt in 0..CROSSOVER_RETRIES {
                let g = (rng.gen::<f64>() * n as f64) as usize;
                let g = g.min(n - 1);
                let w = rng.gen::<f64>();

                let mut ga = a.gene.clone();
                let mut gb = b.gene.clone();
                let va = a.gene[loci[g]].val;
                let vb = b.gene[loci[g]].val;
                ga[loci[g]].val = w * va + (1.0 - w) * vb;
                gb[loci[g]].val = (1.0 - w) * va + w * vb;
                for &idx in &loci[g + 1..] {
                    ga[idx].val = b.gene[idx].val;
                    gb[idx].val = a.gene[idx].val;
                }

                if ga.is_valid() && gb.is_valid() {
                    a.gene = ga;
                    b.gene = gb;
                    crossed = true;
                    break;
                }
                // invalid pair: retry with a fresh locus, or skip the event
            }
        }
        Ok(crossed)
    }

    /// Mutate each dynamic allele independently with probability `mut_prob`,
    /// resampling its value uniformly in `[min, max]`. Returns the number of
    /// loci that were resampled. Real-valued resampling stays valid by
    /// construction, so no repair loop is needed.
    pub fn mutate<R: Rng>(&mut self, mut_prob: f64, rng: &mut R) -> usize {
        let mut count = 0;
        for i in 0..self.gene.len() {
            if self.gene[i].is_dynamic() && rng.gen::<f64>() < mut_prob {
                self.gene[i].randomize(rng);
                count += 1;
            }
        }
        count
    }
}

impl From<Gene> for Chromosome {
    fn from(gene: Gene) -> Self {
        Self::new(gene)
    }
}

impl std::ops::Deref for Chromosome {
    type Target = Gene;

    fn deref(&self) -> &Self::Target {
        &self.gene
    }
}

impl std::ops::DerefMut for Chromosome {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.gene
    }
}
