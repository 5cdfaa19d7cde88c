//! Per-dimension diversity histogram
//!
//! A transient occupancy scorer built fresh from a population snapshot at
//! the start of each ranking pass. For every dynamic allele dimension it
//! keeps an independent array of bin counters (memory is O(dims x bins),
//! never a joint cross-dimension table). Crowded regions of parameter
//! space are then penalized through [`Histogram::merit_factor`], which
//! multiplies (never replaces) an individual's raw merit.

use crate::error::{FitError, FitResult};
use crate::gene::{Gene, KindFilter};

/// One dynamic allele dimension: its absolute locus and bin counters
#[derive(Debug, Clone)]
struct Dimension {
    /// Absolute allele index in the gene
    locus: usize,
    min: f64,
    max: f64,
    bins: Vec<u32>,
}

impl Dimension {
    /// Bin index for a value, clamped into `[0, bins-1]`. A raw index out
    /// of that range would corrupt the diversity signal, so it is asserted
    /// in debug builds and clamped rather than wrapped.
    fn bin_index(&self, val: f64) -> usize {
        let span = self.max - self.min;
        let raw = if span > 0.0 {
            ((val - self.min) / span * self.bins.len() as f64).floor() as isize
        } else {
            0
        };
        debug_assert!(
            raw >= 0 && (raw as usize) <= self.bins.len(),
            "histogram bin index {} out of range for {} bins",
            raw,
            self.bins.len()
        );
        raw.clamp(0, self.bins.len() as isize - 1) as usize
    }
}

/// Per-dimension occupancy histogram over a population snapshot
#[derive(Debug, Clone)]
pub struct Histogram {
    dims: Vec<Dimension>,
    mfact: f64,
}

impl Histogram {
    /// Build an empty histogram from a gene template.
    ///
    /// Continuous dimensions get `cont_grid_cols` bins; discrete dimensions
    /// get `ceil(max - min)` bins (at least one). `population_size` sets
    /// the penalty base `mfact = 1 - 1/sqrt(population_size)`.
    /// Fails with [`FitError::EmptyDynamicDna`] when the template has no
    /// dynamic allele.
    pub fn new(template: &Gene, cont_grid_cols: usize, population_size: usize) -> FitResult<Self> {
        if template.num_alleles(KindFilter::Dynamic) == 0 {
            return Err(FitError::EmptyDynamicDna);
        }
        if population_size == 0 {
            return Err(FitError::EmptyPopulation);
        }

        let dims = template
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_dynamic())
            .map(|(locus, a)| {
                let cols = if a.continuous {
                    cont_grid_cols.max(1)
                } else {
                    (a.range().ceil() as usize).max(1)
                };
                Dimension {
                    locus,
                    min: a.min,
                    max: a.max,
                    bins: vec![0; cols],
                }
            })
            .collect();

        let mfact = 1.0 - 1.0 / (population_size as f64).sqrt();
        Ok(Self { dims, mfact })
    }

    /// Number of dynamic dimensions tracked
    pub fn num_dims(&self) -> usize {
        self.dims.len()
    }

    /// Penalty base, in `(0, 1)` for any population of two or more
    pub fn mfact(&self) -> f64 {
        self.mfact
    }

    /// Record one individual's position: increment the occupied bin of
    /// every dimension
    pub fn update(&mut self, gene: &Gene) {
        for dim in &mut self.dims {
            let idx = dim.bin_index(gene[dim.locus].val);
            dim.bins[idx] += 1;
        }
    }

    /// Diversity factor for an individual:
    /// `mfact ^ (sum over dims of 1/occupancy[bin])`, always in `(0, 1]`.
    ///
    /// Every individual must have been [`Histogram::update`]d before the
    /// first `merit_factor` call; the histogram build is a synchronization
    /// point over the whole population.
    pub fn merit_factor(&self, gene: &Gene) -> f64 {
        let exponent: f64 = self
            .dims
            .iter()
            .map(|dim| {
                let occ = dim.bins[dim.bin_index(gene[dim.locus].val)];
                debug_assert!(occ > 0, "merit_factor before update");
                1.0 / occ.max(1) as f64
            })
            .sum();
        self.mfact.powf(exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::Allele;
    use approx::assert_relative_eq;

    fn template() -> Gene {
        Gene::from_alleles(vec![
            Allele::continuous(0.0, 0.5, 1.0),
            Allele::fixed(9.0),
            Allele::discrete(0.0, 1.0, 4.5),
        ])
    }

    #[test]
    fn test_histogram_bin_layout() {
        let h = Histogram::new(&template(), 16, 25).unwrap();
        assert_eq!(h.num_dims(), 2);
        assert_eq!(h.dims[0].bins.len(), 16); // continuous
        assert_eq!(h.dims[1].bins.len(), 5); // ceil(4.5)
        assert_relative_eq!(h.mfact(), 1.0 - 1.0 / 5.0);
    }

    #[test]
    fn test_histogram_requires_dynamic_allele() {
        let g = Gene::from_alleles(vec![Allele::fixed(1.0)]);
        assert_eq!(
            Histogram::new(&g, 16, 10).unwrap_err(),
            FitError::EmptyDynamicDna
        );
    }

    #[test]
    fn test_histogram_update_and_occupancy() {
        let mut h = Histogram::new(&template(), 4, 9).unwrap();
        let mut g = template();

        h.update(&g); // val 0.5 lands in bin 2 of 4
        g[0].val = 0.5;
        h.update(&g);
        assert_eq!(h.dims[0].bins[2], 2);
    }

    #[test]
    fn test_bin_index_clamps_boundaries() {
        let h = Histogram::new(&template(), 4, 9).unwrap();
        // val == max computes a raw index of bins.len(); it must clamp
        assert_eq!(h.dims[0].bin_index(1.0), 3);
        assert_eq!(h.dims[0].bin_index(0.0), 0);
    }

    #[test]
    fn test_merit_factor_in_unit_interval() {
        let mut h = Histogram::new(&template(), 8, 100).unwrap();
        let g = template();
        h.update(&g);

        let f = h.merit_factor(&g);
        assert!(f > 0.0 && f <= 1.0);
    }

    #[test]
    fn test_crowded_bin_penalized_less_than_lone_bin() {
        let mut h = Histogram::new(&template(), 8, 100).unwrap();
        let lone = template();
        let mut crowded = template();
        crowded[0].val = 0.9;
        crowded[2].val = 3.0;

        h.update(&lone);
        for _ in 0..10 {
            h.update(&crowded);
        }

        // occupancy 1 gives the strongest penalty exponent, so the lone
        // individual keeps a smaller fraction of its raw merit than the
        // crowd keeps of theirs -- but every individual in the crowd
        // competes for the same resource, which is the point
        assert!(h.merit_factor(&lone) < h.merit_factor(&crowded));
    }
}
