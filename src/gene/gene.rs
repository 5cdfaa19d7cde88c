//! Candidate-solution parameter vector
//!
//! A [`Gene`] is the ordered, exclusively-owned collection of [`Allele`]s
//! describing one candidate solution. It supports filtered indexing (the
//! i-th allele *of a given kind* mapped back to its absolute position),
//! clamped bulk assignment, and growth by appending.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GeneError;
use crate::gene::allele::{Allele, KindFilter};

/// Ordered, resizable sequence of alleles describing one candidate solution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    alleles: Vec<Allele>,
}

impl Gene {
    /// Create an empty gene
    pub fn new() -> Self {
        Self {
            alleles: Vec::new(),
        }
    }

    /// Create a gene from a vector of alleles
    pub fn from_alleles(alleles: Vec<Allele>) -> Self {
        Self { alleles }
    }

    /// Total number of alleles
    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    /// Check if the gene has no alleles
    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }

    /// Get an allele by absolute index
    pub fn get(&self, index: usize) -> Option<&Allele> {
        self.alleles.get(index)
    }

    /// Get a mutable allele by absolute index
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Allele> {
        self.alleles.get_mut(index)
    }

    /// Append one allele (reallocates)
    pub fn push(&mut self, allele: Allele) {
        self.alleles.push(allele);
    }

    /// Iterate over the alleles
    pub fn iter(&self) -> impl Iterator<Item = &Allele> {
        self.alleles.iter()
    }

    /// Check the validity invariant over every dynamic allele
    pub fn is_valid(&self) -> bool {
        self.alleles.iter().all(Allele::is_valid)
    }

    /// Resample every dynamic allele uniformly within its bounds
    pub fn randomize<R: Rng>(&mut self, rng: &mut R) {
        for allele in &mut self.alleles {
            allele.randomize(rng);
        }
    }

    /// Count the alleles matching a kind filter
    pub fn num_alleles(&self, filter: KindFilter) -> usize {
        self.alleles.iter().filter(|a| filter.matches(a)).count()
    }

    /// Map the i-th allele matching `filter` back to its absolute index
    pub fn real_index(&self, i: usize, filter: KindFilter) -> Result<usize, GeneError> {
        self.alleles
            .iter()
            .enumerate()
            .filter(|(_, a)| filter.matches(a))
            .nth(i)
            .map(|(idx, _)| idx)
            .ok_or(GeneError::AlleleIndexInvalid {
                index: i,
                len: self.num_alleles(filter),
            })
    }

    /// Collect the values of the alleles matching `filter`, in order
    pub fn values(&self, filter: KindFilter) -> Vec<f64> {
        self.alleles
            .iter()
            .filter(|a| filter.matches(a))
            .map(|a| a.val)
            .collect()
    }

    /// Bulk-assign the alleles matching `filter`, clamping each new value
    /// into its `[min, max]` box (values are never rejected, only clamped).
    pub fn regene(&mut self, values: &[f64], filter: KindFilter) -> Result<(), GeneError> {
        let count = self.num_alleles(filter);
        if values.len() != count {
            return Err(GeneError::ValueCountMismatch {
                expected: count,
                actual: values.len(),
            });
        }
        let mut vals = values.iter();
        for allele in self.alleles.iter_mut().filter(|a| filter.matches(a)) {
            // count matched above, so the iterator cannot run dry
            let v = vals.next().copied().unwrap_or(allele.val);
            allele.val = v.clamp(allele.min, allele.max);
        }
        Ok(())
    }

    /// Pick a uniformly random dynamic allele, returning its absolute index
    pub fn random_dynamic_index<R: Rng>(&self, rng: &mut R) -> Result<usize, GeneError> {
        let n = self.num_alleles(KindFilter::Dynamic);
        if n == 0 {
            return Err(GeneError::NoDynamicAlleles);
        }
        let ordinal = (rng.gen::<f64>() * n as f64) as usize;
        self.real_index(ordinal.min(n - 1), KindFilter::Dynamic)
    }
}

impl std::ops::Index<usize> for Gene {
    type Output = Allele;

    fn index(&self, index: usize) -> &Self::Output {
        &self.alleles[index]
    }
}

impl std::ops::IndexMut<usize> for Gene {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.alleles[index]
    }
}

impl std::ops::AddAssign<Allele> for Gene {
    fn add_assign(&mut self, allele: Allele) {
        self.alleles.push(allele);
    }
}

impl std::ops::AddAssign<&Gene> for Gene {
    fn add_assign(&mut self, other: &Gene) {
        self.alleles.extend_from_slice(&other.alleles);
    }
}

impl FromIterator<Allele> for Gene {
    fn from_iter<I: IntoIterator<Item = Allele>>(iter: I) -> Self {
        Self {
            alleles: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Gene {
    type Item = &'a Allele;
    type IntoIter = std::slice::Iter<'a, Allele>;

    fn into_iter(self) -> Self::IntoIter {
        self.alleles.iter()
    }
}
