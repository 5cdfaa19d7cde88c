//! Error types
//!
//! Layered by concern: [`GeneError`] for indexing and assignment on a
//! single gene, [`OperatorError`] for recombination failures, and
//! [`FitError`] as the run-level umbrella everything converts into
//! via `#[from]`.

use thiserror::Error;

/// Error type for gene-level operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeneError {
    /// An allele index fell outside the gene (or outside the filtered view)
    #[error("Allele index {index} invalid for {len} matching alleles")]
    AlleleIndexInvalid { index: usize, len: usize },

    /// A random dynamic locus was requested on an all-static gene
    #[error("No dynamic alleles available")]
    NoDynamicAlleles,

    /// Bulk assignment received the wrong number of values
    #[error("Value count mismatch: expected {expected}, got {actual}")]
    ValueCountMismatch { expected: usize, actual: usize },
}

/// Error type for genetic operator failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OperatorError {
    /// Two chromosomes being crossed have differing dynamic allele counts
    #[error("Crossover allele count mismatch: {left} vs {right} dynamic alleles")]
    AlleleCountMismatch { left: usize, right: usize },

    /// Gene error raised while applying an operator
    #[error(transparent)]
    Gene(#[from] GeneError),
}

/// Top-level error type for a genetic-algorithm run
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    /// Gene error
    #[error("Gene error: {0}")]
    Gene(#[from] GeneError),

    /// Operator error
    #[error("Operator error: {0}")]
    Operator(#[from] OperatorError),

    /// Histogram construction requires at least one dynamic allele
    #[error("Empty dynamic DNA: diversity histogram needs a dynamic allele")]
    EmptyDynamicDna,

    /// The population is empty
    #[error("Empty population")]
    EmptyPopulation,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The run was cancelled via its cancel token
    #[error("Run cancelled")]
    Cancelled,
}

/// Result type alias for genetic-algorithm operations
pub type FitResult<T> = Result<T, FitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gene_error_display() {
        let err = GeneError::AlleleIndexInvalid { index: 7, len: 3 };
        assert_eq!(
            err.to_string(),
            "Allele index 7 invalid for 3 matching alleles"
        );

        let err = GeneError::NoDynamicAlleles;
        assert_eq!(err.to_string(), "No dynamic alleles available");
    }

    #[test]
    fn test_operator_error_display() {
        let err = OperatorError::AlleleCountMismatch { left: 4, right: 2 };
        assert_eq!(
            err.to_string(),
            "Crossover allele count mismatch: 4 vs 2 dynamic alleles"
        );
    }

    #[test]
    fn test_fit_error_from_gene_error() {
        let gene_err = GeneError::NoDynamicAlleles;
        let fit_err: FitError = gene_err.into();
        assert!(matches!(fit_err, FitError::Gene(_)));
    }

    #[test]
    fn test_fit_error_from_operator_error() {
        let op_err = OperatorError::AlleleCountMismatch { left: 1, right: 2 };
        let fit_err: FitError = op_err.into();
        assert!(matches!(fit_err, FitError::Operator(_)));
    }
}
