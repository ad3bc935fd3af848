use crate::error::{SimError, SimResult};
use anyhow::{Context, Result, bail};
use std::{fmt::Debug, ops::RangeBounds};

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

/// Validate a probability, returning it unchanged.
pub fn check_prob(prob: f64) -> SimResult<f64> {
    if !(0.0..=1.0).contains(&prob) {
        return Err(SimError::InvalidProbability(prob));
    }
    Ok(prob)
}

/// Check a square mixing matrix: zero diagonal, non-negative entries and,
/// when there is more than one row, every row summing to 1.
pub fn check_mixing(mat: &[Vec<f64>], exp_dim: usize) -> Result<()> {
    let n_rows = mat.len();
    if n_rows != exp_dim {
        bail!("matrix must have {exp_dim} rows, but has {n_rows}");
    }
    if mat.iter().any(|row| row.len() != exp_dim) {
        bail!("matrix must have {exp_dim} columns");
    }
    for (i_row, row) in mat.iter().enumerate() {
        check_row(row, i_row, exp_dim > 1).with_context(|| format!("invalid row {i_row}"))?;
    }
    Ok(())
}

fn check_row(row: &[f64], i_diag: usize, must_sum: bool) -> Result<()> {
    if row[i_diag] != 0.0 {
        bail!("diagonal element must be 0.0, but is {}", row[i_diag]);
    }
    if row.iter().any(|&ele| ele < 0.0) {
        bail!("row must have only non-negative elements");
    }
    if !must_sum {
        return Ok(());
    }
    let sum: f64 = row.iter().sum();
    let tol = 1e-8;
    if (sum - 1.0).abs() > tol {
        bail!("row must sum to 1.0 (tolerance: {tol}), but sums to {sum}");
    }
    Ok(())
}

/// Geometric mean of two non-negative quantities.
pub fn geo_mean(a: f64, b: f64) -> f64 {
    (a * b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixing_rows_must_sum_to_one() {
        assert!(check_mixing(&[vec![0.0, 1.0], vec![1.0, 0.0]], 2).is_ok());
        assert!(check_mixing(&[vec![0.0, 0.5], vec![1.0, 0.0]], 2).is_err());
        assert!(check_mixing(&[vec![0.5, 0.5], vec![1.0, 0.0]], 2).is_err());
        assert!(check_mixing(&[vec![0.0]], 1).is_ok());
        assert!(check_mixing(&[vec![0.0, 1.0]], 2).is_err());
    }

    #[test]
    fn probabilities_outside_unit_interval_are_rejected() {
        assert_eq!(check_prob(0.25), Ok(0.25));
        assert_eq!(check_prob(1.5), Err(SimError::InvalidProbability(1.5)));
        assert!(check_prob(f64::NAN).is_err());
    }
}
