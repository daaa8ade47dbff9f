use crate::result::{Error, Result};
use itertools::Itertools;

/// Partition a sorted copy of `samples` into `num_bins` contiguous ranges.
///
/// Bins are as equal in size as possible; the remainder goes to the earliest
/// bins. Returns the per-bin counts and, for each bin, the sample values at
/// its start index and at its (exclusive) end index, the latter clamped to the
/// last sample.
///
/// # Example
///
/// ```rust
/// # use conjugate::misc::bin_samples;
/// let (counts, bounds) = bin_samples(&[5.0, 3.0, 0.0, 1.0, 4.0, 2.0], 2).unwrap();
///
/// assert_eq!(counts, vec![3, 3]);
/// assert_eq!(bounds, vec![(0.0, 3.0), (3.0, 5.0)]);
/// ```
pub fn bin_samples(
    samples: &[f64],
    num_bins: usize,
) -> Result<(Vec<usize>, Vec<(f64, f64)>)> {
    let n = samples.len();
    if n == 0 {
        return Err(Error::EmptyInput);
    }
    if num_bins == 0 || num_bins > n {
        return Err(Error::InvalidArgument(format!(
            "cannot split {} samples into {} bins",
            n, num_bins
        )));
    }

    let sorted: Vec<f64> = samples
        .iter()
        .copied()
        .sorted_by(|a, b| a.total_cmp(b))
        .collect();

    let q = n / num_bins;
    let r = n % num_bins;
    let edges: Vec<usize> = (0..=num_bins).map(|i| i * q + i.min(r)).collect();

    let (counts, bounds) = edges
        .iter()
        .tuple_windows()
        .map(|(&start, &end)| (end - start, (sorted[start], sorted[end.min(n - 1)])))
        .unzip();

    Ok((counts, bounds))
}
