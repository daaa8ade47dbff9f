use crate::consts::MIN_EXPECTED_COUNT;
use crate::result::{Error, Result};
use special::Gamma;
use std::collections::BTreeMap;

/// Survival function of the χ² distribution with `df` degrees of freedom
fn x2_sf(x2: f64, df: f64) -> f64 {
    (1.0 - (x2 / 2.0).inc_gamma(df / 2.0)).clamp(0.0, 1.0)
}

fn goodness_of_fit(
    probs: &[f64],
    counts: &[usize],
    total: usize,
    truncated: bool,
) -> Result<f64> {
    if probs.is_empty() {
        return Err(Error::EmptyInput);
    }
    if probs.len() != counts.len() {
        return Err(Error::InvalidArgument(format!(
            "{} probabilities but {} counts",
            probs.len(),
            counts.len()
        )));
    }
    if let Some(p) = probs.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(Error::InvalidArgument(format!("bad probability: {}", p)));
    }
    let n_counted: usize = counts.iter().sum();
    if (truncated && n_counted > total) || (!truncated && n_counted != total) {
        return Err(Error::InvalidArgument(format!(
            "counts sum to {} but total is {}",
            n_counted, total
        )));
    }

    let nf = total as f64;
    let mut bins: Vec<(f64, f64)> = Vec::with_capacity(probs.len());
    let mut pooled = (0.0, 0.0);

    for (&p, &ct) in probs.iter().zip(counts.iter()) {
        if p == 1.0 {
            return Ok(if ct == total { 1.0 } else { 0.0 });
        } else if p == 0.0 {
            if ct > 0 {
                return Ok(0.0);
            }
            continue;
        }

        let expected = nf * p;
        if expected < MIN_EXPECTED_COUNT {
            pooled.0 += expected;
            pooled.1 += ct as f64;
        } else {
            bins.push((expected, ct as f64));
        }
    }

    if pooled.0 > 0.0 {
        tracing::trace!(
            expected = pooled.0,
            observed = pooled.1,
            "pooling sparse goodness-of-fit bins"
        );
        let smallest = bins
            .iter_mut()
            .min_by(|a, b| a.0.total_cmp(&b.0));
        match smallest {
            Some(bin) if pooled.0 < MIN_EXPECTED_COUNT => {
                bin.0 += pooled.0;
                bin.1 += pooled.1;
            }
            _ => bins.push(pooled),
        }
    }

    let x2 = bins
        .iter()
        .fold(0.0, |acc, (e, o)| acc + (o - e) * (o - e) / e);
    let df = if truncated {
        bins.len()
    } else {
        bins.len().saturating_sub(1)
    };

    if df == 0 {
        Ok(1.0)
    } else {
        Ok(x2_sf(x2, df as f64))
    }
}

/// Pearson's χ² test of observed `counts` against a multinomial with
/// probabilities `probs` and `total` trials.
///
/// Returns the p-value. Bins whose expected count falls below five are pooled
/// before the statistic is computed.
///
/// # Example
///
/// Test whether the observed counts were generated uniformly.
///
/// ```
/// use conjugate::misc::multinomial_goodness_of_fit;
///
/// let counts: Vec<usize> = vec![28, 31, 40, 35];
/// let probs: Vec<f64> = vec![0.25; 4];
///
/// let p = multinomial_goodness_of_fit(&probs, &counts, 134).unwrap();
/// assert!(p > 0.05);
/// ```
pub fn multinomial_goodness_of_fit(
    probs: &[f64],
    counts: &[usize],
    total: usize,
) -> Result<f64> {
    goodness_of_fit(probs, counts, total, false)
}

/// As [`multinomial_goodness_of_fit`], but `probs` and `counts` cover only part
/// of the support, so neither needs to sum to its total.
pub fn multinomial_goodness_of_fit_truncated(
    probs: &[f64],
    counts: &[usize],
    total: usize,
) -> Result<f64> {
    goodness_of_fit(probs, counts, total, true)
}

/// Test whether `samples` are uniformly distributed over [0, 1).
///
/// Uses `⌊n^(1/3)⌋` equal-width bins, which must come to at least seven.
pub fn unif01_goodness_of_fit(samples: &[f64]) -> Result<f64> {
    let n = samples.len();
    let bin_count = (n as f64).cbrt().floor() as usize;
    if bin_count < 7 {
        return Err(Error::InvalidArgument(format!(
            "{} samples are too few for a uniform goodness-of-fit test",
            n
        )));
    }
    if let Some(x) = samples.iter().find(|x| !(0.0..=1.0).contains(*x)) {
        return Err(Error::InvalidArgument(format!(
            "sample {} is outside [0, 1]",
            x
        )));
    }

    let mut counts = vec![0_usize; bin_count];
    samples.iter().for_each(|&x| {
        let ix = ((bin_count as f64 * x) as usize).min(bin_count - 1);
        counts[ix] += 1;
    });
    let probs = vec![(bin_count as f64).recip(); bin_count];

    multinomial_goodness_of_fit(&probs, &counts, n)
}

/// Test continuous `samples` against the `densities` evaluated at them.
///
/// For sorted samples from a density `f`, the gap between neighbors times `n`
/// times the local density is approximately Exp(1), so `1 - exp(-gap · n · f)`
/// is approximately uniform and can be handed to
/// [`unif01_goodness_of_fit`].
pub fn density_goodness_of_fit(samples: &[f64], densities: &[f64]) -> Result<f64> {
    if samples.len() != densities.len() {
        return Err(Error::InvalidArgument(format!(
            "{} samples but {} densities",
            samples.len(),
            densities.len()
        )));
    }
    if samples.len() < 2 {
        return Err(Error::EmptyInput);
    }

    let mut pairs: Vec<(f64, f64)> = samples
        .iter()
        .copied()
        .zip(densities.iter().copied())
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let nf = pairs.len() as f64;
    let unif01: Vec<f64> = pairs
        .windows(2)
        .map(|w| {
            let (x0, f0) = w[0];
            let (x1, f1) = w[1];
            let density = nf * (f0 * f1).sqrt();
            -(-(x1 - x0) * density).exp_m1()
        })
        .collect();

    unif01_goodness_of_fit(&unif01)
}

/// Test discrete `samples` against the probabilities in `probs`.
///
/// When `truncated` is `false`, `probs` must cover the whole support and a
/// sample outside it fails the test outright. When `true`, samples outside
/// `probs` are ignored and only the listed values are tested.
pub fn discrete_goodness_of_fit<T: Ord>(
    samples: &[T],
    probs: &BTreeMap<T, f64>,
    truncated: bool,
) -> Result<f64> {
    let mut counts: BTreeMap<&T, usize> = probs.keys().map(|k| (k, 0)).collect();
    for x in samples {
        match counts.get_mut(x) {
            Some(ct) => *ct += 1,
            None if truncated => (),
            None => return Ok(0.0),
        }
    }

    let ps: Vec<f64> = probs.values().copied().collect();
    let cts: Vec<usize> = counts.values().copied().collect();
    goodness_of_fit(&ps, &cts, samples.len(), truncated)
}
