use crate::result::{Error, Result};
use rand::distributions::Open01;
use rand::Rng;
use rand_distr::Gamma;
use special::Gamma as _;
use std::ops::AddAssign;

/// Natural logarithm of the gamma function
#[inline]
pub fn ln_gammafn(x: f64) -> f64 {
    x.ln_gamma().0
}

/// ln(n!)
#[inline]
pub fn ln_fact(n: u32) -> f64 {
    ln_gammafn(f64::from(n) + 1.0)
}

/// Largest non-NaN entry of `xs`, or an error if `xs` is empty or holds a
/// NaN.
fn max_score(xs: &[f64]) -> Result<f64> {
    if xs.is_empty() {
        return Err(Error::EmptyInput);
    }
    if xs.iter().any(|x| x.is_nan()) {
        return Err(Error::InvalidArgument(format!(
            "scores contain NaN: {:?}",
            xs
        )));
    }
    let maxval = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if maxval.is_finite() {
        Ok(maxval)
    } else {
        Err(Error::InvalidArgument(format!(
            "scores must have a finite maximum, found {}",
            maxval
        )))
    }
}

/// Safely compute `log(sum(exp(xs))`
///
/// # Example
///
/// ```rust
/// # use conjugate::misc::logsumexp;
/// let xs = vec![1000.0, 1000.0];
/// let lse = logsumexp(&xs).unwrap();
/// assert!((lse - (1000.0 + 2.0_f64.ln())).abs() < 1e-12);
///
/// assert!(logsumexp(&[]).is_err());
/// ```
pub fn logsumexp(xs: &[f64]) -> Result<f64> {
    if xs.len() == 1 {
        return Ok(xs[0]);
    }
    let maxval = max_score(xs)?;
    Ok(xs.iter().fold(0.0, |acc, x| acc + (x - maxval).exp()).ln() + maxval)
}

/// Convert log-domain scores into probabilities that sum to one
///
/// The maximum score is subtracted before exponentiating so that scores many
/// orders of magnitude apart neither overflow nor underflow to NaN.
///
/// # Example
///
/// ```rust
/// # use conjugate::misc::scores_to_probs;
/// let probs = scores_to_probs(&[-10000.0, 10000.0, 10001.0, 9999.0]).unwrap();
///
/// let total: f64 = probs.iter().sum();
/// assert!((total - 1.0).abs() < 1e-12);
/// assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
/// ```
pub fn scores_to_probs(scores: &[f64]) -> Result<Vec<f64>> {
    let maxval = max_score(scores)?;
    let mut probs: Vec<f64> =
        scores.iter().map(|s| (s - maxval).exp()).collect();
    let z: f64 = probs.iter().sum();
    probs.iter_mut().for_each(|p| *p /= z);
    Ok(probs)
}

/// Cumulative sum of `xs`
///
/// # Example
///
/// ```rust
/// # use conjugate::misc::cumsum;
/// let xs: Vec<i32> = vec![1, 1, 2, 1];
/// assert_eq!(cumsum(&xs), vec![1, 2, 4, 5]);
/// ```
pub fn cumsum<T>(xs: &[T]) -> Vec<T>
where
    T: AddAssign + Copy + Default,
{
    xs.iter()
        .scan(T::default(), |acc, &x| {
            *acc += x;
            Some(*acc)
        })
        .collect()
}

#[inline]
fn binary_search(cws: &[f64], r: f64) -> usize {
    let mut left: usize = 0;
    let mut right: usize = cws.len();
    while left < right {
        let mid = (left + right) / 2;
        if cws[mid] <= r {
            left = mid + 1;
        } else {
            right = mid;
        }
    }
    left
}

/// Index of the first cumulative weight exceeding `r`.
///
/// If rounding puts `r` at or past the total, the last index carrying weight
/// wins.
fn catflip(cws: &[f64], r: f64) -> usize {
    let ix = if cws.len() > 9 {
        binary_search(cws, r)
    } else {
        cws.iter().position(|&w| w > r).unwrap_or(cws.len())
    };

    if ix < cws.len() {
        ix
    } else {
        let total = cws[cws.len() - 1];
        cws.iter().position(|&w| w >= total).unwrap_or(cws.len() - 1)
    }
}

/// Draw an index in proportion to non-negative `weights`
///
/// # Example
///
/// ```rust
/// # use conjugate::misc::sample_discrete;
/// let mut rng = rand::thread_rng();
/// let ix = sample_discrete(&[0.0, 3.0, 0.0], &mut rng).unwrap();
/// assert_eq!(ix, 1);
/// ```
pub fn sample_discrete<R: Rng>(weights: &[f64], rng: &mut R) -> Result<usize> {
    if weights.is_empty() {
        return Err(Error::EmptyInput);
    }
    if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
        return Err(Error::InvalidArgument(format!(
            "weights must be finite and non-negative: {:?}",
            weights
        )));
    }
    let cws = cumsum(weights);
    let total = cws[cws.len() - 1];
    if total <= 0.0 {
        return Err(Error::InvalidArgument(String::from(
            "weights sum to zero",
        )));
    }
    let r: f64 = rng.sample(Open01);
    Ok(catflip(&cws, r * total))
}

/// Draw an index according to log-domain weights
///
/// Draws `i` with probability proportional to `exp(scores[i])`. The scores
/// need not be normalized and may be as extreme as ±1000.
///
/// # Examples
///
/// ```rust
/// use conjugate::misc::sample_discrete_log;
///
/// let mut rng = rand::thread_rng();
///
/// // The dominant weight always wins
/// assert_eq!(sample_discrete_log(&[-1.0, -1e3], &mut rng).unwrap(), 0);
/// assert_eq!(sample_discrete_log(&[-1e3, -1.0], &mut rng).unwrap(), 1);
///
/// assert!(sample_discrete_log(&[], &mut rng).is_err());
/// ```
pub fn sample_discrete_log<R: Rng>(scores: &[f64], rng: &mut R) -> Result<usize> {
    let maxval = max_score(scores)?;
    let mut cws: Vec<f64> = scores.iter().map(|s| (s - maxval).exp()).collect();

    for i in 1..cws.len() {
        cws[i] += cws[i - 1];
    }

    let total = cws[cws.len() - 1];
    let r: f64 = rng.sample(Open01);
    Ok(catflip(&cws, r * total))
}

/// Draw `ln X` for `X ~ Gamma(shape, 1)`.
///
/// Small shapes put most of their mass so close to zero that `X` itself
/// underflows, so for `shape < 1` the draw is boosted to `shape + 1` and
/// corrected in the log domain: `ln X = ln Y + ln(U) / shape`.
pub fn sample_ln_gamma<R: Rng>(shape: f64, rng: &mut R) -> Result<f64> {
    if !(shape.is_finite() && shape > 0.0) {
        return Err(Error::InvalidArgument(format!(
            "gamma shape ({}) must be finite and greater than zero",
            shape
        )));
    }
    let boosted = if shape < 1.0 { shape + 1.0 } else { shape };
    let gamma = Gamma::new(boosted, 1.0)
        .map_err(|err| Error::InvalidArgument(err.to_string()))?;
    let y: f64 = rng.sample(gamma);
    if shape < 1.0 {
        let u: f64 = rng.sample(Open01);
        Ok(y.ln() + u.ln() / shape)
    } else {
        Ok(y.ln())
    }
}
