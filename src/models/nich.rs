//! Normal-Inverse-χ²: real observations from a Gaussian with unknown mean
//! and variance
use std::f64::consts::PI;

use crate::codec;
use crate::consts::HALF_LN_PI;
use crate::misc::ln_gammafn;
use crate::result::{Error, Result};
use crate::traits::{Example, Model};
use rand::Rng;
use rand_distr::{ChiSquared, Normal};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Normal-Inverse-χ² prior, NIX(μ, κ, σ², ν), on the mean and variance of a
/// Gaussian likelihood.
///
/// The variance is Scaled-Inv-χ²(ν, σ²) and, given the variance `s²`, the
/// mean is N(μ, s²/κ).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct NormalInvChiSquared {
    mu: f64,
    kappa: f64,
    sigmasq: f64,
    nu: f64,
}

/// Running Gaussian statistics kept in Welford's form.
///
/// Removal reverses the update exactly in real arithmetic but only
/// approximately in floating point. Removing the last observation resets the
/// group exactly. Observed values are counted by bit pattern so that only
/// values that were added can be removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalInvChiSquaredGroup {
    count: u32,
    mean: f64,
    count_times_variance: f64,
    counts: BTreeMap<u64, u32>,
}

// -0.0 and 0.0 compare equal, so they share a key
fn value_key(x: f64) -> u64 {
    if x == 0.0 {
        0
    } else {
        x.to_bits()
    }
}

impl NormalInvChiSquaredGroup {
    #[inline]
    pub fn n(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sum of squared differences from the mean
    #[inline]
    pub fn sum_sq_diff(&self) -> f64 {
        self.count_times_variance
    }

    #[inline]
    pub fn sum_x(&self) -> f64 {
        self.mean * f64::from(self.count)
    }

    /// Number of times `x` was observed
    pub fn count_of(&self, x: f64) -> u32 {
        self.counts.get(&value_key(x)).copied().unwrap_or(0)
    }

    fn observe(&mut self, x: f64) {
        *self.counts.entry(value_key(x)).or_insert(0) += 1;
        self.count += 1;
        let mean_xn = (x - self.mean).mul_add(f64::from(self.count).recip(), self.mean);
        self.count_times_variance =
            (x - self.mean).mul_add(x - mean_xn, self.count_times_variance);
        self.mean = mean_xn;
    }

    /// Undo `observe(x)`. Returns `false`, leaving the group untouched, when
    /// `x` was never observed.
    fn forget(&mut self, x: f64) -> bool {
        let key = value_key(x);
        match self.counts.get(&key).copied() {
            Some(ct) if ct > 1 => {
                self.counts.insert(key, ct - 1);
            }
            Some(_) => {
                self.counts.remove(&key);
            }
            None => return false,
        }
        if self.count > 1 {
            let n = f64::from(self.count);
            let nm1 = f64::from(self.count - 1);
            let old_mean = (n / nm1).mul_add(self.mean, -x / nm1);
            self.count_times_variance = (self.count_times_variance
                - (x - old_mean) * (x - self.mean))
                .max(0.0);
            self.mean = old_mean;
            self.count -= 1;
        } else {
            *self = Self::default();
        }
        true
    }

    /// Chan et al.'s pairwise combination of two Welford summaries
    fn combine(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        for (&key, &ct) in &other.counts {
            *self.counts.entry(key).or_insert(0) += ct;
        }
        let na = f64::from(self.count);
        let nb = f64::from(other.count);
        let n = na + nb;
        let delta = other.mean - self.mean;
        self.mean = delta.mul_add(nb / n, self.mean);
        self.count_times_variance += other.count_times_variance + delta * delta * na * nb / n;
        self.count += other.count;
    }
}

/// Posterior hyperparameters
#[derive(Clone, Copy, Debug, PartialEq)]
struct Posterior {
    mn: f64,
    kn: f64,
    s2n: f64,
    vn: f64,
}

impl NormalInvChiSquared {
    /// Create a new Normal-Inverse-χ² model
    ///
    /// # Arguments
    /// - mu: prior mean
    /// - kappa: how strongly we believe the prior mean (in prior pseudo-observations)
    /// - sigmasq: prior variance
    /// - nu: how strongly we believe the prior variance (in prior pseudo-observations)
    ///
    /// # Example
    ///
    /// ```
    /// # use conjugate::models::NormalInvChiSquared;
    /// assert!(NormalInvChiSquared::new(0.0, 1.0, 1.0, 1.0).is_ok());
    /// assert!(NormalInvChiSquared::new(0.0, 0.0, 1.0, 1.0).is_err());
    /// assert!(NormalInvChiSquared::new(f64::NAN, 1.0, 1.0, 1.0).is_err());
    /// ```
    pub fn new(mu: f64, kappa: f64, sigmasq: f64, nu: f64) -> Result<Self> {
        if !mu.is_finite() {
            return Err(Error::malformed(
                Self::NAME,
                format!("mu ({}) must be finite", mu),
            ));
        }
        for (name, x) in [("kappa", kappa), ("sigmasq", sigmasq), ("nu", nu)] {
            if !(x.is_finite() && x > 0.0) {
                return Err(Error::malformed(
                    Self::NAME,
                    format!("{} ({}) must be finite and greater than zero", name, x),
                ));
            }
        }
        Ok(Self::new_unchecked(mu, kappa, sigmasq, nu))
    }

    #[inline]
    pub fn new_unchecked(mu: f64, kappa: f64, sigmasq: f64, nu: f64) -> Self {
        NormalInvChiSquared {
            mu,
            kappa,
            sigmasq,
            nu,
        }
    }

    #[inline]
    pub fn mu(&self) -> f64 {
        self.mu
    }

    #[inline]
    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    #[inline]
    pub fn sigmasq(&self) -> f64 {
        self.sigmasq
    }

    #[inline]
    pub fn nu(&self) -> f64 {
        self.nu
    }

    // Murphy, "Conjugate Bayesian analysis of the Gaussian distribution",
    // section 6.3
    fn posterior(&self, group: &NormalInvChiSquaredGroup) -> Posterior {
        let (m, k, s2, v) = (self.mu, self.kappa, self.sigmasq, self.nu);
        if group.count == 0 {
            return Posterior {
                mn: m,
                kn: k,
                s2n: s2,
                vn: v,
            };
        }

        let n = f64::from(group.count);
        let kn = k + n;
        let kn_recip = kn.recip();
        let vn = v + n;
        let mn = k.mul_add(m, group.sum_x()) * kn_recip;
        let diff_m_xbar = m - group.mean;
        let s2n = v.mul_add(
            s2,
            ((n * k * kn_recip) * diff_m_xbar).mul_add(diff_m_xbar, group.count_times_variance),
        ) / vn;

        Posterior { mn, kn, s2n, vn }
    }

    fn check_value(x: f64) -> Result<()> {
        if x.is_finite() {
            Ok(())
        } else {
            Err(Error::invalid_value(
                Self::NAME,
                format!("observation ({}) must be finite", x),
            ))
        }
    }
}

fn ln_z(kappa: f64, sigmasq: f64, nu: f64) -> f64 {
    let term = (nu * sigmasq).ln().mul_add(-0.5 * nu, ln_gammafn(0.5 * nu));
    kappa.ln().mul_add(-0.5, term)
}

/// Student-t posterior predictive, with its normalizer precomputed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalInvChiSquaredScorer {
    mn: f64,
    kn: f64,
    s2n: f64,
    vn: f64,
    ln_norm: f64,
}

/// Mean and standard deviation drawn from the posterior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalInvChiSquaredSampler {
    mu: f64,
    sigma: f64,
}

impl Model for NormalInvChiSquared {
    const NAME: &'static str = "nich";

    type Value = f64;
    type Group = NormalInvChiSquaredGroup;
    type Scorer = NormalInvChiSquaredScorer;
    type Sampler = NormalInvChiSquaredSampler;

    fn load_model(params: &Value) -> Result<Self> {
        let NormalInvChiSquared {
            mu,
            kappa,
            sigmasq,
            nu,
        } = codec::load_params(Self::NAME, params)?;
        Self::new(mu, kappa, sigmasq, nu)
    }

    fn examples() -> Vec<Example> {
        vec![
            Example {
                model: json!({"mu": 0.0, "kappa": 1.0, "sigmasq": 1.0, "nu": 1.0}),
                values: [-4.0, -2.0, -1.0, 0.0, 1.0, 2.0, 4.0]
                    .iter()
                    .map(|x| json!(x))
                    .collect(),
            },
            Example {
                model: json!({"mu": 1.5, "kappa": 0.5, "sigmasq": 2.0, "nu": 3.0}),
                values: [1.0, 2.5, -0.5, 3.0].iter().map(|x| json!(x)).collect(),
            },
        ]
    }

    fn group_init(&self, group: &mut NormalInvChiSquaredGroup) {
        *group = NormalInvChiSquaredGroup::default();
    }

    fn group_add_value(&self, group: &mut NormalInvChiSquaredGroup, value: &f64) -> Result<()> {
        Self::check_value(*value)?;
        group.observe(*value);
        Ok(())
    }

    fn group_remove_value(
        &self,
        group: &mut NormalInvChiSquaredGroup,
        value: &f64,
    ) -> Result<()> {
        if group.forget(*value) {
            Ok(())
        } else {
            Err(Error::invalid_removal(format!(
                "no observations of {} to remove",
                value
            )))
        }
    }

    fn group_merge(&self, dst: &mut NormalInvChiSquaredGroup, src: &NormalInvChiSquaredGroup) {
        dst.combine(src);
    }

    fn scorer_init(&self, group: &NormalInvChiSquaredGroup) -> NormalInvChiSquaredScorer {
        let Posterior { mn, kn, s2n, vn } = self.posterior(group);
        let ln_norm = 0.5_f64.mul_add(
            (kn / ((kn + 1.0) * PI * vn * s2n)).ln(),
            ln_gammafn((vn + 1.0) / 2.0) - ln_gammafn(vn / 2.0),
        );
        NormalInvChiSquaredScorer {
            mn,
            kn,
            s2n,
            vn,
            ln_norm,
        }
    }

    fn scorer_eval(&self, scorer: &NormalInvChiSquaredScorer, value: &f64) -> Result<f64> {
        Self::check_value(*value)?;
        let diff = value - scorer.mn;
        Ok(((scorer.vn + 1.0) / 2.0).mul_add(
            -((scorer.kn * diff * diff) / ((scorer.kn + 1.0) * scorer.vn * scorer.s2n)).ln_1p(),
            scorer.ln_norm,
        ))
    }

    fn sampler_init<R: Rng>(
        &self,
        group: &NormalInvChiSquaredGroup,
        rng: &mut R,
    ) -> NormalInvChiSquaredSampler {
        let Posterior { mn, kn, s2n, vn } = self.posterior(group);
        let x2: f64 = rng.sample(ChiSquared::new(vn).expect("posterior nu is positive"));
        let var = vn * s2n / x2;
        let sigma = if var <= 0.0 || !var.is_finite() {
            f64::EPSILON
        } else {
            var.sqrt()
        };
        let mu = rng.sample(Normal::new(mn, sigma / kn.sqrt()).expect("posterior sigma is positive"));
        NormalInvChiSquaredSampler { mu, sigma }
    }

    fn sampler_eval<R: Rng>(&self, sampler: &NormalInvChiSquaredSampler, rng: &mut R) -> f64 {
        rng.sample(Normal::new(sampler.mu, sampler.sigma).expect("sigma is positive"))
    }

    fn score_group(&self, group: &NormalInvChiSquaredGroup) -> f64 {
        let n = f64::from(group.count);
        let post = self.posterior(group);
        let ln_z_n = ln_z(post.kn, post.s2n, post.vn);
        let ln_z_0 = ln_z(self.kappa, self.sigmasq, self.nu);
        n.mul_add(-HALF_LN_PI, ln_z_n - ln_z_0)
    }

    fn validate_group(&self, group: &NormalInvChiSquaredGroup) -> Result<()> {
        let counted: u64 = group.counts.values().map(|&ct| u64::from(ct)).sum();
        let valid = group.mean.is_finite()
            && group.count_times_variance.is_finite()
            && group.count_times_variance >= 0.0
            && (group.count > 0 || (group.mean == 0.0 && group.count_times_variance == 0.0))
            && counted == u64::from(group.count)
            && group
                .counts
                .iter()
                .all(|(&key, &ct)| ct > 0 && f64::from_bits(key).is_finite());
        if valid {
            Ok(())
        } else {
            Err(Error::invalid_value(
                Self::NAME,
                format!("inconsistent group statistics: {:?}", group),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::misc::density_goodness_of_fit;
    use crate::test_model;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    const TOL: f64 = 1E-12;

    test_model!(NormalInvChiSquared, tol = 1E-9);

    fn group_of(model: &NormalInvChiSquared, xs: &[f64]) -> NormalInvChiSquaredGroup {
        let mut group = model.group();
        xs.iter().for_each(|x| model.group_add_value(&mut group, x).unwrap());
        group
    }

    #[test]
    fn welford_mean_and_variance() {
        let model = NormalInvChiSquared::new(0.0, 1.0, 1.0, 1.0).unwrap();
        let group = group_of(&model, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(group.n(), 4);
        assert::close(group.mean(), 2.5, TOL);
        assert::close(group.sum_sq_diff(), 5.0, TOL);
    }

    #[test]
    fn forget_reverses_observe() {
        let model = NormalInvChiSquared::new(0.0, 1.0, 1.0, 1.0).unwrap();
        let mut group = group_of(&model, &[1.0, 2.0, 3.0, 4.0]);
        model.group_remove_value(&mut group, &4.0).unwrap();
        assert::close(group.mean(), 2.0, TOL);
        assert::close(group.sum_sq_diff(), 2.0, TOL);
    }

    #[test]
    fn removing_last_value_resets_exactly() {
        let model = NormalInvChiSquared::new(0.0, 1.0, 1.0, 1.0).unwrap();
        let mut group = group_of(&model, &[0.1, 0.7]);
        model.group_remove_value(&mut group, &0.1).unwrap();
        model.group_remove_value(&mut group, &0.7).unwrap();
        assert_eq!(group, model.group());
        assert!(model.group_remove_value(&mut group, &0.7).unwrap_err().is_invalid_removal());
    }

    #[test]
    fn removing_unseen_value_fails() {
        let model = NormalInvChiSquared::new(0.0, 1.0, 1.0, 1.0).unwrap();
        let mut single = group_of(&model, &[3.0]);
        let before = single.clone();
        assert!(model.group_remove_value(&mut single, &7.0).unwrap_err().is_invalid_removal());
        assert_eq!(single, before);

        let mut group = group_of(&model, &[3.0, -1.5, 3.0]);
        let before = group.clone();
        for x in [7.0, 3.0000001, f64::NAN] {
            assert!(model.group_remove_value(&mut group, &x).unwrap_err().is_invalid_removal());
            assert_eq!(group, before);
        }
        model.group_remove_value(&mut group, &3.0).unwrap();
        assert_eq!(group.count_of(3.0), 1);
        model.group_remove_value(&mut group, &3.0).unwrap();
        assert!(model.group_remove_value(&mut group, &3.0).unwrap_err().is_invalid_removal());
    }

    #[test]
    fn signed_zeros_are_one_value() {
        let model = NormalInvChiSquared::new(0.0, 1.0, 1.0, 1.0).unwrap();
        let mut group = group_of(&model, &[-0.0, 2.0]);
        assert_eq!(group.count_of(0.0), 1);
        model.group_remove_value(&mut group, &0.0).unwrap();
        assert_eq!(group.n(), 1);
    }

    #[test]
    fn merge_matches_sequential() {
        let model = NormalInvChiSquared::new(0.0, 1.0, 1.0, 1.0).unwrap();
        let whole = group_of(&model, &[1.0, -2.0, 3.5, 0.25, 8.0]);
        let mut left = group_of(&model, &[1.0, -2.0]);
        let right = group_of(&model, &[3.5, 0.25, 8.0]);
        model.group_merge(&mut left, &right);
        assert_eq!(left.n(), whole.n());
        assert_eq!(left.count_of(8.0), 1);
        assert::close(left.mean(), whole.mean(), TOL);
        assert::close(left.sum_sq_diff(), whole.sum_sq_diff(), 1E-10);
    }

    #[test]
    fn prior_predictive_is_student_t() {
        // With no data the predictive is t_ν(μ, σ²(1 + 1/κ)); at x = μ with
        // κ = σ² = ν = 1 it is Cauchy(0, √2) evaluated at 0.
        let model = NormalInvChiSquared::new(0.0, 1.0, 1.0, 1.0).unwrap();
        let expected = -(PI * 2.0_f64.sqrt()).ln();
        assert::close(model.score_value(&model.group(), &0.0).unwrap(), expected, TOL);
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let model = NormalInvChiSquared::new(0.0, 1.0, 1.0, 1.0).unwrap();
        let mut group = model.group();
        for x in [f64::NAN, f64::INFINITY] {
            assert!(matches!(
                model.group_add_value(&mut group, &x),
                Err(Error::InvalidValue { .. })
            ));
            assert!(model.score_value(&group, &x).is_err());
        }
        assert_eq!(group, model.group());
    }

    #[test]
    fn load_model_rejects_bad_params() {
        for params in [
            json!({"mu": 0.0, "kappa": -1.0, "sigmasq": 1.0, "nu": 1.0}),
            json!({"mu": 0.0, "kappa": 1.0, "sigmasq": 0.0, "nu": 1.0}),
            json!({"mu": 0.0, "kappa": 1.0, "sigmasq": 1.0}),
            json!({"m": 0.0, "kappa": 1.0, "sigmasq": 1.0, "nu": 1.0}),
            json!([0.0, 1.0, 1.0, 1.0]),
        ] {
            let err = NormalInvChiSquared::load_model(&params).unwrap_err();
            assert!(err.is_malformed_parameters(), "{}", params);
        }
    }

    #[test]
    fn load_group_rejects_negative_variance() {
        let model = NormalInvChiSquared::new(0.0, 1.0, 1.0, 1.0).unwrap();
        let dump = json!({
            "count": 2,
            "mean": 0.0,
            "count_times_variance": -1.0,
            "counts": {"0": 2}
        });
        assert!(model.load_group(&dump).is_err());
    }

    #[test]
    fn load_group_checks_value_counts() {
        let model = NormalInvChiSquared::new(0.0, 1.0, 1.0, 1.0).unwrap();
        let group = group_of(&model, &[1.0, 2.0]);
        let mut dump = NormalInvChiSquared::dump_group(&group).unwrap();
        assert_eq!(model.load_group(&dump).unwrap(), group);
        dump["count"] = json!(3);
        assert!(model.load_group(&dump).is_err());
    }

    #[test]
    fn sample_value_goodness_of_fit() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0x41C);
        let model = NormalInvChiSquared::new(1.5, 0.5, 2.0, 3.0).unwrap();
        let group = group_of(&model, &[1.0, 2.5, -0.5, 3.0]);

        let xs: Vec<f64> = (0..2000).map(|_| model.sample_value(&group, &mut rng)).collect();
        let densities: Vec<f64> = xs
            .iter()
            .map(|x| model.score_value(&group, x).unwrap().exp())
            .collect();
        assert!(density_goodness_of_fit(&xs, &densities).unwrap() > 1e-3);
    }
}
