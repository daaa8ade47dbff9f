//! Gamma-Poisson: counts from a Poisson with a Gamma prior on the rate
use crate::codec;
use crate::misc::{ln_fact, ln_gammafn};
use crate::result::{Error, Result};
use crate::traits::{Example, Model};
use rand::Rng;
use rand_distr::{Gamma, Poisson};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Gamma(shape, rate) prior on the rate of a Poisson likelihood
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct GammaPoisson {
    shape: f64,
    rate: f64,
}

/// Poisson sufficient statistics.
///
/// Alongside the count and sum the group keeps how often each value was
/// seen, so removal can reject values that were never added and `Σ ln(x!)`
/// is a function of the multiset rather than of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GammaPoissonGroup {
    count: u32,
    sum: u64,
    counts: BTreeMap<u32, u32>,
}

impl GammaPoissonGroup {
    #[inline]
    pub fn n(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn sum(&self) -> u64 {
        self.sum
    }

    /// Number of times `x` was observed
    pub fn count_of(&self, x: u32) -> u32 {
        self.counts.get(&x).copied().unwrap_or(0)
    }

    /// `Σ ln(x!)`
    pub fn log_prod(&self) -> f64 {
        self.counts
            .iter()
            .map(|(&x, &ct)| f64::from(ct) * ln_fact(x))
            .sum()
    }
}

impl GammaPoisson {
    /// Create a new Gamma-Poisson model
    ///
    /// # Example
    ///
    /// ```
    /// # use conjugate::models::GammaPoisson;
    /// assert!(GammaPoisson::new(2.0, 0.5).is_ok());
    /// assert!(GammaPoisson::new(2.0, -0.5).is_err());
    /// ```
    pub fn new(shape: f64, rate: f64) -> Result<Self> {
        for (name, x) in [("shape", shape), ("rate", rate)] {
            if !(x.is_finite() && x > 0.0) {
                return Err(Error::malformed(
                    Self::NAME,
                    format!("{} ({}) must be finite and greater than zero", name, x),
                ));
            }
        }
        Ok(Self::new_unchecked(shape, rate))
    }

    #[inline]
    pub fn new_unchecked(shape: f64, rate: f64) -> Self {
        GammaPoisson { shape, rate }
    }

    #[inline]
    pub fn shape(&self) -> f64 {
        self.shape
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn posterior(&self, group: &GammaPoissonGroup) -> (f64, f64) {
        (
            self.shape + group.sum as f64,
            self.rate + f64::from(group.count),
        )
    }
}

fn ln_z(shape: f64, rate: f64) -> f64 {
    ln_gammafn(shape) - shape * rate.ln()
}

/// Negative-binomial posterior predictive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GammaPoissonScorer {
    r: f64,
    ln_p: f64,
    ln_1mp: f64,
    ln_gamma_r: f64,
}

impl Model for GammaPoisson {
    const NAME: &'static str = "gp";

    type Value = u32;
    type Group = GammaPoissonGroup;
    type Scorer = GammaPoissonScorer;
    /// Poisson rate drawn from the posterior
    type Sampler = f64;

    fn load_model(params: &Value) -> Result<Self> {
        let GammaPoisson { shape, rate } = codec::load_params(Self::NAME, params)?;
        Self::new(shape, rate)
    }

    fn examples() -> Vec<Example> {
        vec![
            Example {
                model: json!({"shape": 1.0, "rate": 1.0}),
                values: vec![json!(0), json!(1), json!(2), json!(3), json!(4)],
            },
            Example {
                model: json!({"shape": 2.5, "rate": 0.5}),
                values: vec![json!(3), json!(7), json!(1), json!(0)],
            },
        ]
    }

    fn group_init(&self, group: &mut GammaPoissonGroup) {
        *group = GammaPoissonGroup::default();
    }

    fn group_add_value(&self, group: &mut GammaPoissonGroup, value: &u32) -> Result<()> {
        group.count += 1;
        group.sum += u64::from(*value);
        *group.counts.entry(*value).or_insert(0) += 1;
        Ok(())
    }

    fn group_remove_value(&self, group: &mut GammaPoissonGroup, value: &u32) -> Result<()> {
        match group.counts.get_mut(value) {
            Some(ct) => {
                *ct -= 1;
                if *ct == 0 {
                    group.counts.remove(value);
                }
                group.count -= 1;
                group.sum -= u64::from(*value);
                Ok(())
            }
            None => Err(Error::invalid_removal(format!(
                "no observations of {} to remove",
                value
            ))),
        }
    }

    fn group_merge(&self, dst: &mut GammaPoissonGroup, src: &GammaPoissonGroup) {
        dst.count += src.count;
        dst.sum += src.sum;
        for (&x, &ct) in &src.counts {
            *dst.counts.entry(x).or_insert(0) += ct;
        }
    }

    fn scorer_init(&self, group: &GammaPoissonGroup) -> GammaPoissonScorer {
        let (r, rate) = self.posterior(group);
        // p = 1 / (1 + rate)
        let ln_1p_rate = rate.ln_1p();
        GammaPoissonScorer {
            r,
            ln_p: -ln_1p_rate,
            ln_1mp: rate.ln() - ln_1p_rate,
            ln_gamma_r: ln_gammafn(r),
        }
    }

    fn scorer_eval(&self, scorer: &GammaPoissonScorer, value: &u32) -> Result<f64> {
        let k = f64::from(*value);
        let ln_binom = ln_gammafn(k + scorer.r) - scorer.ln_gamma_r - ln_fact(*value);
        Ok(scorer.r.mul_add(scorer.ln_1mp, k.mul_add(scorer.ln_p, ln_binom)))
    }

    fn sampler_init<R: Rng>(&self, group: &GammaPoissonGroup, rng: &mut R) -> f64 {
        let (shape, rate) = self.posterior(group);
        let gamma = Gamma::new(shape, rate.recip()).expect("posterior parameters are positive");
        rng.sample(gamma)
    }

    fn sampler_eval<R: Rng>(&self, lambda: &f64, rng: &mut R) -> u32 {
        match Poisson::new(*lambda) {
            Ok(poisson) => {
                let x: f64 = rng.sample(poisson);
                x as u32
            }
            Err(_) => 0,
        }
    }

    fn score_group(&self, group: &GammaPoissonGroup) -> f64 {
        let (shape_n, rate_n) = self.posterior(group);
        ln_z(shape_n, rate_n) - ln_z(self.shape, self.rate) - group.log_prod()
    }

    fn validate_group(&self, group: &GammaPoissonGroup) -> Result<()> {
        let (count, sum) = group
            .counts
            .iter()
            .fold((0_u64, 0_u64), |(n, s), (&x, &ct)| {
                (n + u64::from(ct), s + u64::from(ct) * u64::from(x))
            });
        let valid = group.counts.values().all(|&ct| ct > 0)
            && count == u64::from(group.count)
            && sum == group.sum;
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
