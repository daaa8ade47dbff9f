//! Dirichlet-Process-Discrete: categorical observations over an open-ended
//! set of categories
//!
//! The base measure is realized by truncated stick-breaking: a finite set of
//! known categories with weights `β_v`, and a remainder `β₀` for everything
//! else. Values outside the known categories are all reported as [`OTHER`].
use crate::codec;
use crate::misc::{ln_gammafn, sample_discrete_log, sample_ln_gamma, sample_stick};
use crate::result::{Error, Result};
use crate::traits::{Example, Model};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// The value standing for any category without an explicit weight
pub const OTHER: u32 = u32::MAX;

const MASS_TOL: f64 = 1E-6;

/// Dirichlet process with concentration `alpha` over a stick-broken base
/// measure drawn with concentration `gamma`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct DirichletProcessDiscrete {
    gamma: f64,
    alpha: f64,
    betas: BTreeMap<u32, f64>,
    beta0: f64,
}

/// Sparse per-category counts
///
/// Categories with a zero count are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirichletProcessDiscreteGroup {
    counts: BTreeMap<u32, u32>,
    other: u32,
    total: u32,
}

impl DirichletProcessDiscreteGroup {
    /// Count of a known category
    pub fn count(&self, value: u32) -> u32 {
        if value == OTHER {
            self.other
        } else {
            self.counts.get(&value).copied().unwrap_or(0)
        }
    }

    /// Count of values reported as [`OTHER`]
    pub fn other(&self) -> u32 {
        self.other
    }

    pub fn n(&self) -> u32 {
        self.total
    }
}

impl DirichletProcessDiscrete {
    /// Create a Dirichlet-Process-Discrete model from explicit base weights
    ///
    /// # Example
    ///
    /// ```
    /// # use conjugate::models::DirichletProcessDiscrete;
    /// let betas = [(0, 0.5), (1, 0.25)].into_iter().collect();
    /// assert!(DirichletProcessDiscrete::new(1.0, 2.0, betas, 0.25).is_ok());
    ///
    /// // The base weights must account for all of the mass
    /// let betas = [(0, 0.5)].into_iter().collect();
    /// assert!(DirichletProcessDiscrete::new(1.0, 2.0, betas, 0.25).is_err());
    /// ```
    pub fn new(gamma: f64, alpha: f64, betas: BTreeMap<u32, f64>, beta0: f64) -> Result<Self> {
        for (name, x) in [("gamma", gamma), ("alpha", alpha), ("beta0", beta0)] {
            if !(x.is_finite() && x > 0.0) {
                return Err(Error::malformed(
                    Self::NAME,
                    format!("{} ({}) must be finite and greater than zero", name, x),
                ));
            }
        }
        if betas.contains_key(&OTHER) {
            return Err(Error::malformed(
                Self::NAME,
                format!("betas may not contain the reserved value {}", OTHER),
            ));
        }
        if let Some((k, b)) = betas.iter().find(|(_, b)| !(b.is_finite() && **b > 0.0)) {
            return Err(Error::malformed(
                Self::NAME,
                format!("betas[{}] ({}) must be finite and greater than zero", k, b),
            ));
        }
        let mass = betas.values().sum::<f64>() + beta0;
        if (mass - 1.0).abs() > MASS_TOL {
            return Err(Error::malformed(
                Self::NAME,
                format!("betas and beta0 sum to {}, not 1", mass),
            ));
        }
        Ok(Self::new_unchecked(gamma, alpha, betas, beta0))
    }

    #[inline]
    pub fn new_unchecked(
        gamma: f64,
        alpha: f64,
        betas: BTreeMap<u32, f64>,
        beta0: f64,
    ) -> Self {
        DirichletProcessDiscrete {
            gamma,
            alpha,
            betas,
            beta0,
        }
    }

    /// Realize the base measure by breaking sticks with concentration
    /// `gamma` until no more than `tol` of the mass is left for [`OTHER`].
    ///
    /// # Example
    ///
    /// ```
    /// # use conjugate::models::DirichletProcessDiscrete;
    /// let mut rng = rand::thread_rng();
    /// let model = DirichletProcessDiscrete::from_stick(1.0, 2.0, 1e-3, &mut rng).unwrap();
    /// assert!(model.beta0() <= 1e-3);
    /// ```
    pub fn from_stick<R: Rng>(gamma: f64, alpha: f64, tol: f64, rng: &mut R) -> Result<Self> {
        let mut sticks = sample_stick(gamma, rng)?;
        let weights = sticks.extend_until(tol)?;
        let betas: BTreeMap<u32, f64> = weights
            .into_iter()
            .filter(|&w| w > 0.0)
            .enumerate()
            .map(|(ix, w)| (ix as u32, w))
            .collect();
        tracing::debug!(
            categories = betas.len(),
            beta0 = sticks.remaining(),
            "realized dpd base measure"
        );
        Self::new(gamma, alpha, betas, sticks.remaining())
    }

    #[inline]
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[inline]
    pub fn betas(&self) -> &BTreeMap<u32, f64> {
        &self.betas
    }

    #[inline]
    pub fn beta0(&self) -> f64 {
        self.beta0
    }

    /// Prior pseudo-count of a category, `α β_v`
    fn prior_count(&self, value: u32) -> Result<f64> {
        if value == OTHER {
            return Ok(self.alpha * self.beta0);
        }
        match self.betas.get(&value) {
            Some(b) => Ok(self.alpha * b),
            None => Err(Error::invalid_value(
                Self::NAME,
                format!("{} is not a known category; use OTHER ({})", value, OTHER),
            )),
        }
    }
}

/// The group's counts and the normalizer of the posterior predictive
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletProcessDiscreteScorer {
    counts: BTreeMap<u32, u32>,
    other: u32,
    ln_z: f64,
}

/// Log category weights drawn from the posterior; [`OTHER`] is the last
/// category
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletProcessDiscreteSampler {
    values: Vec<u32>,
    ln_weights: Vec<f64>,
}

impl Model for DirichletProcessDiscrete {
    const NAME: &'static str = "dpd";

    type Value = u32;
    type Group = DirichletProcessDiscreteGroup;
    type Scorer = DirichletProcessDiscreteScorer;
    type Sampler = DirichletProcessDiscreteSampler;

    fn load_model(params: &Value) -> Result<Self> {
        let DirichletProcessDiscrete {
            gamma,
            alpha,
            betas,
            beta0,
        } = codec::load_params(Self::NAME, params)?;
        Self::new(gamma, alpha, betas, beta0)
    }

    fn examples() -> Vec<Example> {
        vec![Example {
            model: json!({
                "gamma": 0.5,
                "alpha": 2.0,
                "betas": {"0": 0.25, "1": 0.5, "2": 0.125},
                "beta0": 0.125
            }),
            values: vec![
                json!(0),
                json!(1),
                json!(1),
                json!(2),
                json!(OTHER),
                json!(1),
            ],
        }]
    }

    fn group_init(&self, group: &mut DirichletProcessDiscreteGroup) {
        *group = DirichletProcessDiscreteGroup::default();
    }

    fn group_add_value(
        &self,
        group: &mut DirichletProcessDiscreteGroup,
        value: &u32,
    ) -> Result<()> {
        self.prior_count(*value)?;
        if *value == OTHER {
            group.other += 1;
        } else {
            *group.counts.entry(*value).or_insert(0) += 1;
        }
        group.total += 1;
        Ok(())
    }

    fn group_remove_value(
        &self,
        group: &mut DirichletProcessDiscreteGroup,
        value: &u32,
    ) -> Result<()> {
        if *value == OTHER {
            if group.other == 0 {
                return Err(Error::invalid_removal("no OTHER observations to remove"));
            }
            group.other -= 1;
        } else {
            match group.counts.get_mut(value) {
                Some(ct) if *ct > 1 => *ct -= 1,
                Some(_) => {
                    group.counts.remove(value);
                }
                None => {
                    return Err(Error::invalid_removal(format!(
                        "no observations of category {} to remove",
                        value
                    )))
                }
            }
        }
        group.total -= 1;
        Ok(())
    }

    fn group_merge(
        &self,
        dst: &mut DirichletProcessDiscreteGroup,
        src: &DirichletProcessDiscreteGroup,
    ) {
        for (&k, &ct) in src.counts.iter() {
            *dst.counts.entry(k).or_insert(0) += ct;
        }
        dst.other += src.other;
        dst.total += src.total;
    }

    fn scorer_init(&self, group: &DirichletProcessDiscreteGroup) -> DirichletProcessDiscreteScorer {
        DirichletProcessDiscreteScorer {
            counts: group.counts.clone(),
            other: group.other,
            ln_z: (self.alpha + f64::from(group.total)).ln(),
        }
    }

    fn scorer_eval(&self, scorer: &DirichletProcessDiscreteScorer, value: &u32) -> Result<f64> {
        let prior = self.prior_count(*value)?;
        let ct = if *value == OTHER {
            scorer.other
        } else {
            scorer.counts.get(value).copied().unwrap_or(0)
        };
        Ok((prior + f64::from(ct)).ln() - scorer.ln_z)
    }

    fn sampler_init<R: Rng>(
        &self,
        group: &DirichletProcessDiscreteGroup,
        rng: &mut R,
    ) -> DirichletProcessDiscreteSampler {
        let values: Vec<u32> = self.betas.keys().copied().chain([OTHER]).collect();
        // Prior counts are positive so every shape is valid
        let ln_weights = values
            .iter()
            .map(|&v| {
                let shape = self.prior_count(v).unwrap_or(0.0) + f64::from(group.count(v));
                sample_ln_gamma(shape, rng).unwrap_or(f64::NEG_INFINITY)
            })
            .collect();
        DirichletProcessDiscreteSampler { values, ln_weights }
    }

    fn sampler_eval<R: Rng>(&self, sampler: &DirichletProcessDiscreteSampler, rng: &mut R) -> u32 {
        sample_discrete_log(&sampler.ln_weights, rng)
            .ok()
            .and_then(|ix| sampler.values.get(ix).copied())
            .unwrap_or(OTHER)
    }

    fn score_group(&self, group: &DirichletProcessDiscreteGroup) -> f64 {
        let ln_rising = |a: f64, n: u32| ln_gammafn(a + f64::from(n)) - ln_gammafn(a);
        let known: f64 = group
            .counts
            .iter()
            .map(|(&k, &ct)| ln_rising(self.alpha * self.betas.get(&k).copied().unwrap_or(0.0), ct))
            .sum();
        let other = if group.other > 0 {
            ln_rising(self.alpha * self.beta0, group.other)
        } else {
            0.0
        };
        known + other - ln_rising(self.alpha, group.total)
    }

    fn validate_group(&self, group: &DirichletProcessDiscreteGroup) -> Result<()> {
        if let Some(k) = group.counts.keys().find(|k| !self.betas.contains_key(k)) {
            return Err(Error::invalid_value(
                Self::NAME,
                format!("group counts unknown category {}", k),
            ));
        }
        if group.counts.values().any(|&ct| ct == 0) {
            return Err(Error::invalid_value(Self::NAME, "group stores a zero count"));
        }
        let total = group.counts.values().map(|&ct| u64::from(ct)).sum::<u64>()
            + u64::from(group.other);
        if total != u64::from(group.total) {
            return Err(Error::invalid_value(
                Self::NAME,
                format!("group total is {} but its counts sum to {}", group.total, total),
            ));
        }
        Ok(())
    }
}
