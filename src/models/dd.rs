//! Dirichlet-Discrete: categorical observations over a fixed number of
//! categories with a Dirichlet prior on the category weights
use crate::codec;
use crate::misc::{ln_gammafn, sample_discrete_log, sample_ln_gamma};
use crate::result::{Error, Result};
use crate::traits::{Example, Model};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Dirichlet(α₁, ..., αₖ) prior over the weights of a k-category likelihood
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct DirichletDiscrete {
    alphas: Vec<f64>,
}

/// Per-category observation counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirichletDiscreteGroup {
    counts: Vec<u32>,
}

impl DirichletDiscreteGroup {
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn n(&self) -> u32 {
        self.counts.iter().sum()
    }
}

impl DirichletDiscrete {
    /// Create a new Dirichlet-Discrete model
    ///
    /// # Example
    ///
    /// ```
    /// # use conjugate::models::DirichletDiscrete;
    /// assert!(DirichletDiscrete::new(vec![0.5, 1.0, 2.0]).is_ok());
    /// assert!(DirichletDiscrete::new(vec![]).is_err());
    /// assert!(DirichletDiscrete::new(vec![1.0, 0.0]).is_err());
    /// ```
    pub fn new(alphas: Vec<f64>) -> Result<Self> {
        if alphas.is_empty() {
            return Err(Error::malformed(Self::NAME, "alphas must not be empty"));
        }
        if let Some((ix, a)) = alphas
            .iter()
            .enumerate()
            .find(|(_, a)| !(a.is_finite() && **a > 0.0))
        {
            return Err(Error::malformed(
                Self::NAME,
                format!("alphas[{}] ({}) must be finite and greater than zero", ix, a),
            ));
        }
        Ok(Self::new_unchecked(alphas))
    }

    #[inline]
    pub fn new_unchecked(alphas: Vec<f64>) -> Self {
        DirichletDiscrete { alphas }
    }

    /// Symmetric prior with every α equal to `alpha`
    pub fn symmetric(alpha: f64, dim: usize) -> Result<Self> {
        Self::new(vec![alpha; dim])
    }

    #[inline]
    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    /// Number of categories
    #[inline]
    pub fn dim(&self) -> usize {
        self.alphas.len()
    }

    fn check_value(&self, value: usize) -> Result<()> {
        if value < self.dim() {
            Ok(())
        } else {
            Err(Error::invalid_value(
                Self::NAME,
                format!("category {} out of range for {} categories", value, self.dim()),
            ))
        }
    }

    fn posterior(&self, group: &DirichletDiscreteGroup) -> Vec<f64> {
        self.alphas
            .iter()
            .zip(group.counts.iter())
            .map(|(a, &c)| a + f64::from(c))
            .collect()
    }
}

/// Log of the posterior predictive weights
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletDiscreteScorer {
    ln_weights: Vec<f64>,
}

/// Log category weights drawn from the posterior
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletDiscreteSampler {
    ln_weights: Vec<f64>,
}

impl Model for DirichletDiscrete {
    const NAME: &'static str = "dd";

    type Value = usize;
    type Group = DirichletDiscreteGroup;
    type Scorer = DirichletDiscreteScorer;
    type Sampler = DirichletDiscreteSampler;

    fn load_model(params: &Value) -> Result<Self> {
        let DirichletDiscrete { alphas } = codec::load_params(Self::NAME, params)?;
        Self::new(alphas)
    }

    fn examples() -> Vec<Example> {
        vec![
            Example {
                model: json!({"alphas": [0.5, 0.5, 0.5, 0.5]}),
                values: vec![json!(0), json!(1), json!(1), json!(3), json!(0)],
            },
            Example {
                model: json!({"alphas": [1.0, 2.0, 3.0]}),
                values: vec![json!(2), json!(2), json!(1)],
            },
        ]
    }

    fn group_init(&self, group: &mut DirichletDiscreteGroup) {
        group.counts.clear();
        group.counts.resize(self.dim(), 0);
    }

    fn group_add_value(&self, group: &mut DirichletDiscreteGroup, value: &usize) -> Result<()> {
        self.check_value(*value)?;
        match group.counts.get_mut(*value) {
            Some(ct) => {
                *ct += 1;
                Ok(())
            }
            None => Err(Error::invalid_value(
                Self::NAME,
                format!("group has {} categories", group.counts.len()),
            )),
        }
    }

    fn group_remove_value(
        &self,
        group: &mut DirichletDiscreteGroup,
        value: &usize,
    ) -> Result<()> {
        match group.counts.get_mut(*value) {
            Some(ct) if *ct > 0 => {
                *ct -= 1;
                Ok(())
            }
            _ => Err(Error::invalid_removal(format!(
                "no observations of category {} to remove",
                value
            ))),
        }
    }

    fn group_merge(&self, dst: &mut DirichletDiscreteGroup, src: &DirichletDiscreteGroup) {
        debug_assert_eq!(dst.counts.len(), src.counts.len());
        dst.counts
            .iter_mut()
            .zip(src.counts.iter())
            .for_each(|(d, s)| *d += s);
    }

    fn scorer_init(&self, group: &DirichletDiscreteGroup) -> DirichletDiscreteScorer {
        let post = self.posterior(group);
        let ln_z = post.iter().sum::<f64>().ln();
        DirichletDiscreteScorer {
            ln_weights: post.iter().map(|a| a.ln() - ln_z).collect(),
        }
    }

    fn scorer_eval(&self, scorer: &DirichletDiscreteScorer, value: &usize) -> Result<f64> {
        self.check_value(*value)?;
        scorer.ln_weights.get(*value).copied().ok_or_else(|| {
            Error::invalid_value(Self::NAME, "scorer was built from a malformed group")
        })
    }

    fn sampler_init<R: Rng>(
        &self,
        group: &DirichletDiscreteGroup,
        rng: &mut R,
    ) -> DirichletDiscreteSampler {
        // Normalized gamma draws are a Dirichlet draw. Posterior alphas are
        // positive so the draw cannot fail.
        let ln_weights = self
            .posterior(group)
            .iter()
            .map(|&a| sample_ln_gamma(a, rng).unwrap_or(f64::NEG_INFINITY))
            .collect();
        DirichletDiscreteSampler { ln_weights }
    }

    fn sampler_eval<R: Rng>(&self, sampler: &DirichletDiscreteSampler, rng: &mut R) -> usize {
        sample_discrete_log(&sampler.ln_weights, rng).unwrap_or(0)
    }

    fn score_group(&self, group: &DirichletDiscreteGroup) -> f64 {
        debug_assert_eq!(group.counts.len(), self.dim());
        let mut alpha_sum = 0.0;
        let mut n = 0.0;
        let mut score = 0.0;
        for (&a, &c) in self.alphas.iter().zip(group.counts.iter()) {
            let c = f64::from(c);
            alpha_sum += a;
            n += c;
            score += ln_gammafn(a + c) - ln_gammafn(a);
        }
        score + ln_gammafn(alpha_sum) - ln_gammafn(alpha_sum + n)
    }

    fn validate_group(&self, group: &DirichletDiscreteGroup) -> Result<()> {
        if group.counts.len() == self.dim() {
            Ok(())
        } else {
            Err(Error::invalid_value(
                Self::NAME,
                format!(
                    "group has {} categories but the model has {}",
                    group.counts.len(),
                    self.dim()
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::misc::multinomial_goodness_of_fit;
    use crate::test_model;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    const TOL: f64 = 1E-12;

    test_model!(DirichletDiscrete, exact);

    #[test]
    fn group_init_sizes_counts() {
        let model = DirichletDiscrete::symmetric(1.0, 4).unwrap();
        assert_eq!(model.group().counts(), &[0, 0, 0, 0]);
    }

    #[test]
    fn score_value_is_normalized_posterior() {
        let model = DirichletDiscrete::new(vec![1.0, 2.0, 3.0]).unwrap();
        let mut group = model.group();
        model.group_add_value(&mut group, &0).unwrap();
        model.group_add_value(&mut group, &0).unwrap();
        // (1 + 2) / (6 + 2)
        assert::close(model.score_value(&group, &0).unwrap(), (3.0_f64 / 8.0).ln(), TOL);

        let total: f64 = (0..3)
            .map(|k| model.score_value(&group, &k).unwrap().exp())
            .sum();
        assert::close(total, 1.0, TOL);
    }

    #[test]
    fn score_group_two_categories_matches_beta_bernoulli() {
        use crate::models::BetaBernoulli;
        let dd = DirichletDiscrete::new(vec![0.7, 1.9]).unwrap();
        let bb = BetaBernoulli::new(0.7, 1.9).unwrap();
        let mut g_dd = dd.group();
        let mut g_bb = bb.group();
        for x in [0, 1, 1, 0, 0, 1, 1] {
            dd.group_add_value(&mut g_dd, &x).unwrap();
            bb.group_add_value(&mut g_bb, &(x == 0)).unwrap();
        }
        assert::close(dd.score_group(&g_dd), bb.score_group(&g_bb), 1E-10);
    }

    #[test]
    fn out_of_range_value() {
        let model = DirichletDiscrete::symmetric(1.0, 3).unwrap();
        let mut group = model.group();
        let err = model.group_add_value(&mut group, &3).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { model: "dd", .. }));
        assert!(model.score_value(&group, &7).is_err());
        assert!(model.group_remove_value(&mut group, &3).unwrap_err().is_invalid_removal());
    }

    #[test]
    fn load_group_checks_dimension() {
        let model = DirichletDiscrete::symmetric(1.0, 3).unwrap();
        assert!(model.load_group(&json!({"counts": [1, 2]})).is_err());
        let group = model.load_group(&json!({"counts": [1, 2, 0]})).unwrap();
        assert_eq!(group.n(), 3);
    }

    #[test]
    fn load_model_rejects_bad_params() {
        for params in [
            json!({"alphas": []}),
            json!({"alphas": [1.0, -0.5]}),
            json!({"alphas": 1.0}),
            json!({}),
            json!([[1.0, 1.0]]),
        ] {
            let err = DirichletDiscrete::load_model(&params).unwrap_err();
            assert!(err.is_malformed_parameters(), "{}", params);
        }
    }

    #[test]
    fn sample_value_goodness_of_fit() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0xDD);
        let model = DirichletDiscrete::new(vec![0.5, 1.0, 2.0, 4.0]).unwrap();
        let mut group = model.group();
        for x in [3, 3, 0, 2] {
            model.group_add_value(&mut group, &x).unwrap();
        }
        let probs: Vec<f64> = (0..4)
            .map(|k| model.score_value(&group, &k).unwrap().exp())
            .collect();
        let n = 20_000;
        let mut counts = vec![0_usize; 4];
        for _ in 0..n {
            counts[model.sample_value(&group, &mut rng)] += 1;
        }
        assert!(multinomial_goodness_of_fit(&probs, &counts, n).unwrap() > 1e-3);
    }
}
