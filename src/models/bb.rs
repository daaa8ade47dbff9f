//! Beta-Bernoulli: coin flips with a Beta prior on the success probability
use crate::codec;
use crate::misc::ln_gammafn;
use crate::result::{Error, Result};
use crate::traits::{Example, Model};
use rand::Rng;
use rand_distr::Beta;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Beta(α, β) prior over the success probability of a Bernoulli likelihood
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct BetaBernoulli {
    alpha: f64,
    beta: f64,
}

/// Number of successes and failures observed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetaBernoulliGroup {
    heads: u32,
    tails: u32,
}

impl BetaBernoulliGroup {
    pub fn heads(&self) -> u32 {
        self.heads
    }

    pub fn tails(&self) -> u32 {
        self.tails
    }

    pub fn n(&self) -> u32 {
        self.heads + self.tails
    }
}

impl BetaBernoulli {
    /// Create a new Beta-Bernoulli model
    ///
    /// # Example
    ///
    /// ```
    /// # use conjugate::models::BetaBernoulli;
    /// assert!(BetaBernoulli::new(0.5, 0.5).is_ok());
    /// assert!(BetaBernoulli::new(0.0, 1.0).is_err());
    /// assert!(BetaBernoulli::new(1.0, f64::INFINITY).is_err());
    /// ```
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        for (name, x) in [("alpha", alpha), ("beta", beta)] {
            if !(x.is_finite() && x > 0.0) {
                return Err(Error::malformed(
                    Self::NAME,
                    format!("{} ({}) must be finite and greater than zero", name, x),
                ));
            }
        }
        Ok(Self::new_unchecked(alpha, beta))
    }

    #[inline]
    pub fn new_unchecked(alpha: f64, beta: f64) -> Self {
        BetaBernoulli { alpha, beta }
    }

    /// The uniform prior, Beta(1, 1)
    pub fn uniform() -> Self {
        Self::new_unchecked(1.0, 1.0)
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[inline]
    pub fn beta(&self) -> f64 {
        self.beta
    }

    fn posterior(&self, group: &BetaBernoulliGroup) -> (f64, f64) {
        (
            self.alpha + f64::from(group.heads),
            self.beta + f64::from(group.tails),
        )
    }
}

impl Default for BetaBernoulli {
    fn default() -> Self {
        Self::uniform()
    }
}

/// ln p(true) and ln p(false) under the posterior predictive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaBernoulliScorer {
    ln_heads: f64,
    ln_tails: f64,
}

impl Model for BetaBernoulli {
    const NAME: &'static str = "bb";

    type Value = bool;
    type Group = BetaBernoulliGroup;
    type Scorer = BetaBernoulliScorer;
    type Sampler = f64;

    fn load_model(params: &Value) -> Result<Self> {
        let BetaBernoulli { alpha, beta } = codec::load_params(Self::NAME, params)?;
        Self::new(alpha, beta)
    }

    fn examples() -> Vec<Example> {
        vec![
            Example {
                model: json!({"alpha": 0.5, "beta": 2.0}),
                values: vec![json!(false), json!(false), json!(true), json!(false)],
            },
            Example {
                model: json!({"alpha": 1.0, "beta": 1.0}),
                values: vec![json!(true), json!(true), json!(false), json!(true), json!(true)],
            },
        ]
    }

    fn group_init(&self, group: &mut BetaBernoulliGroup) {
        group.heads = 0;
        group.tails = 0;
    }

    fn group_add_value(&self, group: &mut BetaBernoulliGroup, value: &bool) -> Result<()> {
        if *value {
            group.heads += 1;
        } else {
            group.tails += 1;
        }
        Ok(())
    }

    fn group_remove_value(&self, group: &mut BetaBernoulliGroup, value: &bool) -> Result<()> {
        let ct = if *value {
            &mut group.heads
        } else {
            &mut group.tails
        };
        if *ct == 0 {
            return Err(Error::invalid_removal(format!(
                "no `{}` observations to remove",
                value
            )));
        }
        *ct -= 1;
        Ok(())
    }

    fn group_merge(&self, dst: &mut BetaBernoulliGroup, src: &BetaBernoulliGroup) {
        dst.heads += src.heads;
        dst.tails += src.tails;
    }

    fn scorer_init(&self, group: &BetaBernoulliGroup) -> BetaBernoulliScorer {
        let (a, b) = self.posterior(group);
        let ln_z = (a + b).ln();
        BetaBernoulliScorer {
            ln_heads: a.ln() - ln_z,
            ln_tails: b.ln() - ln_z,
        }
    }

    fn scorer_eval(&self, scorer: &BetaBernoulliScorer, value: &bool) -> Result<f64> {
        Ok(if *value {
            scorer.ln_heads
        } else {
            scorer.ln_tails
        })
    }

    fn sampler_init<R: Rng>(&self, group: &BetaBernoulliGroup, rng: &mut R) -> f64 {
        let (a, b) = self.posterior(group);
        let beta = Beta::new(a, b).expect("posterior parameters are positive");
        rng.sample(beta)
    }

    fn sampler_eval<R: Rng>(&self, p: &f64, rng: &mut R) -> bool {
        rng.gen::<f64>() < *p
    }

    fn score_group(&self, group: &BetaBernoulliGroup) -> f64 {
        let (a, b) = self.posterior(group);
        let ln_beta = |a: f64, b: f64| ln_gammafn(a) + ln_gammafn(b) - ln_gammafn(a + b);
        ln_beta(a, b) - ln_beta(self.alpha, self.beta)
    }
}
