//! The model/group sufficient-statistic protocol
use crate::codec;
use crate::result::{Error, Result};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

/// A worked example for a model: a valid parameter mapping and a sequence of
/// values the model accepts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub model: Value,
    pub values: Vec<Value>,
}

impl Example {
    /// Load the example's model and decode its values
    pub fn decode<M: Model>(&self) -> Result<(M, Vec<M::Value>)> {
        let model = M::load_model(&self.model)?;
        let values = self
            .values
            .iter()
            .map(|x| {
                M::Value::deserialize(x)
                    .map_err(|err| Error::invalid_value(M::NAME, err.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((model, values))
    }
}

/// A conjugate model: an immutable bundle of hyperparameters together with
/// the math that maps a group's sufficient statistics to predictive scores
/// and samples.
///
/// A model is shared read-only by any number of groups. Groups are plain
/// values owned by the caller and are only mutated through the model.
///
/// # Example
///
/// ```
/// use conjugate::models::BetaBernoulli;
/// use conjugate::traits::Model;
///
/// let model = BetaBernoulli::new(1.0, 1.0).unwrap();
/// let mut group = model.group();
///
/// let flips = [true, false, false];
/// let mut chain = 0.0;
/// for x in &flips {
///     chain += model.score_value(&group, x).unwrap();
///     model.group_add_value(&mut group, x).unwrap();
/// }
///
/// // p(x1, x2, x3) = p(x1) p(x2 | x1) p(x3 | x1, x2)
/// assert!((model.score_group(&group) - chain).abs() < 1e-12);
/// ```
pub trait Model:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync
{
    /// Name under which the model is registered
    const NAME: &'static str;

    /// The type of an observation
    type Value: Clone + Debug + PartialEq + Serialize + DeserializeOwned;
    /// Sufficient statistics for a collection of observations
    type Group: Clone + Debug + Default + PartialEq + Serialize + DeserializeOwned + Send + 'static;
    /// Posterior predictive quantities cached for scoring many values
    type Scorer;
    /// A posterior draw of the likelihood parameters
    type Sampler;

    /// Build a model from a hyperparameter mapping, validating every entry.
    fn load_model(params: &Value) -> Result<Self>;

    /// Project the hyperparameters back into a mapping
    fn dump_model(&self) -> Result<Value> {
        codec::dump(self)
    }

    /// Worked examples for documentation and testing; never empty.
    fn examples() -> Vec<Example>;

    /// Create a group for this model and initialize it.
    fn group(&self) -> Self::Group {
        let mut group = Self::Group::default();
        self.group_init(&mut group);
        group
    }

    /// Reset `group` to hold no observations
    fn group_init(&self, group: &mut Self::Group);

    /// Incorporate `value` into the group's statistics
    fn group_add_value(&self, group: &mut Self::Group, value: &Self::Value) -> Result<()>;

    /// Remove one prior occurrence of `value` from the group.
    ///
    /// Fails with [`Error::InvalidRemoval`] and leaves the group untouched when
    /// the value cannot have been added.
    fn group_remove_value(
        &self,
        group: &mut Self::Group,
        value: &Self::Value,
    ) -> Result<()>;

    /// Fold the statistics of `src` into `dst`. `src` is left unchanged.
    fn group_merge(&self, dst: &mut Self::Group, src: &Self::Group);

    /// Precompute the posterior predictive for `group`
    fn scorer_init(&self, group: &Self::Group) -> Self::Scorer;

    fn scorer_eval(&self, scorer: &Self::Scorer, value: &Self::Value) -> Result<f64>;

    /// Log posterior predictive, `ln p(value | group, hyperparameters)`
    fn score_value(&self, group: &Self::Group, value: &Self::Value) -> Result<f64> {
        let scorer = self.scorer_init(group);
        self.scorer_eval(&scorer, value)
    }

    /// Draw the likelihood parameters from the posterior given `group`
    fn sampler_init<R: Rng>(&self, group: &Self::Group, rng: &mut R) -> Self::Sampler;

    fn sampler_eval<R: Rng>(&self, sampler: &Self::Sampler, rng: &mut R) -> Self::Value;

    /// Draw a value from the posterior predictive scored by `score_value`
    fn sample_value<R: Rng>(&self, group: &Self::Group, rng: &mut R) -> Self::Value {
        let sampler = self.sampler_init(group, rng);
        self.sampler_eval(&sampler, rng)
    }

    /// Log marginal likelihood of the values that produced `group`.
    ///
    /// Equals the sum of `score_value` taken before each `group_add_value`
    /// when the values are replayed into an empty group.
    fn score_group(&self, group: &Self::Group) -> f64;

    /// Draw `size` values from the prior predictive.
    ///
    /// The likelihood parameters are drawn once from the prior and the values
    /// are drawn i.i.d. given them, so the values are exchangeable draws from
    /// the marginal.
    fn sample_group<R: Rng>(&self, size: usize, rng: &mut R) -> Vec<Self::Value> {
        let sampler = self.sampler_init(&self.group(), rng);
        (0..size).map(|_| self.sampler_eval(&sampler, rng)).collect()
    }

    /// Check that a deserialized group is consistent with this model
    fn validate_group(&self, _group: &Self::Group) -> Result<()> {
        Ok(())
    }

    fn dump_group(group: &Self::Group) -> Result<Value> {
        codec::dump(group)
    }

    fn load_group(&self, dump: &Value) -> Result<Self::Group> {
        let group: Self::Group = codec::load(dump)?;
        self.validate_group(&group)?;
        Ok(group)
    }
}
