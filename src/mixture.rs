//! A collection of groups sharing one model
use crate::result::{Error, Result};
use crate::traits::Model;

/// Groups under a single model, each with a cached scorer.
///
/// This is the bookkeeping an outer clustering sampler needs to score a
/// value against every group at once. Scorers are refreshed whenever their
/// group changes, so scoring never recomputes a posterior. Bulk loads can use
/// the `lazy_*` updates and a single [`Mixture::refresh`] afterwards.
///
/// # Example
///
/// ```
/// use conjugate::mixture::Mixture;
/// use conjugate::misc::sample_discrete_log;
/// use conjugate::models::BetaBernoulli;
///
/// let model = BetaBernoulli::new(1.0, 1.0).unwrap();
/// let mut mixture = Mixture::new(&model, 2);
/// mixture.add_value(0, &true).unwrap();
/// mixture.add_value(1, &false).unwrap();
///
/// let scores = mixture.scores(&true).unwrap();
/// assert!(scores[0] > scores[1]);
///
/// let mut rng = rand::thread_rng();
/// let k = sample_discrete_log(&scores, &mut rng).unwrap();
/// mixture.add_value(k, &true).unwrap();
/// ```
pub struct Mixture<'m, M: Model> {
    model: &'m M,
    groups: Vec<M::Group>,
    scorers: Vec<M::Scorer>,
    stale: Vec<bool>,
}

impl<'m, M: Model> Mixture<'m, M> {
    /// `group_count` empty groups
    pub fn new(model: &'m M, group_count: usize) -> Self {
        let groups: Vec<M::Group> = (0..group_count).map(|_| model.group()).collect();
        let scorers = groups.iter().map(|g| model.scorer_init(g)).collect();
        Mixture {
            model,
            groups,
            scorers,
            stale: vec![false; group_count],
        }
    }

    pub fn model(&self) -> &M {
        self.model
    }

    pub fn groups(&self) -> &[M::Group] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn check_id(&self, groupid: usize) -> Result<()> {
        if groupid < self.groups.len() {
            Ok(())
        } else {
            Err(Error::InvalidArgument(format!(
                "group {} out of range for a mixture of {}",
                groupid,
                self.groups.len()
            )))
        }
    }

    fn refresh_group(&mut self, groupid: usize) {
        self.scorers[groupid] = self.model.scorer_init(&self.groups[groupid]);
        self.stale[groupid] = false;
    }

    /// Rebuild the scorers of groups changed by `lazy_*` updates
    pub fn refresh(&mut self) {
        for groupid in 0..self.groups.len() {
            if self.stale[groupid] {
                self.refresh_group(groupid);
            }
        }
    }

    /// Whether any group awaits [`Mixture::refresh`]
    pub fn is_stale(&self) -> bool {
        self.stale.iter().any(|&s| s)
    }

    /// Append an empty group and return its id
    pub fn add_group(&mut self) -> usize {
        let group = self.model.group();
        self.scorers.push(self.model.scorer_init(&group));
        self.groups.push(group);
        self.stale.push(false);
        self.groups.len() - 1
    }

    /// Remove a group by moving the last group into its place.
    ///
    /// Returns the removed group. The group that was last now has id
    /// `groupid`.
    pub fn remove_group(&mut self, groupid: usize) -> Result<M::Group> {
        self.check_id(groupid)?;
        self.scorers.swap_remove(groupid);
        self.stale.swap_remove(groupid);
        Ok(self.groups.swap_remove(groupid))
    }

    pub fn add_value(&mut self, groupid: usize, value: &M::Value) -> Result<()> {
        self.lazy_add_value(groupid, value)?;
        self.refresh_group(groupid);
        Ok(())
    }

    pub fn remove_value(&mut self, groupid: usize, value: &M::Value) -> Result<()> {
        self.lazy_remove_value(groupid, value)?;
        self.refresh_group(groupid);
        Ok(())
    }

    /// Add a value without rebuilding the group's scorer
    pub fn lazy_add_value(&mut self, groupid: usize, value: &M::Value) -> Result<()> {
        self.check_id(groupid)?;
        self.model.group_add_value(&mut self.groups[groupid], value)?;
        self.stale[groupid] = true;
        Ok(())
    }

    /// Remove a value without rebuilding the group's scorer
    pub fn lazy_remove_value(&mut self, groupid: usize, value: &M::Value) -> Result<()> {
        self.check_id(groupid)?;
        self.model
            .group_remove_value(&mut self.groups[groupid], value)?;
        self.stale[groupid] = true;
        Ok(())
    }

    /// Add each group's predictive score for `value` to `scores_accum`.
    ///
    /// Fails while lazily updated groups await [`Mixture::refresh`].
    pub fn score_value(&self, value: &M::Value, scores_accum: &mut [f64]) -> Result<()> {
        if let Some(groupid) = self.stale.iter().position(|&s| s) {
            return Err(Error::InvalidArgument(format!(
                "group {} changed since the last refresh",
                groupid
            )));
        }
        if scores_accum.len() != self.groups.len() {
            return Err(Error::InvalidArgument(format!(
                "{} scores for {} groups",
                scores_accum.len(),
                self.groups.len()
            )));
        }
        for (acc, scorer) in scores_accum.iter_mut().zip(self.scorers.iter()) {
            *acc += self.model.scorer_eval(scorer, value)?;
        }
        Ok(())
    }

    /// Each group's predictive score for `value`
    pub fn scores(&self, value: &M::Value) -> Result<Vec<f64>> {
        let mut scores = vec![0.0; self.groups.len()];
        self.score_value(value, &mut scores)?;
        Ok(scores)
    }

    /// Sum of every group's marginal likelihood
    pub fn score_mixture(&self) -> f64 {
        self.groups.iter().map(|g| self.model.score_group(g)).sum()
    }
}
