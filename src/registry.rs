//! Name-keyed lookup of model variants
//!
//! The registry lets a caller that only knows a variant's name and a
//! hyperparameter mapping drive the full model protocol. Values cross the
//! boundary as `serde_json::Value` and groups as opaque [`AnyGroup`]s.
use crate::codec;
use crate::models::{
    BetaBernoulli, DirichletDiscrete, DirichletProcessDiscrete, GammaPoisson,
    NormalInvChiSquared,
};
use crate::result::{Error, Result};
use crate::traits::{Example, Model};
use rand::RngCore;
use serde::Deserialize;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

/// A group whose concrete type is known only to the model that made it
pub struct AnyGroup {
    model: &'static str,
    inner: Box<dyn Any + Send>,
}

impl AnyGroup {
    /// Name of the model that created the group
    pub fn model(&self) -> &'static str {
        self.model
    }

    /// Borrow the concrete group, if it belongs to `M`
    pub fn downcast_ref<M: Model + 'static>(&self) -> Option<&M::Group> {
        self.inner.downcast_ref::<M::Group>()
    }
}

impl fmt::Debug for AnyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyGroup")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Object-safe mirror of [`Model`]
pub trait DynModel: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;
    fn dump_model(&self) -> Result<Value>;
    fn group(&self) -> AnyGroup;
    fn group_init(&self, group: &mut AnyGroup) -> Result<()>;
    fn group_add_value(&self, group: &mut AnyGroup, value: &Value) -> Result<()>;
    fn group_remove_value(&self, group: &mut AnyGroup, value: &Value) -> Result<()>;
    fn group_merge(&self, dst: &mut AnyGroup, src: &AnyGroup) -> Result<()>;
    fn score_value(&self, group: &AnyGroup, value: &Value) -> Result<f64>;
    fn sample_value(&self, group: &AnyGroup, rng: &mut dyn RngCore) -> Result<Value>;
    fn score_group(&self, group: &AnyGroup) -> Result<f64>;
    fn sample_group(&self, size: usize, rng: &mut dyn RngCore) -> Result<Vec<Value>>;
    fn dump_group(&self, group: &AnyGroup) -> Result<Value>;
    fn load_group(&self, dump: &Value) -> Result<AnyGroup>;
}

fn wrap<M: Model + 'static>(group: M::Group) -> AnyGroup {
    AnyGroup {
        model: M::NAME,
        inner: Box::new(group),
    }
}

fn mismatch<M: Model>(group: &AnyGroup) -> Error {
    Error::GroupMismatch {
        expected: M::NAME,
        found: group.model,
    }
}

fn group_ref<M: Model + 'static>(group: &AnyGroup) -> Result<&M::Group> {
    group
        .inner
        .downcast_ref::<M::Group>()
        .ok_or_else(|| mismatch::<M>(group))
}

fn group_mut<M: Model + 'static>(group: &mut AnyGroup) -> Result<&mut M::Group> {
    let err = mismatch::<M>(group);
    group.inner.downcast_mut::<M::Group>().ok_or(err)
}

fn decode<M: Model>(value: &Value) -> Result<M::Value> {
    M::Value::deserialize(value).map_err(|err| Error::invalid_value(M::NAME, err.to_string()))
}

impl<M: Model + 'static> DynModel for M {
    fn name(&self) -> &'static str {
        M::NAME
    }

    fn dump_model(&self) -> Result<Value> {
        <M as Model>::dump_model(self)
    }

    fn group(&self) -> AnyGroup {
        wrap::<M>(<M as Model>::group(self))
    }

    fn group_init(&self, group: &mut AnyGroup) -> Result<()> {
        <M as Model>::group_init(self, group_mut::<M>(group)?);
        Ok(())
    }

    fn group_add_value(&self, group: &mut AnyGroup, value: &Value) -> Result<()> {
        let x = decode::<M>(value)?;
        <M as Model>::group_add_value(self, group_mut::<M>(group)?, &x)
    }

    fn group_remove_value(&self, group: &mut AnyGroup, value: &Value) -> Result<()> {
        let x = decode::<M>(value)?;
        <M as Model>::group_remove_value(self, group_mut::<M>(group)?, &x)
    }

    fn group_merge(&self, dst: &mut AnyGroup, src: &AnyGroup) -> Result<()> {
        let src = group_ref::<M>(src)?;
        <M as Model>::validate_group(self, src)?;
        let dst = group_mut::<M>(dst)?;
        <M as Model>::validate_group(self, dst)?;
        <M as Model>::group_merge(self, dst, src);
        Ok(())
    }

    fn score_value(&self, group: &AnyGroup, value: &Value) -> Result<f64> {
        let x = decode::<M>(value)?;
        <M as Model>::score_value(self, group_ref::<M>(group)?, &x)
    }

    fn sample_value(&self, group: &AnyGroup, mut rng: &mut dyn RngCore) -> Result<Value> {
        let x = <M as Model>::sample_value(self, group_ref::<M>(group)?, &mut rng);
        codec::dump(&x)
    }

    fn score_group(&self, group: &AnyGroup) -> Result<f64> {
        let group = group_ref::<M>(group)?;
        <M as Model>::validate_group(self, group)?;
        Ok(<M as Model>::score_group(self, group))
    }

    fn sample_group(&self, size: usize, mut rng: &mut dyn RngCore) -> Result<Vec<Value>> {
        <M as Model>::sample_group(self, size, &mut rng)
            .iter()
            .map(codec::dump)
            .collect()
    }

    fn dump_group(&self, group: &AnyGroup) -> Result<Value> {
        <M as Model>::dump_group(group_ref::<M>(group)?)
    }

    fn load_group(&self, dump: &Value) -> Result<AnyGroup> {
        Ok(wrap::<M>(<M as Model>::load_group(self, dump)?))
    }
}

type LoadFn = fn(&Value) -> Result<Box<dyn DynModel>>;

#[derive(Clone, Copy)]
struct Entry {
    load: LoadFn,
    examples: fn() -> Vec<Example>,
}

fn load_boxed<M: Model + 'static>(params: &Value) -> Result<Box<dyn DynModel>> {
    Ok(Box::new(M::load_model(params)?))
}

/// Variant name → model factory
///
/// # Example
///
/// ```
/// use conjugate::registry::Registry;
/// use serde_json::json;
///
/// let registry = Registry::builtin();
/// let model = registry.load_model("bb", &json!({"alpha": 1.0, "beta": 1.0})).unwrap();
///
/// let mut group = model.group();
/// model.group_add_value(&mut group, &json!(true)).unwrap();
/// let score = model.score_value(&group, &json!(true)).unwrap();
/// assert!((score - (2.0_f64 / 3.0).ln()).abs() < 1e-12);
///
/// assert!(registry.load_model("nope", &json!({})).is_err());
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    entries: BTreeMap<&'static str, Entry>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every variant in [`crate::models`]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register::<BetaBernoulli>()
            .register::<DirichletDiscrete>()
            .register::<DirichletProcessDiscrete>()
            .register::<GammaPoisson>()
            .register::<NormalInvChiSquared>();
        registry
    }

    /// Register `M` under `M::NAME`, replacing any earlier registration
    pub fn register<M: Model + 'static>(&mut self) -> &mut Self {
        let entry = Entry {
            load: load_boxed::<M>,
            examples: M::examples,
        };
        if self.entries.insert(M::NAME, entry).is_some() {
            tracing::warn!(model = M::NAME, "replacing registered model");
        } else {
            tracing::debug!(model = M::NAME, "registered model");
        }
        self
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn entry(&self, name: &str) -> Result<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::UnknownModel(name.to_owned()))
    }

    /// Worked examples for the variant called `name`
    pub fn examples(&self, name: &str) -> Result<Vec<Example>> {
        Ok((self.entry(name)?.examples)())
    }

    /// Build the variant called `name` from its hyperparameters
    pub fn load_model(&self, name: &str, params: &Value) -> Result<Box<dyn DynModel>> {
        let entry = self.entry(name)?;
        tracing::debug!(model = name, "loading model");
        (entry.load)(params)
    }
}
