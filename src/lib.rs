//! Incremental Bayesian sufficient statistics for conjugate models
//!
//! A [`Model`](traits::Model) holds hyperparameters; its `Group` accumulates
//! the sufficient statistics of the values added to it and supports
//! removal, merging, predictive scoring and sampling, and marginal
//! likelihoods. Models are looked up by name through a
//! [`Registry`](registry::Registry).
pub mod codec;
pub mod consts;
pub mod misc;
pub mod mixture;
pub mod models;
pub mod prelude;
pub mod registry;
mod result;
pub mod traits;


pub use result::{Error, Result};
