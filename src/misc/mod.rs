//! Numerically-stable sampling, normalization, and goodness-of-fit utilities
mod bins;
mod func;
mod stick;
mod x2;

pub use bins::bin_samples;
pub use func::*;
pub use stick::{sample_stick, StickSequence};
pub use x2::{
    density_goodness_of_fit, discrete_goodness_of_fit,
    multinomial_goodness_of_fit, multinomial_goodness_of_fit_truncated,
    unif01_goodness_of_fit,
};
