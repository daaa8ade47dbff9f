//! Conjugate model variants
pub mod bb;
pub mod dd;
pub mod dpd;
pub mod gp;
pub mod nich;

pub use self::bb::BetaBernoulli;
pub use self::dd::DirichletDiscrete;
pub use self::dpd::DirichletProcessDiscrete;
pub use self::gp::GammaPoisson;
pub use self::nich::NormalInvChiSquared;
