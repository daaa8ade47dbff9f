//! Re-imports for convenience
#[doc(no_inline)]
pub use crate::mixture::Mixture;
#[doc(no_inline)]
pub use crate::models::*;
#[doc(no_inline)]
pub use crate::registry::Registry;
#[doc(no_inline)]
pub use crate::traits::{Example, Model};
#[doc(no_inline)]
pub use crate::{Error, Result};
