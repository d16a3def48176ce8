//! Concrete projections.

pub mod idp_template;

use crate::handler::{Projection, ReduceError};

/// Every projection this crate ships, ready to hand to the runtime.
pub fn all() -> Result<Vec<Projection>, ReduceError> {
    Ok(vec![idp_template::projection()?])
}
