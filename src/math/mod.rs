//! Numeric helpers: link functions (cdf / survival / probit).

pub mod link;

pub use link::*;
