//! Cross-correlation radial velocities.
//!
//! Responsibilities:
//!
//! - read and filter weighted line masks (`mask`)
//! - build the CCF of one spectrum against a mask (`builder`)
//! - fit the CCF profile and propagate the RV error (`extract`)
//! - run the above over every epoch of a time series (`runner`)

pub mod builder;
pub mod extract;
pub mod mask;
pub mod runner;

pub use builder::*;
pub use extract::*;
pub use mask::*;
pub use runner::*;
