//! Mathematical utilities: Doppler shift, line profile, numeric helpers and
//! (non)linear least squares.

pub mod doppler;
pub mod lm;
pub mod numeric;
pub mod ols;
pub mod profile;

pub use doppler::*;
pub use lm::*;
pub use numeric::*;
pub use ols::*;
pub use profile::*;
