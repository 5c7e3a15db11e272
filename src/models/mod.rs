//! VPSD component models (Constant, Lorentz, Harvey) and their composite.
//!
//! Models are implemented as small, pure functions so that fitting and
//! reporting code can stay generic over the component list.

pub mod model;

pub use model::*;
