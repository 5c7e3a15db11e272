//! Input/output helpers.
//!
//! - spectra JSON read/write (`spectra`)
//! - RV series CSV read/write (`series`)
//! - initial component lists (`components`)
//! - JSON/CSV result exports (`export`)
//!
//! Line mask CSVs are read by `ccf::mask`.

pub mod components;
pub mod export;
pub mod series;
pub mod spectra;

pub use components::*;
pub use export::*;
pub use series::*;
pub use spectra::*;
