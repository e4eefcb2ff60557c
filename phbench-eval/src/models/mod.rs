//! Phonon data model
//!
//! - [`PhononDos`]: density of states with interpolation, MAE, R² and peak search
//! - [`BandStructure`]: branch frequencies along a q-point path
//! - [`PhononDocument`]: one material computed by one source

pub mod band_structure;
pub mod document;
pub mod dos;

pub use band_structure::{BandStructure, HighSymmetryPoint};
pub use document::{is_valid_formula, validate_material_id, DerivedFlags, PhononDocument};
pub use dos::PhononDos;
