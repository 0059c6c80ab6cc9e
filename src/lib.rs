//! Synchrotron-radiation event generator: lattice model, orbit/twiss
//! steppers, and a beam-profile photon generator driving a tabulated
//! spectrum sampler.

#[macro_use]
extern crate error_chain;

#[cfg(not(feature = "single"))]
pub type Float = f64;
#[cfg(feature = "single")]
pub type Float = f32;

pub mod beam;
pub mod consts;
pub mod errors;
pub mod generator;
pub mod lattice;
pub mod layer;
pub mod orbit;
pub mod output;
pub mod photons;
pub mod region;
pub mod settings;
pub mod spectrum;
pub mod step;
pub mod twiss;
