//! Voice Activity Adapter

mod energy_vad;

pub use energy_vad::{compute_rms, EnergyVad, EnergyVadConfig};
