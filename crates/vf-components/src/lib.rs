//! vf-components: electrical device library for voltflow.
//!
//! Provides the capability contract every device implements
//! ([`PowerComponent`]) and the basic two-terminal elements:
//! - Resistor
//! - Capacitor and inductor (trapezoidal companion models)
//! - Ideal voltage source (branch-current virtual node)
//! - Current source
//! - Norton source (composition of a current source and a shunt resistor)
//!
//! Devices are deterministic functions of their parameters and the
//! attribute cells they declared; the engine never needs to know concrete
//! device types, only this interface.

pub mod capacitor;
pub mod component;
pub mod current_source;
pub mod error;
pub mod inductor;
pub mod norton_source;
pub mod resistor;
pub mod stamp;
pub mod voltage_source;
pub mod waveform;

// Re-exports
pub use capacitor::Capacitor;
pub use component::{InitContext, PowerComponent};
pub use current_source::CurrentSource;
pub use error::{ComponentError, ComponentResult};
pub use inductor::Inductor;
pub use norton_source::NortonSource;
pub use resistor::Resistor;
pub use voltage_source::VoltageSource;
pub use waveform::Waveform;
