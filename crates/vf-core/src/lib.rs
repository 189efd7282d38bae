//! vf-core: stable foundation for voltflow.
//!
//! Contains:
//! - units (uom electrical SI types + constructors)
//! - numeric (Real + tolerances + float helpers)
//! - ids (stable compact IDs for network/model objects)
//! - attribute (named, shared per-component value cells)
//! - error (shared error types)

pub mod attribute;
pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use attribute::{AccessFlags, AttrRange, AttributeStore};
pub use error::{VfError, VfResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
