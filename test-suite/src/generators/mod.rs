//! PDF test generators
//!
//! [`LayeredPdfBuilder`] writes raw PDF text so fixtures can carry `/Order`
//! arrays and indirection layouts that the library itself never produces.
//! [`documents`] builds common fixtures through the public API.

pub mod documents;
pub mod layered_pdf;
pub mod strategies;

pub use layered_pdf::{LayerSpec, LayeredPdfBuilder, OrderItem};
