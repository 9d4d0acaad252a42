//! Data-to-pixel mapping and render targets

pub mod axis;
pub mod pipeline;
pub mod surface;
