//! Pixel format identification and the static format/frame/interval catalog.

pub mod catalog;
pub mod fourcc;

pub use catalog::{Catalog, FrameDescriptor, FormatDescriptor, Selection, CATALOG};
pub use fourcc::FourCC;
