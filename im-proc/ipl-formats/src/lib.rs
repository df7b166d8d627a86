//! Static knowledge about industrial camera pixel formats.
//!
//! This crate is the leaf of the image processing workspace. It describes the
//! memory layout of every supported [PixelFormat], provides the small geometry
//! and [Range] types shared by the algorithms, and defines the [Error] taxonomy
//! used throughout.

mod error;
mod geometry;
pub mod pixel_format;
pub mod query;
mod range;

pub use error::{Error, ErrorKind, Result, StatusCode};
pub use geometry::{Point2D, Rect2D, Size2D};
pub use pixel_format::{BayerPattern, CfaColor, ColorFamily, Endianness, Packing, PixelFormat};
pub use range::Range;

/// Line orientation used by the row and column extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}
