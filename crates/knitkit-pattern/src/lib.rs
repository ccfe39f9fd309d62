//! # knitkit Pattern
//!
//! Turns raster images into knitting passes: luminance is quantized into
//! color indices ([`KnitImage`]) and each row is split into one needle
//! activation line per present color ([`LineEncoder`]).

pub mod encoder;
pub mod knit_image;

pub use encoder::{EncodedLine, LineEncoder, Passes};
pub use knit_image::KnitImage;
