//! Output encoding, pure Rust via the `image` crate.
//!
//! The module is split into:
//! - **Parameters**: [`Quality`], [`CompressionLevel`], and the ordered [`CompressionTiers`] table
//! - **Codecs**: the [`Encoder`] trait and its four variants
//! - **Registry**: [`Encoders`], which picks the variant for a decoded image
//!
//! Adding a format means adding a codec variant and a registry arm; callers
//! only ever see `&dyn Encoder`.

pub mod codecs;
mod params;
pub mod registry;

pub use codecs::{
    EncodeError, Encoder, EncoderKind, JpegEncoder, NoOpEncoder, PngEncoder, WebPEncoder,
};
pub use params::{
    CompressionLevel, CompressionTier, CompressionTiers, KIB, MIB, Quality, default_tiers,
};
pub use registry::{Encoders, EncodersInfo, is_opaque};
