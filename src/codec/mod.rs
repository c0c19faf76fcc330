//! Codec registry: the five compression kinds found in segment blocks.
//!
//! # Identity rules
//! Every compressed block carries a 32-bit `comp_type` tag in its header.
//! The tag is the authoritative identity of the algorithm that produced the
//! payload:
//!   - Tags 2, 3 and 4 all select the same sliding-window codec.  They are
//!     kept apart because a rebuilt ROM must carry the tag each file had.
//!   - Any tag outside 0..=5 is fatal on decode.  There is no fallback.
//!
//! # Decoding contract
//! Decoders are lenient about truncated input: bytes read past the end of
//! the source slice are zero.  They stop as soon as `raw_size` bytes are
//! produced and report how many source bytes they consumed, before the
//! block-level even padding is applied.

pub mod lz;
pub mod rle;
pub mod slide;

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Decoded sizes above this are treated as malformed input.
pub const MAX_RAW_SIZE: usize = 64 * 1024 * 1024;

// ── CompType ─────────────────────────────────────────────────────────────────

/// Compression tag as stored in a block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CompType {
    None,
    Lz,
    Slide2,
    Slide3,
    Slide4,
    Rle,
}

impl CompType {
    /// The on-disk tag value.
    #[inline]
    pub fn tag(self) -> u32 {
        match self {
            CompType::None   => 0,
            CompType::Lz     => 1,
            CompType::Slide2 => 2,
            CompType::Slide3 => 3,
            CompType::Slide4 => 4,
            CompType::Rle    => 5,
        }
    }

    /// Resolve a header tag.  Returns `None` for unsupported values.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(CompType::None),
            1 => Some(CompType::Lz),
            2 => Some(CompType::Slide2),
            3 => Some(CompType::Slide3),
            4 => Some(CompType::Slide4),
            5 => Some(CompType::Rle),
            _ => None,
        }
    }

    /// Human-readable name, for diagnostics only.
    pub fn name(self) -> &'static str {
        match self {
            CompType::None                                       => "none",
            CompType::Lz                                         => "lz",
            CompType::Slide2 | CompType::Slide3 | CompType::Slide4 => "slide",
            CompType::Rle                                        => "rle",
        }
    }
}

impl TryFrom<u32> for CompType {
    type Error = CodecError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        CompType::from_tag(tag).ok_or(CodecError::UnsupportedType(tag))
    }
}

impl From<CompType> for u32 {
    fn from(comp: CompType) -> u32 {
        comp.tag()
    }
}

impl std::fmt::Display for CompType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.tag(), self.name())
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unsupported compression type {0}")]
    UnsupportedType(u32),
    #[error("Block declares {raw_size} decoded bytes, above the {MAX_RAW_SIZE} byte limit")]
    Oversized { raw_size: usize },
    #[error("Block of {0} bytes does not fit a 32-bit size field")]
    TooLarge(usize),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

/// Result of decoding one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub data:     Vec<u8>,
    /// Source bytes consumed, excluding block padding.
    pub consumed: usize,
}

pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;
    fn encode(&self, data: &[u8]) -> Vec<u8>;
    fn decode(&self, src: &[u8], raw_size: usize) -> Decoded;
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn name(&self) -> &'static str { "none" }
    fn encode(&self, data: &[u8]) -> Vec<u8> { data.to_vec() }
    fn decode(&self, src: &[u8], raw_size: usize) -> Decoded {
        Decoded { data: crate::bytes::range_at(src, 0, raw_size), consumed: raw_size }
    }
}

pub struct LzCodec;
impl Codec for LzCodec {
    fn name(&self) -> &'static str { "lz" }
    fn encode(&self, data: &[u8]) -> Vec<u8> { lz::encode(data) }
    fn decode(&self, src: &[u8], raw_size: usize) -> Decoded { lz::decode(src, raw_size) }
}

pub struct SlideCodec;
impl Codec for SlideCodec {
    fn name(&self) -> &'static str { "slide" }
    fn encode(&self, data: &[u8]) -> Vec<u8> { slide::encode(data) }
    fn decode(&self, src: &[u8], raw_size: usize) -> Decoded { slide::decode(src, raw_size) }
}

pub struct RleCodec;
impl Codec for RleCodec {
    fn name(&self) -> &'static str { "rle" }
    fn encode(&self, data: &[u8]) -> Vec<u8> { rle::encode(data) }
    fn decode(&self, src: &[u8], raw_size: usize) -> Decoded { rle::decode(src, raw_size) }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve a raw header tag to a built-in codec.
///
/// Returns `Err(CodecError::UnsupportedType)` if the tag is not recognised.
/// The caller MUST NOT fall back to any other codec.
pub fn get_codec_by_tag(tag: u32) -> Result<Box<dyn Codec>, CodecError> {
    Ok(get_codec(CompType::try_from(tag)?))
}

/// Resolve a CompType to a built-in codec.
pub fn get_codec(comp: CompType) -> Box<dyn Codec> {
    match comp {
        CompType::None                                         => Box::new(NoneCodec),
        CompType::Lz                                           => Box::new(LzCodec),
        CompType::Slide2 | CompType::Slide3 | CompType::Slide4 => Box::new(SlideCodec),
        CompType::Rle                                          => Box::new(RleCodec),
    }
}
