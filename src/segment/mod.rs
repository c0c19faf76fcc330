//! In-memory model of every segment kind.
//!
//! Each kind lives in its own module with two halves:
//! - a `plan` that walks the segment's tables in the input ROM and submits
//!   one [`Leaf`] per item to the extract batch, then `assemble`s the
//!   decoded leaves back into the segment;
//! - a `write` that lays the segment out through a
//!   [`LayoutWriter`](crate::layout::LayoutWriter).

pub mod effects;
pub mod files;
pub mod images;
pub mod messages;
pub mod music;
pub mod sfx;

pub use effects::EffectTable;
pub use files::{FileArchive, FileEntry};
pub use images::ImageArchive;
pub use messages::{MessageArchive, MessageBody, MessageDir};
pub use music::{MusicBank, Sequence, SequenceData};
pub use sfx::SfxBank;

use crate::block::{encode_block, DecodedBlock};
use crate::codec::{CompType, MAX_RAW_SIZE};
use crate::error::{Error, Result};
use crate::format::GameFormat;
use crate::rom::Rom;
use crate::scheduler::{Slots, Ticket};

/// Everything extracted from, or rebuilt into, one ROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameData {
    pub format:     GameFormat,
    pub files:      FileArchive,
    pub messages:   Vec<MessageArchive>,
    pub images:     ImageArchive,
    pub animations: Option<ImageArchive>,
    pub music:      Vec<MusicBank>,
    pub sfx:        Vec<SfxBank>,
    pub effects:    EffectTable,
}

// ── Extract leaves ───────────────────────────────────────────────────────────

/// One independently loadable item of the input ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leaf {
    /// A compressed block.
    Block { offset: usize },
    /// A raw byte range.
    Slice { offset: usize, len: usize },
}

#[derive(Debug)]
pub enum LeafData {
    Block(DecodedBlock),
    Bytes(Vec<u8>),
}

impl Leaf {
    /// A raw range, rejected when implausibly large.
    pub fn slice(offset: usize, len: usize) -> Result<Self> {
        if len > MAX_RAW_SIZE {
            return Err(Error::Malformed(format!("{len:#x} byte range at {offset:#x}")));
        }
        Ok(Leaf::Slice { offset, len })
    }

    pub fn load(self, rom: &Rom) -> Result<LeafData> {
        match self {
            Leaf::Block { offset } => Ok(LeafData::Block(rom.block_at(offset)?)),
            Leaf::Slice { offset, len } => Ok(LeafData::Bytes(rom.range(offset, len))),
        }
    }
}

pub(crate) fn take_block(slots: &mut Slots<LeafData>, ticket: Ticket) -> Result<DecodedBlock> {
    match slots.take(ticket)? {
        LeafData::Block(block) => Ok(block),
        LeafData::Bytes(_) => Err(Error::Scheduler("expected a decoded block".into())),
    }
}

pub(crate) fn take_bytes(slots: &mut Slots<LeafData>, ticket: Ticket) -> Result<Vec<u8>> {
    match slots.take(ticket)? {
        LeafData::Bytes(bytes) => Ok(bytes),
        LeafData::Block(_) => Err(Error::Scheduler("expected a raw range".into())),
    }
}

// ── Build jobs ───────────────────────────────────────────────────────────────

/// A buffer to compress ahead of layout.
#[derive(Debug, Clone, Copy)]
pub struct EncodeJob<'a> {
    pub data: &'a [u8],
    pub comp: CompType,
}

impl EncodeJob<'_> {
    pub fn run(self) -> Result<Vec<u8>> {
        Ok(encode_block(self.data, self.comp)?)
    }
}

/// A table count as stored on disk.
pub(crate) fn count32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::Malformed(format!("{len} {what} do not fit a 32-bit count")))
}

/// `base + offset`, rejecting addresses that wrap.
pub(crate) fn at(base: usize, offset: u32) -> Result<usize> {
    base.checked_add(offset as usize)
        .ok_or_else(|| Error::Malformed(format!("offset {offset:#x} from {base:#x} overflows")))
}
