//! Sequential writer for the build direction.
//!
//! Segments are written one after another; the stream position when a
//! segment starts is its ROM address.  Count/offset tables are written as
//! placeholders first and backpatched once every item's position is known:
//!
//! ```text
//! base: u32 count
//!       u32 off[slots]   ← zero until finish_table()
//!       item 0 …         ← off[0] = item0 - base
//! ```

use std::io::{Seek, SeekFrom, Write};

use byteorder::{BigEndian, WriteBytesExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::segref::SegRefTable;

/// Every segment ends on this boundary.
pub const SEGMENT_ALIGN: u64 = 16;

#[inline]
pub fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

/// Offsets recorded for one table, relative to its base.
#[derive(Debug)]
#[must_use = "a table must be finished to backpatch its offsets"]
pub struct OffsetTable {
    base:    u64,
    slots:   usize,
    offsets: Vec<u32>,
}

impl OffsetTable {
    pub fn base(&self) -> u64 {
        self.base
    }
}

pub struct LayoutWriter<W: Write + Seek> {
    writer: W,
}

impl<W: Write + Seek> LayoutWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.writer.stream_position()?)
    }

    /// Current position as a 32-bit ROM address.
    pub fn address(&mut self) -> Result<u32> {
        let pos = self.position()?;
        u32::try_from(pos).map_err(|_| Error::Malformed(format!("image grew past 4 GiB ({pos:#x})")))
    }

    // ── Primitive writes ─────────────────────────────────────────────────────

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        Ok(self.writer.write_u8(value)?)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        Ok(self.writer.write_u16::<BigEndian>(value)?)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        Ok(self.writer.write_u32::<BigEndian>(value)?)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        Ok(self.writer.write_all(data)?)
    }

    /// Pad with `fill` up to the next multiple of `align`.
    pub fn align(&mut self, align: u64, fill: u8) -> Result<()> {
        self.pad_to(0, align, fill)
    }

    /// Pad with `fill` until the distance from `origin` is a multiple of
    /// `align`.
    pub fn pad_to(&mut self, origin: u64, align: u64, fill: u8) -> Result<()> {
        let rel = self.position()? - origin;
        let pad = (align_up(rel, align) - rel) as usize;
        if pad > 0 {
            self.writer.write_all(&vec![fill; pad])?;
        }
        Ok(())
    }

    /// Overwrite the word at `at` and return to the current position.
    pub fn patch_u32(&mut self, at: u64, value: u32) -> Result<()> {
        let here = self.position()?;
        self.writer.seek(SeekFrom::Start(at))?;
        self.writer.write_u32::<BigEndian>(value)?;
        self.writer.seek(SeekFrom::Start(here))?;
        Ok(())
    }

    // ── Offset tables ────────────────────────────────────────────────────────

    /// Write `count` followed by `slots` zeroed offsets.
    pub fn begin_table(&mut self, count: u32, slots: usize) -> Result<OffsetTable> {
        let base = self.position()?;
        self.write_u32(count)?;
        self.write_bytes(&vec![0u8; slots * 4])?;
        Ok(OffsetTable { base, slots, offsets: Vec::with_capacity(slots) })
    }

    /// Record the current position as the next entry of `table`.
    pub fn mark(&mut self, table: &mut OffsetTable) -> Result<()> {
        let rel = self.position()? - table.base;
        let rel = u32::try_from(rel).map_err(|_| Error::Malformed(format!("table entry {rel:#x} past 4 GiB")))?;
        table.offsets.push(rel);
        Ok(())
    }

    /// Backpatch every recorded offset.
    pub fn finish_table(&mut self, table: OffsetTable) -> Result<()> {
        if table.offsets.len() != table.slots {
            return Err(Error::Malformed(format!(
                "table at {:#x} has {} slots but {} entries were written",
                table.base, table.slots, table.offsets.len()
            )));
        }
        for (i, &off) in table.offsets.iter().enumerate() {
            self.patch_u32(table.base + 4 + 4 * i as u64, off)?;
        }
        Ok(())
    }

    // ── Segments ─────────────────────────────────────────────────────────────

    /// Lay out one segment: record its start, write the body, pad to
    /// [`SEGMENT_ALIGN`] and record its end.
    pub fn segment<F>(&mut self, refs: &mut SegRefTable, name: &str, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let start = self.address()?;
        refs.set(name, start, false);
        body(self)?;
        self.align(SEGMENT_ALIGN, 0)?;
        let end = self.address()?;
        refs.set(name, end, true);
        debug!(segment = name, start = format_args!("{start:#x}"), size = end - start, "placed segment");
        Ok(())
    }
}
