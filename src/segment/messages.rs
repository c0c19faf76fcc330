//! Message archives.
//!
//! Directory layout:
//! ```text
//! u32 count, u32 off[count]      (relative to base)
//! compressed block per directory
//! ```
//! Flat layout keeps the archive as one raw blob.  Its length is found from
//! the last message: `last_off + u16@last_off + 2`, rounded up to even.

use std::io::{Seek, Write};

use crate::codec::CompType;
use crate::error::Result;
use crate::format::MessageLayout;
use crate::layout::LayoutWriter;
use crate::rom::Rom;
use crate::scheduler::{Batch, Slots, Ticket};
use crate::segref::SegRefTable;

use super::{at, count32, take_block, take_bytes, EncodeJob, Leaf, LeafData};

/// Compression used for message directories unless the listing says
/// otherwise.
pub const DEFAULT_MESSAGE_COMP: CompType = CompType::Lz;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDir {
    pub comp_type: CompType,
    pub data:      Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Flat(Vec<u8>),
    Directories(Vec<MessageDir>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageArchive {
    pub name:        String,
    pub base:        u32,
    pub use_dir_map: bool,
    pub body:        MessageBody,
}

#[derive(Debug)]
enum PlanBody {
    Flat(Ticket),
    Directories(Vec<Ticket>),
}

#[derive(Debug)]
pub struct MessagePlan {
    name:        String,
    base:        u32,
    use_dir_map: bool,
    body:        PlanBody,
}

/// Byte length of a flat archive at `base`.
pub fn flat_len(rom: &Rom, base: usize) -> Result<usize> {
    let count = rom.u32_at(base) as usize;
    if count == 0 {
        return Ok(4);
    }
    let offsets = rom.entries(base + 4, count)?;
    let last = offsets[count - 1];
    let last_at = at(base, last)?;
    let len = last as usize + usize::from(rom.u16_at(last_at)) + 2;
    Ok(len + (len & 1))
}

impl MessageArchive {
    pub fn plan(
        rom:         &Rom,
        name:        &str,
        base:        u32,
        layout:      MessageLayout,
        use_dir_map: bool,
        batch:       &mut Batch<Leaf>,
    ) -> Result<MessagePlan> {
        let seg = base as usize;
        let body = match layout {
            MessageLayout::Flat => PlanBody::Flat(batch.submit(Leaf::slice(seg, flat_len(rom, seg)?)?)),
            MessageLayout::Directory => PlanBody::Directories(
                rom.table(seg)?
                    .into_iter()
                    .map(|off| Ok(batch.submit(Leaf::Block { offset: at(seg, off)? })))
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        Ok(MessagePlan { name: name.to_owned(), base, use_dir_map, body })
    }

    pub fn layout(&self) -> MessageLayout {
        match self.body {
            MessageBody::Flat(_) => MessageLayout::Flat,
            MessageBody::Directories(_) => MessageLayout::Directory,
        }
    }

    /// Queue every directory for compression.  Flat archives need none.
    pub fn submit<'a>(&'a self, batch: &mut Batch<EncodeJob<'a>>) -> Vec<Ticket> {
        match &self.body {
            MessageBody::Flat(_) => Vec::new(),
            MessageBody::Directories(dirs) => dirs
                .iter()
                .map(|d| batch.submit(EncodeJob { data: &d.data, comp: d.comp_type }))
                .collect(),
        }
    }

    pub fn write<W: Write + Seek>(
        &self,
        w:       &mut LayoutWriter<W>,
        refs:    &mut SegRefTable,
        tickets: &[Ticket],
        blocks:  &mut Slots<Vec<u8>>,
    ) -> Result<()> {
        w.segment(refs, &self.name, |w| match &self.body {
            MessageBody::Flat(data) => w.write_bytes(data),
            MessageBody::Directories(_) => {
                let mut table = w.begin_table(count32(tickets.len(), "message directories")?, tickets.len())?;
                for &ticket in tickets {
                    w.mark(&mut table)?;
                    w.write_bytes(&blocks.take(ticket)?)?;
                }
                w.finish_table(table)
            }
        })
    }
}

impl MessagePlan {
    pub fn assemble(self, slots: &mut Slots<LeafData>) -> Result<MessageArchive> {
        let body = match self.body {
            PlanBody::Flat(ticket) => MessageBody::Flat(take_bytes(slots, ticket)?),
            PlanBody::Directories(tickets) => MessageBody::Directories(
                tickets
                    .into_iter()
                    .map(|t| {
                        let block = take_block(slots, t)?;
                        Ok(MessageDir { comp_type: block.comp_type, data: block.data })
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        Ok(MessageArchive { name: self.name, base: self.base, use_dir_map: self.use_dir_map, body })
    }
}
