//! Generic two-level file archive.
//!
//! ```text
//! base: u32 dircount, u32 dir_off[dircount]        (relative to base)
//! dir:  u32 filecount, u32 file_off[filecount]     (relative to dir)
//! file: compressed block
//! ```

use std::io::{Seek, Write};

use crate::codec::CompType;
use crate::error::Result;
use crate::layout::LayoutWriter;
use crate::rom::Rom;
use crate::scheduler::{Batch, Slots, Ticket};
use crate::segref::SegRefTable;

use super::{at, count32, take_block, EncodeJob, Leaf, LeafData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub dir:       usize,
    pub file:      usize,
    pub comp_type: CompType,
    pub data:      Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArchive {
    pub name: String,
    pub base: u32,
    pub dirs: Vec<Vec<FileEntry>>,
}

/// File blocks located in the ROM, pending decode.
#[derive(Debug)]
pub struct FilePlan {
    name: String,
    base: u32,
    dirs: Vec<Vec<Ticket>>,
}

impl FileArchive {
    pub fn plan(rom: &Rom, name: &str, base: u32, batch: &mut Batch<Leaf>) -> Result<FilePlan> {
        let seg = base as usize;
        let mut dirs = Vec::new();
        for dir_off in rom.table(seg)? {
            let dir_base = at(seg, dir_off)?;
            let tickets = rom
                .table(dir_base)?
                .into_iter()
                .map(|file_off| Ok(batch.submit(Leaf::Block { offset: at(dir_base, file_off)? })))
                .collect::<Result<Vec<_>>>()?;
            dirs.push(tickets);
        }
        Ok(FilePlan { name: name.to_owned(), base, dirs })
    }

    pub fn file_count(&self) -> usize {
        self.dirs.iter().map(Vec::len).sum()
    }

    /// Queue every file for compression.
    pub fn submit<'a>(&'a self, batch: &mut Batch<EncodeJob<'a>>) -> Vec<Vec<Ticket>> {
        self.dirs
            .iter()
            .map(|dir| {
                dir.iter()
                    .map(|f| batch.submit(EncodeJob { data: &f.data, comp: f.comp_type }))
                    .collect()
            })
            .collect()
    }

    pub fn write<W: Write + Seek>(
        &self,
        w:       &mut LayoutWriter<W>,
        refs:    &mut SegRefTable,
        tickets: &[Vec<Ticket>],
        blocks:  &mut Slots<Vec<u8>>,
    ) -> Result<()> {
        w.segment(refs, &self.name, |w| {
            let dircount = self.dirs.len();
            let mut dir_table = w.begin_table(count32(dircount, "directories")?, dircount)?;
            for dir in tickets {
                w.mark(&mut dir_table)?;
                let mut file_table = w.begin_table(count32(dir.len(), "files")?, dir.len())?;
                for &ticket in dir {
                    w.mark(&mut file_table)?;
                    w.write_bytes(&blocks.take(ticket)?)?;
                }
                w.finish_table(file_table)?;
            }
            w.finish_table(dir_table)
        })
    }
}

impl FilePlan {
    pub fn assemble(self, slots: &mut Slots<LeafData>) -> Result<FileArchive> {
        let mut dirs = Vec::with_capacity(self.dirs.len());
        for (dir, tickets) in self.dirs.into_iter().enumerate() {
            let mut files = Vec::with_capacity(tickets.len());
            for (file, ticket) in tickets.into_iter().enumerate() {
                let block = take_block(slots, ticket)?;
                files.push(FileEntry { dir, file, comp_type: block.comp_type, data: block.data });
            }
            dirs.push(files);
        }
        Ok(FileArchive { name: self.name, base: self.base, dirs })
    }
}
