//! Music banks: a sound bank, a wave table and a list of sequences.
//!
//! Legacy (`S2`) layout:
//! ```text
//! "S2"  u16 count
//! {u32 off, u32 size}[count]
//! {u8 bank, 7F FF FF, u32 hdr, u32 sb_size, u32 hdr + sb_size}[count]
//! FF padding to 16                                   ← hdr
//! sound bank, wave table, sequences (each padded to 8)
//! ```
//! `MBF0` layout:
//! ```text
//! "MBF0" u32 count, 0x38 bytes of global data
//! {u8 a0, u8 a1, u8 bank, 00, u32 07000000, u32 off, u32 size}[count]
//! {u32 sb_off, u32 sb_size, u32 wt_off, u32 wt_size}
//! sequences (each padded to 8), sound bank, wave table
//! ```
//! Several table entries may point at the same sequence data.  Those are
//! kept as [`SequenceData::Copy`] and written once.

use std::collections::HashMap;
use std::io::{Seek, Write};

use crate::error::{Error, Result};
use crate::format::BankLayout;
use crate::layout::{align_up, LayoutWriter};
use crate::rom::Rom;
use crate::scheduler::{Batch, Slots, Ticket};
use crate::segref::SegRefTable;

use super::{at, take_bytes, Leaf, LeafData};

pub const LEGACY_MAGIC: &[u8; 2] = b"S2";
pub const MBF0_MAGIC: &[u8; 4] = b"MBF0";
/// Global data carried by `MBF0` banks between the count and the table.
pub const GLOBALS_LEN: usize = 0x38;
const MBF0_TABLE: usize = 0x40;
const MBF0_UNUSED_WORD: u32 = 0x0700_0000;
const SEQ_ALIGN: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceData {
    Owned(Vec<u8>),
    /// Same data as the sequence at this earlier index.
    Copy(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub bank:  u8,
    /// The two leading record bytes of `MBF0` banks; zero for legacy banks.
    pub attrs: [u8; 2],
    pub data:  SequenceData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicBank {
    pub name:       String,
    pub base:       u32,
    pub layout:     BankLayout,
    /// `MBF0` only.
    pub globals:    Vec<u8>,
    pub sound_bank: Vec<u8>,
    pub wave_table: Vec<u8>,
    pub sequences:  Vec<Sequence>,
}

#[derive(Debug)]
struct SeqPlan {
    bank:  u8,
    attrs: [u8; 2],
    data:  PlanData,
}

#[derive(Debug)]
enum PlanData {
    Owned(Ticket),
    Copy(usize),
}

#[derive(Debug)]
pub struct MusicPlan {
    name:       String,
    base:       u32,
    layout:     BankLayout,
    globals:    Option<Ticket>,
    sound_bank: Ticket,
    wave_table: Ticket,
    sequences:  Vec<SeqPlan>,
}

/// Where one sequence entry lives, relative to the bank base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqPlacement {
    pub offset: u32,
    pub size:   u32,
}

fn len32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::Malformed(format!("{what} of {len} bytes")))
}

/// Size of the legacy header, including its FF padding.
pub fn legacy_header_len(count: usize) -> u64 {
    align_up(4 + 24 * count as u64, 16)
}

/// Size of the `MBF0` header.
pub fn mbf0_header_len(count: usize) -> u64 {
    (MBF0_TABLE + 16 * count + 16) as u64
}

impl MusicBank {
    pub fn plan(rom: &Rom, name: &str, base: u32, layout: BankLayout, batch: &mut Batch<Leaf>) -> Result<MusicPlan> {
        match layout {
            BankLayout::Legacy => Self::plan_legacy(rom, name, base, batch),
            BankLayout::Mbf0 => Self::plan_mbf0(rom, name, base, batch),
        }
    }

    fn plan_legacy(rom: &Rom, name: &str, base: u32, batch: &mut Batch<Leaf>) -> Result<MusicPlan> {
        let seg = base as usize;
        let count = usize::from(rom.u16_at(seg + 2));
        if count == 0 {
            return Err(Error::Malformed(format!("{name}: legacy music bank without sequences")));
        }
        let table = rom.entries(seg + 4, count * 2)?;
        let records = seg + 4 + count * 8;
        rom.entries(records, count * 4)?;

        let sb_addr = seg + legacy_header_len(count) as usize;
        let wt_addr = at(seg, rom.u32_at(records + 12))?;
        let seq0 = at(seg, table[0])?;
        let sb_len = wt_addr.checked_sub(sb_addr).ok_or_else(|| {
            Error::Malformed(format!("{name}: wave table at {wt_addr:#x} precedes sound bank at {sb_addr:#x}"))
        })?;
        let wt_len = seq0.checked_sub(wt_addr).ok_or_else(|| {
            Error::Malformed(format!("{name}: first sequence at {seq0:#x} precedes wave table at {wt_addr:#x}"))
        })?;

        let mut seen = HashMap::new();
        let mut sequences = Vec::with_capacity(count);
        for i in 0..count {
            let addr = at(seg, table[2 * i])?;
            let size = table[2 * i + 1] as usize;
            let bank = rom.u8_at(records + 16 * i);
            sequences.push(SeqPlan { bank, attrs: [0, 0], data: plan_sequence(&mut seen, batch, i, addr, size)? });
        }

        Ok(MusicPlan {
            name:       name.to_owned(),
            base,
            layout:     BankLayout::Legacy,
            globals:    None,
            sound_bank: batch.submit(Leaf::slice(sb_addr, sb_len)?),
            wave_table: batch.submit(Leaf::slice(wt_addr, wt_len)?),
            sequences,
        })
    }

    fn plan_mbf0(rom: &Rom, name: &str, base: u32, batch: &mut Batch<Leaf>) -> Result<MusicPlan> {
        let seg = base as usize;
        let count = rom.u32_at(seg + 4) as usize;
        let words = count
            .checked_mul(4)
            .and_then(|n| n.checked_add(4))
            .ok_or_else(|| Error::Malformed(format!("{name}: {count} sequences")))?;
        rom.entries(seg + MBF0_TABLE, words)?;

        let mut seen = HashMap::new();
        let mut sequences = Vec::with_capacity(count);
        for i in 0..count {
            let rec = seg + MBF0_TABLE + 16 * i;
            let addr = at(seg, rom.u32_at(rec + 8))?;
            let size = rom.u32_at(rec + 12) as usize;
            sequences.push(SeqPlan {
                bank:  rom.u8_at(rec + 2),
                attrs: [rom.u8_at(rec), rom.u8_at(rec + 1)],
                data:  plan_sequence(&mut seen, batch, i, addr, size)?,
            });
        }

        let tail = seg + MBF0_TABLE + 16 * count;
        let sb = Leaf::slice(at(seg, rom.u32_at(tail))?, rom.u32_at(tail + 4) as usize)?;
        let wt = Leaf::slice(at(seg, rom.u32_at(tail + 8))?, rom.u32_at(tail + 12) as usize)?;
        Ok(MusicPlan {
            name:       name.to_owned(),
            base,
            layout:     BankLayout::Mbf0,
            globals:    Some(batch.submit(Leaf::slice(seg + 8, GLOBALS_LEN)?)),
            sound_bank: batch.submit(sb),
            wave_table: batch.submit(wt),
            sequences,
        })
    }

    /// Offsets and sizes of every sequence entry for a bank whose first
    /// sequence starts at `first`.
    pub fn placements(&self, first: u64) -> Result<(Vec<SeqPlacement>, u64)> {
        let mut cursor = first;
        let mut out: Vec<SeqPlacement> = Vec::with_capacity(self.sequences.len());
        for (i, seq) in self.sequences.iter().enumerate() {
            let placed = match &seq.data {
                SequenceData::Owned(data) => {
                    let offset = u32::try_from(cursor)
                        .map_err(|_| Error::Malformed(format!("{}: bank past 4 GiB", self.name)))?;
                    let size = len32(data.len(), "sequence")?;
                    cursor = align_up(cursor + u64::from(size), SEQ_ALIGN);
                    SeqPlacement { offset, size }
                }
                SequenceData::Copy(j) if *j < i => out[*j],
                SequenceData::Copy(j) => {
                    return Err(Error::Malformed(format!(
                        "{}: sequence {i} copies sequence {j}, which does not precede it",
                        self.name
                    )));
                }
            };
            out.push(placed);
        }
        Ok((out, cursor))
    }

    fn owned(&self) -> impl Iterator<Item = &[u8]> {
        self.sequences.iter().filter_map(|s| match &s.data {
            SequenceData::Owned(data) => Some(data.as_slice()),
            SequenceData::Copy(_) => None,
        })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut LayoutWriter<W>, refs: &mut SegRefTable) -> Result<()> {
        w.segment(refs, &self.name, |w| match self.layout {
            BankLayout::Legacy => self.write_legacy(w),
            BankLayout::Mbf0 => self.write_mbf0(w),
        })
    }

    fn write_legacy<W: Write + Seek>(&self, w: &mut LayoutWriter<W>) -> Result<()> {
        let base = w.position()?;
        let count = self.sequences.len();
        let count16 = u16::try_from(count)
            .map_err(|_| Error::Malformed(format!("{}: {count} sequences in a legacy bank", self.name)))?;
        let header = legacy_header_len(count);
        let sb_len = len32(self.sound_bank.len(), "sound bank")?;
        let wt_len = len32(self.wave_table.len(), "wave table")?;
        let (placed, _) = self.placements(header + u64::from(sb_len) + u64::from(wt_len))?;
        let header = header as u32;

        w.write_bytes(LEGACY_MAGIC)?;
        w.write_u16(count16)?;
        for p in &placed {
            w.write_u32(p.offset)?;
            w.write_u32(p.size)?;
        }
        for seq in &self.sequences {
            w.write_bytes(&[seq.bank, 0x7F, 0xFF, 0xFF])?;
            w.write_u32(header)?;
            w.write_u32(sb_len)?;
            w.write_u32(header + sb_len)?;
        }
        w.pad_to(base, 16, 0xFF)?;
        w.write_bytes(&self.sound_bank)?;
        w.write_bytes(&self.wave_table)?;
        for data in self.owned() {
            w.write_bytes(data)?;
            w.pad_to(base, SEQ_ALIGN, 0)?;
        }
        Ok(())
    }

    fn write_mbf0<W: Write + Seek>(&self, w: &mut LayoutWriter<W>) -> Result<()> {
        let base = w.position()?;
        let count = self.sequences.len();
        let (placed, sb_off) = self.placements(mbf0_header_len(count))?;
        let sb_off = u32::try_from(sb_off).map_err(|_| Error::Malformed(format!("{}: bank past 4 GiB", self.name)))?;
        let sb_len = len32(self.sound_bank.len(), "sound bank")?;
        let wt_len = len32(self.wave_table.len(), "wave table")?;

        w.write_bytes(MBF0_MAGIC)?;
        w.write_u32(len32(count, "sequence table")?)?;
        let mut globals = self.globals.clone();
        globals.resize(GLOBALS_LEN, 0);
        w.write_bytes(&globals)?;
        for (seq, p) in self.sequences.iter().zip(&placed) {
            w.write_bytes(&[seq.attrs[0], seq.attrs[1], seq.bank, 0])?;
            w.write_u32(MBF0_UNUSED_WORD)?;
            w.write_u32(p.offset)?;
            w.write_u32(p.size)?;
        }
        w.write_u32(sb_off)?;
        w.write_u32(sb_len)?;
        w.write_u32(sb_off + sb_len)?;
        w.write_u32(wt_len)?;
        w.pad_to(base, 16, 0xFF)?;
        for data in self.owned() {
            w.write_bytes(data)?;
            w.pad_to(base, SEQ_ALIGN, 0)?;
        }
        w.write_bytes(&self.sound_bank)?;
        w.write_bytes(&self.wave_table)
    }
}

fn plan_sequence(
    seen:  &mut HashMap<usize, usize>,
    batch: &mut Batch<Leaf>,
    index: usize,
    addr:  usize,
    size:  usize,
) -> Result<PlanData> {
    if let Some(&first) = seen.get(&addr) {
        return Ok(PlanData::Copy(first));
    }
    seen.insert(addr, index);
    Ok(PlanData::Owned(batch.submit(Leaf::slice(addr, size)?)))
}

impl MusicPlan {
    pub fn assemble(self, slots: &mut Slots<LeafData>) -> Result<MusicBank> {
        let globals = match self.globals {
            Some(t) => take_bytes(slots, t)?,
            None => Vec::new(),
        };
        let mut sequences = Vec::with_capacity(self.sequences.len());
        for seq in self.sequences {
            let data = match seq.data {
                PlanData::Owned(t) => SequenceData::Owned(take_bytes(slots, t)?),
                PlanData::Copy(i) => SequenceData::Copy(i),
            };
            sequences.push(Sequence { bank: seq.bank, attrs: seq.attrs, data });
        }
        Ok(MusicBank {
            name:       self.name,
            base:       self.base,
            layout:     self.layout,
            globals,
            sound_bank: take_bytes(slots, self.sound_bank)?,
            wave_table: take_bytes(slots, self.wave_table)?,
            sequences,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::bytes::{be16_at, be32_at};
    use crate::rom::tests::blank_rom;
    use crate::scheduler::Scheduler;

    fn bank(layout: BankLayout) -> MusicBank {
        let globals = if layout == BankLayout::Mbf0 { (0..GLOBALS_LEN as u8).collect() } else { Vec::new() };
        let attrs = if layout == BankLayout::Mbf0 { [3, 4] } else { [0, 0] };
        MusicBank {
            name:       "mus".into(),
            base:       0x40,
            layout,
            globals,
            sound_bank: vec![0xAB; 13],
            wave_table: vec![0xCD; 7],
            sequences:  vec![
                Sequence { bank: 1, attrs, data: SequenceData::Owned(vec![1; 5]) },
                Sequence { bank: 2, attrs, data: SequenceData::Owned(vec![2; 8]) },
                Sequence { bank: 1, attrs, data: SequenceData::Copy(0) },
            ],
        }
    }

    fn build(bank: &MusicBank) -> Vec<u8> {
        let mut refs = SegRefTable::default();
        let mut cursor = Cursor::new(blank_rom(0x40, "TEST"));
        cursor.set_position(0x40);
        let mut w = LayoutWriter::new(cursor);
        bank.write(&mut w, &mut refs).unwrap();
        w.into_inner().into_inner()
    }

    fn extract(image: Vec<u8>, layout: BankLayout) -> MusicBank {
        let rom = Rom::from_bytes(image).unwrap();
        let mut leaves = Batch::new();
        let plan = MusicBank::plan(&rom, "mus", 0x40, layout, &mut leaves).unwrap();
        let mut slots = Scheduler::new(2).unwrap().run(leaves, |leaf| leaf.load(&rom)).unwrap();
        plan.assemble(&mut slots).unwrap()
    }

    #[test]
    fn placements_align_and_share() {
        let (placed, end) = bank(BankLayout::Mbf0).placements(0x70).unwrap();
        assert_eq!(placed[0], SeqPlacement { offset: 0x70, size: 5 });
        assert_eq!(placed[1], SeqPlacement { offset: 0x78, size: 8 });
        assert_eq!(placed[2], placed[0]);
        assert_eq!(end, 0x80);
    }

    #[test]
    fn forward_copy_is_rejected() {
        let mut b = bank(BankLayout::Mbf0);
        b.sequences[0].data = SequenceData::Copy(2);
        assert!(b.placements(0).is_err());
    }

    #[test]
    fn mbf0_round_trip() {
        let original = bank(BankLayout::Mbf0);
        let image = build(&original);
        let seg = &image[0x40..];
        assert_eq!(&seg[..4], MBF0_MAGIC);
        assert_eq!(be32_at(seg, 4), 3);
        // header = 0x40 + 3 * 16 + 16
        assert_eq!(be32_at(seg, 0x48), 0x80);
        assert_eq!(be32_at(seg, 0x44), MBF0_UNUSED_WORD);
        assert_eq!(be32_at(seg, 0x40 + 32 + 8), 0x80);
        assert_eq!(be32_at(seg, 0x70), 0x90);
        assert_eq!(be32_at(seg, 0x74), 13);
        assert_eq!(be32_at(seg, 0x78), 0x90 + 13);
        assert_eq!(image.len() % 16, 0);
        assert_eq!(extract(image, BankLayout::Mbf0), original);
    }

    #[test]
    fn legacy_round_trip() {
        let original = bank(BankLayout::Legacy);
        let image = build(&original);
        let seg = &image[0x40..];
        assert_eq!(&seg[..2], LEGACY_MAGIC);
        assert_eq!(be16_at(seg, 2), 3);
        let header = legacy_header_len(3) as u32;
        assert_eq!(header, 0x50);
        assert!(seg[4 + 24 * 3..header as usize].iter().all(|&b| b == 0xFF));
        assert_eq!(be32_at(seg, 4), header + 13 + 7);
        assert_eq!(be32_at(seg, 4 + 3 * 8 + 12), header + 13);
        assert_eq!(extract(image, BankLayout::Legacy), original);
    }

    #[test]
    fn legacy_without_sequences_is_malformed() {
        let mut data = blank_rom(0x80, "TEST");
        data[0x40..0x42].copy_from_slice(LEGACY_MAGIC);
        let rom = Rom::from_bytes(data).unwrap();
        let mut leaves = Batch::new();
        assert!(MusicBank::plan(&rom, "mus", 0x40, BankLayout::Legacy, &mut leaves).is_err());
    }
}
