//! Build pipeline.
//!
//! 1. Compress every file and message directory on the worker pool.
//! 2. Lay the segments out sequentially after the input ROM's prefix:
//!    files, messages, images, animations, music, sound effects, effects.
//! 3. Patch every segment reference and apply per-ROM fixes.
//!
//! The checksum is left to a [`ChecksumFixup`] run on the written file.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::layout::LayoutWriter;
use crate::rom::Rom;
use crate::scheduler::{Batch, Scheduler};
use crate::segment::{EncodeJob, GameData};
use crate::segref::SegRefTable;

/// Words zeroed in the finished image to fix a save type hang, per ROM id.
const SAVE_TYPE_FIXES: &[(&str, [usize; 2])] = &[
    ("NMVE", [0xCEC0, 0x50950]),
    ("NMVP", [0xCEE0, 0x50990]),
    ("NMVJ", [0xCEC0, 0x507EC]),
];

#[derive(Debug, Clone)]
pub struct BuiltRom {
    pub image: Vec<u8>,
    /// Reference values after layout.
    pub refs:  SegRefTable,
}

impl BuiltRom {
    pub fn digest(&self) -> blake3::Hash {
        blake3::hash(&self.image)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, &self.image).map_err(|e| Error::file(path, e))
    }
}

pub fn build_rom(rom: &Rom, game: &GameData, refs: &SegRefTable, sched: &Scheduler) -> Result<BuiltRom> {
    let prefix_len = game.files.base as usize;
    let prefix = rom.as_bytes().get(..prefix_len).ok_or_else(|| {
        Error::Malformed(format!("file archive base {prefix_len:#x} is past the end of the input ROM"))
    })?;

    // Compression runs ahead of layout; placement needs only the lengths.
    let mut jobs = Batch::new();
    let file_tickets = game.files.submit(&mut jobs);
    let message_tickets: Vec<_> = game.messages.iter().map(|m| m.submit(&mut jobs)).collect();
    info!(blocks = jobs.len(), jobs = sched.jobs(), "compressing");
    let mut blocks = sched.run(jobs, EncodeJob::run)?;

    let mut refs = refs.clone();
    let mut cursor = Cursor::new(prefix.to_vec());
    cursor.set_position(prefix_len as u64);
    let mut w = LayoutWriter::new(cursor);

    info!(base = format_args!("{prefix_len:#x}"), "laying out segments");
    game.files.write(&mut w, &mut refs, &file_tickets, &mut blocks)?;
    for (archive, tickets) in game.messages.iter().zip(&message_tickets) {
        archive.write(&mut w, &mut refs, tickets, &mut blocks)?;
    }
    game.images.write(&mut w, &mut refs)?;
    if let Some(anim) = &game.animations {
        anim.write(&mut w, &mut refs)?;
    }
    for bank in &game.music {
        bank.write(&mut w, &mut refs)?;
    }
    for bank in &game.sfx {
        bank.write(&mut w, &mut refs)?;
    }
    game.effects.write(&mut w, &mut refs)?;

    let mut image = w.into_inner().into_inner();
    refs.patch(&mut image)?;
    apply_save_type_fix(&rom.game_id(), &mut image)?;
    info!(size = image.len(), "image ready");
    Ok(BuiltRom { image, refs })
}

fn apply_save_type_fix(rom_id: &str, image: &mut [u8]) -> Result<()> {
    let Some((_, sites)) = SAVE_TYPE_FIXES.iter().find(|(id, _)| *id == rom_id) else {
        return Ok(());
    };
    for &site in sites {
        let len = image.len();
        let word = image
            .get_mut(site..site + 4)
            .ok_or_else(|| Error::Malformed(format!("save type fix at {site:#x} outside a {len:#x} byte image")))?;
        word.fill(0);
    }
    debug!(rom = rom_id, "applied save type fix");
    Ok(())
}

// ── Checksum ─────────────────────────────────────────────────────────────────

/// Post-processing run once on the written image.
pub trait ChecksumFixup {
    fn fix(&self, image: &Path) -> Result<()>;
}

/// Runs an external program with the image path as its only argument.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    program: PathBuf,
}

impl ExternalTool {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self { program: program.into() }
    }
}

impl ChecksumFixup for ExternalTool {
    fn fix(&self, image: &Path) -> Result<()> {
        let status = Command::new(&self.program)
            .arg(image)
            .status()
            .map_err(|e| Error::file(&self.program, e))?;
        if !status.success() {
            warn!(program = %self.program.display(), %status, "checksum tool failed");
            return Err(Error::file(
                &self.program,
                std::io::Error::new(std::io::ErrorKind::Other, format!("exited with {status}")),
            ));
        }
        Ok(())
    }
}
