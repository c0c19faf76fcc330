//! Extract pipeline.
//!
//! 1. Resolution: walk every segment's tables sequentially and queue one
//!    [`Leaf`] per item.
//! 2. Data movement: decode or copy every leaf on the worker pool.
//! 3. Assembly: move the results into a [`GameData`].

use tracing::{debug, info};

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::format::GameFormat;
use crate::rom::Rom;
use crate::scheduler::{Batch, Scheduler};
use crate::segment::{
    EffectTable, FileArchive, GameData, ImageArchive, Leaf, MessageArchive, MusicBank, SfxBank,
};
use crate::segref::SegRefTable;

pub fn extract(
    rom:    &Rom,
    desc:   &Descriptor,
    format: GameFormat,
    refs:   &SegRefTable,
    sched:  &Scheduler,
) -> Result<GameData> {
    let mut batch: Batch<Leaf> = Batch::new();

    let name = &desc.filedata.segname;
    let files = FileArchive::plan(rom, name, refs.resolve(name)?, &mut batch)?;

    let messages = desc
        .messdata
        .iter()
        .map(|m| {
            let base = refs.resolve(&m.segname)?;
            MessageArchive::plan(rom, &m.segname, base, format.message_layout(), m.use_dirmap, &mut batch)
        })
        .collect::<Result<Vec<_>>>()?;

    let name = &desc.hvqdata.segname;
    let images = ImageArchive::plan(rom, name, refs.resolve(name)?, &mut batch)?;

    let animations = desc
        .animations()?
        .map(|a| ImageArchive::plan(rom, &a.segname, refs.resolve(&a.segname)?, &mut batch))
        .transpose()?;

    let music = desc
        .musbanks
        .iter()
        .map(|m| MusicBank::plan(rom, &m.segname, refs.resolve(&m.segname)?, format.bank_layout(), &mut batch))
        .collect::<Result<Vec<_>>>()?;

    let sfx = desc
        .sfxbanks
        .iter()
        .map(|s| SfxBank::plan(rom, &s.segname, refs.resolve(&s.segname)?, format.bank_layout(), &mut batch))
        .collect::<Result<Vec<_>>>()?;

    let name = &desc.fxdata.segname;
    let effects = EffectTable::plan(rom, name, refs.resolve(name)?, &mut batch)?;

    info!(game = %format, leaves = batch.len(), jobs = sched.jobs(), "decoding segments");
    let mut slots = sched.run(batch, |leaf| leaf.load(rom))?;

    let game = GameData {
        format,
        files:      files.assemble(&mut slots)?,
        messages:   messages.into_iter().map(|m| m.assemble(&mut slots)).collect::<Result<_>>()?,
        images:     images.assemble(&mut slots)?,
        animations: animations.map(|a| a.assemble(&mut slots)).transpose()?,
        music:      music.into_iter().map(|m| m.assemble(&mut slots)).collect::<Result<_>>()?,
        sfx:        sfx.into_iter().map(|s| s.assemble(&mut slots)).collect::<Result<_>>()?,
        effects:    effects.assemble(&mut slots)?,
    };
    debug!(
        files = game.files.file_count(),
        messages = game.messages.len(),
        images = game.images.blocks.len(),
        music = game.music.len(),
        "extracted"
    );
    Ok(game)
}
