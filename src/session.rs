//! Context object tying one input ROM to its descriptor.
//!
//! ```no_run
//! use mprom::session::{Session, SessionOptions};
//!
//! let session = Session::open("base.z64", "gameconfig", SessionOptions::default())?;
//! let game = session.extract()?;
//! session.dump(&game, "dump")?;
//!
//! let game = session.load_assets("dump")?;
//! session.build(&game)?.write("out.z64")?;
//! # Ok::<(), mprom::Error>(())
//! ```

use std::path::Path;

use tracing::info;

use crate::assets::{collect, load_game, write_assets, AssetSource, DirSource};
use crate::build::{build_rom, BuiltRom};
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::extract::extract;
use crate::format::GameFormat;
use crate::listing::Listing;
use crate::rom::Rom;
use crate::scheduler::Scheduler;
use crate::segment::GameData;
use crate::segref::SegRefTable;

// ── SessionOptions ───────────────────────────────────────────────────────────

/// Configuration for [`Session::open`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Worker threads for decode, encode and asset I/O.  0 uses every core.
    pub jobs: usize,
}

// ── Session ──────────────────────────────────────────────────────────────────

/// An immutable ROM view plus everything resolved from its descriptor.
#[derive(Debug)]
pub struct Session {
    rom:        Rom,
    descriptor: Descriptor,
    format:     GameFormat,
    refs:       SegRefTable,
    scheduler:  Scheduler,
}

impl Session {
    /// Load the ROM and the descriptor matching its game id.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(rom_path: P, desc_dir: Q, opts: SessionOptions) -> Result<Self> {
        let rom = Rom::load(rom_path)?;
        let descriptor = Descriptor::load(desc_dir, &rom.game_id())?;
        Self::new(rom, descriptor, opts)
    }

    /// Read every segment reference and validate the descriptor.
    pub fn new(rom: Rom, descriptor: Descriptor, opts: SessionOptions) -> Result<Self> {
        let refs = SegRefTable::load(&descriptor.segrefs, &rom)?;
        let format = descriptor.validate(&refs)?;
        let scheduler = Scheduler::new(opts.jobs)?;
        info!(rom = %rom.game_id(), game = %format, segrefs = refs.len(), "session ready");
        Ok(Self { rom, descriptor, format, refs, scheduler })
    }

    pub fn rom(&self) -> &Rom {
        &self.rom
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn format(&self) -> GameFormat {
        self.format
    }

    /// Segment addresses as read from the input ROM.
    pub fn refs(&self) -> &SegRefTable {
        &self.refs
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn extract(&self) -> Result<GameData> {
        extract(&self.rom, &self.descriptor, self.format, &self.refs, &self.scheduler)
    }

    /// Write every asset of `game` and its listing under `out_dir`.
    pub fn dump<P: AsRef<Path>>(&self, game: &GameData, out_dir: P) -> Result<Listing> {
        let out_dir = out_dir.as_ref();
        let (listing, assets) = collect(game, &self.descriptor);
        write_assets(out_dir, &assets, &self.scheduler)?;
        listing.write(out_dir)?;
        Ok(listing)
    }

    /// Read a dump directory written by [`Session::dump`].
    pub fn load_assets<P: AsRef<Path>>(&self, in_dir: P) -> Result<GameData> {
        let in_dir = in_dir.as_ref();
        let listing = Listing::read(in_dir)?;
        self.load_from(&listing, &DirSource::new(in_dir))
    }

    pub fn load_from(&self, listing: &Listing, source: &dyn AssetSource) -> Result<GameData> {
        load_game(listing, &self.descriptor, self.format, &self.refs, source, &self.scheduler)
    }

    pub fn build(&self, game: &GameData) -> Result<BuiltRom> {
        build_rom(&self.rom, game, &self.refs, &self.scheduler)
    }
}
