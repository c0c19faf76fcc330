//! Asset boundary between a [`GameData`] and a directory of dumped files.
//!
//! Dump layout, relative to the dump root:
//! ```text
//! romdata.json
//! filedata/<dir>/<n><ext>          one per archive file
//! <mes>.bin | <mes>/<dir>.bin      flat or directory message archives
//! hvqdata/<name>.bghvq
//! bganimdata/<name>.bganm
//! musdata/<bank>/soundbank.ctl, wavetable.tbl, globals.bin, seqs/<n>.seq
//! <sfx>.bin, <fx>.bin
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::format::{BankLayout, GameFormat, MessageLayout};
use crate::listing::{
    BlobListing, DirListing, FileListing, Listing, MessageDirListing, MessageListing, MessageListingBody,
    MusicListing, SeqListing,
};
use crate::scheduler::Scheduler;
use crate::segment::{
    EffectTable, FileArchive, FileEntry, GameData, ImageArchive, MessageArchive, MessageBody, MessageDir,
    MusicBank, Sequence, SequenceData, SfxBank,
};
use crate::segref::SegRefTable;

/// One dumped buffer and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset<'a> {
    pub path: String,
    pub data: &'a [u8],
}

// ── Extension sniffing ───────────────────────────────────────────────────────

/// File extension for an archive file, picked from its leading bytes.
pub fn detect_extension(data: &[u8]) -> &'static str {
    let head = |n: usize| data.get(..n);
    if data.get(8..16) == Some(b"HBINMODE") {
        ".hmf"
    } else if head(4) == Some(b"MTNX") {
        ".mot"
    } else if head(4) == Some(b"MTSK") {
        ".skn"
    } else if head(4) == Some(&[0, 0, 0, 32]) || head(4) == Some(&[0, 0, 0, 27]) {
        ".anm"
    } else if head(4) == Some(b"HVQ ") || data.get(4..8) == Some(&[0, 0, 0, 48]) {
        ".hvq"
    } else if head(4) == Some(b"HVQ-") {
        ".hvqmps"
    } else {
        ".bin"
    }
}

// ── Dump ─────────────────────────────────────────────────────────────────────

/// Name every buffer of `game` and describe them in a listing.
pub fn collect<'a>(game: &'a GameData, desc: &Descriptor) -> (Listing, Vec<Asset<'a>>) {
    let mut assets = Vec::new();
    let mut push = |path: String, data: &'a [u8]| {
        assets.push(Asset { path: path.clone(), data });
        path
    };

    let filedata = game
        .files
        .dirs
        .iter()
        .enumerate()
        .map(|(d, dir)| {
            let dir_name = desc.filedata.item_name(d);
            let files = dir
                .iter()
                .map(|f| FileListing {
                    path:     push(format!("filedata/{dir_name}/{}{}", f.file, detect_extension(&f.data)), &f.data),
                    comptype: f.comp_type,
                })
                .collect();
            DirListing { files }
        })
        .collect();

    let messdata = game
        .messages
        .iter()
        .enumerate()
        .map(|(segindex, m)| {
            let body = match &m.body {
                MessageBody::Flat(data) => MessageListingBody::Flat { path: push(format!("{}.bin", m.name), data) },
                MessageBody::Directories(dirs) => MessageListingBody::Directory {
                    dirs: dirs
                        .iter()
                        .enumerate()
                        .map(|(i, d)| MessageDirListing {
                            path:     push(format!("{}/{}.bin", m.name, desc.message_dir_name(m.use_dir_map, i)), &d.data),
                            comptype: d.comp_type,
                        })
                        .collect(),
                },
            };
            MessageListing { segindex, body }
        })
        .collect();

    let hvqdata = game
        .images
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| push(format!("hvqdata/{}.bghvq", desc.hvqdata.item_name(i)), b))
        .collect();

    let bganimdata = game.animations.as_ref().map(|anim| {
        anim.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let name = desc.bganimdata.as_ref().map_or_else(|| i.to_string(), |a| a.item_name(i));
                push(format!("bganimdata/{name}.bganm"), b)
            })
            .collect()
    });

    let musbanks = game
        .music
        .iter()
        .enumerate()
        .map(|(segindex, bank)| {
            let dir = format!("musdata/{}", bank.name);
            let mut seq_paths: Vec<String> = Vec::with_capacity(bank.sequences.len());
            let mut owned = 0usize;
            let mut seqs = Vec::with_capacity(bank.sequences.len());
            for seq in &bank.sequences {
                let path = match &seq.data {
                    SequenceData::Owned(data) => {
                        owned += 1;
                        push(format!("{dir}/seqs/{}.seq", owned - 1), data)
                    }
                    SequenceData::Copy(j) => seq_paths.get(*j).cloned().unwrap_or_default(),
                };
                seq_paths.push(path.clone());
                let attrs = (bank.layout == BankLayout::Mbf0).then_some(seq.attrs);
                seqs.push(SeqListing { path, bank: seq.bank, attrs });
            }
            let globals = (bank.layout == BankLayout::Mbf0).then(|| push(format!("{dir}/globals.bin"), &bank.globals));
            MusicListing {
                segindex,
                layout:    bank.layout,
                soundbank: push(format!("{dir}/soundbank.ctl"), &bank.sound_bank),
                wavetable: push(format!("{dir}/wavetable.tbl"), &bank.wave_table),
                globals,
                seqs,
            }
        })
        .collect();

    let sfxbanks = game
        .sfx
        .iter()
        .enumerate()
        .map(|(segindex, s)| BlobListing { segindex, path: push(format!("{}.bin", s.name), &s.data) })
        .collect();

    let fxdata = BlobListing {
        segindex: 0,
        path:     push(format!("{}.bin", game.effects.name), &game.effects.data),
    };

    let listing = Listing {
        game: game.format,
        filedata,
        messdata,
        hvqdata,
        bganimdata,
        musbanks,
        sfxbanks,
        fxdata,
    };
    (listing, assets)
}

/// Write every asset under `root`.  Directories are created first, then the
/// files are written on the worker pool.
pub fn write_assets(root: &Path, assets: &[Asset<'_>], sched: &Scheduler) -> Result<()> {
    let dirs: BTreeSet<PathBuf> = assets
        .iter()
        .filter_map(|a| root.join(&a.path).parent().map(Path::to_path_buf))
        .chain(std::iter::once(root.to_path_buf()))
        .collect();
    for dir in &dirs {
        fs::create_dir_all(dir).map_err(|e| Error::file(dir, e))?;
    }
    info!(files = assets.len(), root = %root.display(), "writing assets");
    sched.map(assets.iter().collect::<Vec<_>>(), |asset| {
        let path = root.join(&asset.path);
        fs::write(&path, asset.data).map_err(|e| Error::file(&path, e))
    })?;
    Ok(())
}

// ── Load ─────────────────────────────────────────────────────────────────────

/// Supplies asset bytes by listing path.
pub trait AssetSource: Sync {
    fn read(&self, path: &str) -> Result<Vec<u8>>;
}

/// Assets stored under a dump directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for DirSource {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.root.join(path);
        fs::read(&full).map_err(|e| Error::file(full, e))
    }
}

/// In-memory assets keyed by listing path.
impl AssetSource for BTreeMap<String, Vec<u8>> {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.get(path)
            .cloned()
            .ok_or_else(|| Error::Listing(format!("no asset at {path}")))
    }
}

/// Loaded buffers with the number of listing entries still to claim each.
struct Loaded<'l> {
    buffers: HashMap<&'l str, (usize, Vec<u8>)>,
}

impl<'l> Loaded<'l> {
    fn take(&mut self, path: &str) -> Result<Vec<u8>> {
        let (uses, data) = self
            .buffers
            .get_mut(path)
            .ok_or_else(|| Error::Listing(format!("{path} was not loaded")))?;
        *uses -= 1;
        if *uses > 0 {
            return Ok(data.clone());
        }
        self.buffers
            .remove(path)
            .map(|(_, data)| data)
            .ok_or_else(|| Error::Listing(format!("{path} was not loaded")))
    }
}

/// Order listing entries by `segindex`, requiring each index once.
fn by_segindex<'l, T>(items: &'l [T], index: impl Fn(&T) -> usize, expected: usize, what: &str) -> Result<Vec<&'l T>> {
    if items.len() != expected {
        return Err(Error::Listing(format!("{} {what} listed, descriptor has {expected}", items.len())));
    }
    let mut slots: Vec<Option<&T>> = vec![None; expected];
    for item in items {
        let i = index(item);
        match slots.get_mut(i) {
            Some(slot) if slot.is_none() => *slot = Some(item),
            _ => return Err(Error::Listing(format!("{what} segindex {i} is out of range or repeated"))),
        }
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Rebuild a [`GameData`] from a listing and its assets.
///
/// Segment names come from the descriptor and base addresses from `refs`.
/// Sequences that share a path share their data.
pub fn load_game(
    listing: &Listing,
    desc:    &Descriptor,
    format:  GameFormat,
    refs:    &SegRefTable,
    source:  &dyn AssetSource,
    sched:   &Scheduler,
) -> Result<GameData> {
    if listing.game != format {
        return Err(Error::Listing(format!("listing is for {}, descriptor is for {format}", listing.game)));
    }
    let messages = by_segindex(&listing.messdata, |m| m.segindex, desc.messdata.len(), "message archives")?;
    let banks = by_segindex(&listing.musbanks, |m| m.segindex, desc.musbanks.len(), "music banks")?;
    let sfx = by_segindex(&listing.sfxbanks, |s| s.segindex, desc.sfxbanks.len(), "sound effect banks")?;
    let anim = match (desc.animations()?, &listing.bganimdata) {
        (Some(seg), Some(paths)) => Some((seg, paths)),
        (Some(_), None) => return Err(Error::Listing(format!("{format} requires bganimdata"))),
        (None, Some(_)) => {
            warn!(game = %format, "ignoring listed bganimdata");
            None
        }
        (None, None) => None,
    };

    // Each listing path with the number of entries that take it.  Repeated
    // sequence paths within a bank become copies and are only taken once.
    let mut order: Vec<&str> = Vec::new();
    for dir in &listing.filedata {
        order.extend(dir.files.iter().map(|f| f.path.as_str()));
    }
    for m in &messages {
        match &m.body {
            MessageListingBody::Flat { path } => order.push(path),
            MessageListingBody::Directory { dirs } => order.extend(dirs.iter().map(|d| d.path.as_str())),
        }
    }
    order.extend(listing.hvqdata.iter().map(String::as_str));
    if let Some((_, paths)) = anim {
        order.extend(paths.iter().map(String::as_str));
    }
    let mut seq_firsts: Vec<HashMap<&str, usize>> = Vec::with_capacity(banks.len());
    for bank in &banks {
        order.push(&bank.soundbank);
        order.push(&bank.wavetable);
        if let Some(globals) = &bank.globals {
            order.push(globals);
        }
        let mut firsts = HashMap::new();
        for (i, seq) in bank.seqs.iter().enumerate() {
            if !firsts.contains_key(seq.path.as_str()) {
                firsts.insert(seq.path.as_str(), i);
                order.push(&seq.path);
            }
        }
        seq_firsts.push(firsts);
    }
    order.extend(sfx.iter().map(|s| s.path.as_str()));
    order.push(&listing.fxdata.path);

    let mut uses: BTreeMap<&str, usize> = BTreeMap::new();
    for &path in &order {
        *uses.entry(path).or_default() += 1;
    }
    let paths: Vec<&str> = uses.keys().copied().collect();
    info!(assets = paths.len(), jobs = sched.jobs(), "loading assets");
    let buffers = sched.map(paths.clone(), |path| source.read(path))?;
    let mut loaded = Loaded {
        buffers: paths.into_iter().zip(buffers).map(|(p, data)| (p, (uses.get(p).copied().unwrap_or(1), data))).collect(),
    };

    let files = FileArchive {
        name: desc.filedata.segname.clone(),
        base: refs.resolve(&desc.filedata.segname)?,
        dirs: listing
            .filedata
            .iter()
            .enumerate()
            .map(|(d, dir)| {
                dir.files
                    .iter()
                    .enumerate()
                    .map(|(f, file)| {
                        Ok(FileEntry { dir: d, file: f, comp_type: file.comptype, data: loaded.take(&file.path)? })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?,
    };

    let mut message_archives = Vec::with_capacity(messages.len());
    for (seg, m) in desc.messdata.iter().zip(&messages) {
        let body = match (&m.body, format.message_layout()) {
            (MessageListingBody::Flat { path }, MessageLayout::Flat) => {
                MessageBody::Flat(loaded.take(path)?)
            }
            (MessageListingBody::Directory { dirs }, MessageLayout::Directory) => {
                MessageBody::Directories(
                    dirs.iter()
                        .map(|d| Ok(MessageDir { comp_type: d.comptype, data: loaded.take(&d.path)? }))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            _ => {
                return Err(Error::Listing(format!("{}: message layout does not match {format}", seg.segname)));
            }
        };
        message_archives.push(MessageArchive {
            name:        seg.segname.clone(),
            base:        refs.resolve(&seg.segname)?,
            use_dir_map: seg.use_dirmap,
            body,
        });
    }

    let images = ImageArchive {
        name:   desc.hvqdata.segname.clone(),
        base:   refs.resolve(&desc.hvqdata.segname)?,
        blocks: listing.hvqdata.iter().map(|p| loaded.take(p)).collect::<Result<_>>()?,
    };

    let animations = match anim {
        Some((seg, paths)) => Some(ImageArchive {
            name:   seg.segname.clone(),
            base:   refs.resolve(&seg.segname)?,
            blocks: paths.iter().map(|p| loaded.take(p)).collect::<Result<_>>()?,
        }),
        None => None,
    };

    let mut music = Vec::with_capacity(banks.len());
    for ((seg, bank), firsts) in desc.musbanks.iter().zip(&banks).zip(&seq_firsts) {
        if bank.layout != format.bank_layout() {
            return Err(Error::Listing(format!("{}: bank layout does not match {format}", seg.segname)));
        }
        let globals = match (&bank.globals, bank.layout) {
            (Some(path), BankLayout::Mbf0) => loaded.take(path)?,
            (None, BankLayout::Mbf0) => {
                return Err(Error::Listing(format!("{}: MBF0 bank without globals", seg.segname)));
            }
            (_, BankLayout::Legacy) => Vec::new(),
        };
        let mut sequences = Vec::with_capacity(bank.seqs.len());
        for (i, seq) in bank.seqs.iter().enumerate() {
            let first = firsts.get(seq.path.as_str()).copied().unwrap_or(i);
            let data = if first < i {
                SequenceData::Copy(first)
            } else {
                SequenceData::Owned(loaded.take(&seq.path)?)
            };
            sequences.push(Sequence { bank: seq.bank, attrs: seq.attrs.unwrap_or([0, 0]), data });
        }
        music.push(MusicBank {
            name:       seg.segname.clone(),
            base:       refs.resolve(&seg.segname)?,
            layout:     bank.layout,
            globals,
            sound_bank: loaded.take(&bank.soundbank)?,
            wave_table: loaded.take(&bank.wavetable)?,
            sequences,
        });
    }

    let sfx = desc
        .sfxbanks
        .iter()
        .zip(&sfx)
        .map(|(seg, s)| {
            Ok(SfxBank {
                name:   seg.segname.clone(),
                base:   refs.resolve(&seg.segname)?,
                layout: format.bank_layout(),
                data:   loaded.take(&s.path)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let effects = EffectTable {
        name: desc.fxdata.segname.clone(),
        base: refs.resolve(&desc.fxdata.segname)?,
        data: loaded.take(&listing.fxdata.path)?,
    };

    debug!(files = files.file_count(), "assets loaded");
    Ok(GameData {
        format,
        files,
        messages: message_archives,
        images,
        animations,
        music,
        sfx,
        effects,
    })
}
