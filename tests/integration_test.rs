use std::collections::BTreeMap;

use mprom::codec::CompType;
use mprom::format::BankLayout;
use mprom::rom::{GAME_ID_OFFSET, ROM_MAGIC};
use mprom::segment::{
    EffectTable, FileArchive, FileEntry, GameData, ImageArchive, MessageArchive, MessageBody, MessageDir,
    MusicBank, Sequence, SequenceData, SfxBank,
};
use mprom::segment::music::GLOBALS_LEN;
use mprom::segref::split_address;
use mprom::{Descriptor, Error, GameFormat, Rom, Session, SessionOptions};
use tempfile::TempDir;

const PREFIX: usize = 0x1000;
const ROM_ID: &str = "NMWE";

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn segment_names(format: GameFormat) -> Vec<&'static str> {
    let mut names = vec!["files", "mes", "hvq"];
    if format == GameFormat::Mp2 {
        names.push("anim");
    }
    names.extend(["mus", "sfx", "fx"]);
    names
}

/// One start site per segment at 0x100 + 8i, plus an end site for the
/// file archive.
fn descriptor(format: GameFormat) -> Descriptor {
    let names = segment_names(format);
    let mut segrefs: Vec<serde_json::Value> = names
        .iter()
        .enumerate()
        .map(|(i, n)| serde_json::json!({ "segname": n, "hi": 0x100 + 8 * i, "lo": 0x104 + 8 * i }))
        .collect();
    segrefs.push(serde_json::json!({ "segname": "files", "hi": 0x200, "lo": 0x204, "end": true }));

    let mut json = serde_json::json!({
        "game": format.name(),
        "segrefs": segrefs,
        "filedata": { "segname": "files", "dirs": { "1": "board" } },
        "messdata": [{ "segname": "mes", "use_dirmap": format == GameFormat::Mp3 }],
        "hvqdata": { "segname": "hvq", "names": { "0": "title" } },
        "musbanks": [{ "segname": "mus" }],
        "sfxbanks": [{ "segname": "sfx" }],
        "fxdata": { "segname": "fx" }
    });
    if format == GameFormat::Mp3 {
        json["messdir_map"] = serde_json::json!({ "1": "items" });
    }
    if format == GameFormat::Mp2 {
        json["bganimdata"] = serde_json::json!({ "segname": "anim" });
    }
    Descriptor::from_json(&json.to_string()).unwrap()
}

/// A ROM whose file archive starts at `PREFIX`.
fn base_rom(desc: &Descriptor) -> Vec<u8> {
    let mut data: Vec<u8> = (0..PREFIX).map(|i| (i * 7) as u8).collect();
    data[..4].copy_from_slice(&ROM_MAGIC.to_be_bytes());
    data[GAME_ID_OFFSET..GAME_ID_OFFSET + 4].copy_from_slice(ROM_ID.as_bytes());
    for site in &desc.segrefs {
        let value = if site.segname == "files" && !site.end { PREFIX as u32 } else { 0 };
        let (hi, lo) = split_address(value);
        let (hi_at, lo_at) = (site.hi as usize, site.lo as usize);
        data[hi_at..hi_at + 2].copy_from_slice(&hi.to_be_bytes());
        data[lo_at..lo_at + 2].copy_from_slice(&lo.to_be_bytes());
    }
    data
}

fn sfx_blob(layout: BankLayout) -> Vec<u8> {
    match layout {
        BankLayout::Mbf0 => {
            let mut data = vec![0x11u8; 0x80];
            data[0x6C..0x70].copy_from_slice(&0x74u32.to_be_bytes());
            data[0x70..0x74].copy_from_slice(&0x0Cu32.to_be_bytes());
            data
        }
        BankLayout::Legacy => {
            let mut data = vec![0x22u8; 0x50];
            data[2..4].copy_from_slice(&1u16.to_be_bytes());
            data[0x2C..0x30].copy_from_slice(&0x40u32.to_be_bytes());
            data[0x30..0x34].copy_from_slice(&0x10u32.to_be_bytes());
            data
        }
    }
}

fn game(format: GameFormat) -> GameData {
    let text: Vec<u8> = b"the quick brown fox jumps over the lazy dog ".repeat(20);
    let files = FileArchive {
        name: "files".into(),
        base: PREFIX as u32,
        dirs: vec![
            vec![
                FileEntry { dir: 0, file: 0, comp_type: CompType::Lz, data: text.clone() },
                FileEntry { dir: 0, file: 1, comp_type: CompType::Rle, data: vec![0xAA; 300] },
            ],
            vec![
                FileEntry { dir: 1, file: 0, comp_type: CompType::Slide2, data: b"MTNX".repeat(40) },
                FileEntry { dir: 1, file: 1, comp_type: CompType::None, data: vec![1, 2, 3] },
                FileEntry { dir: 1, file: 2, comp_type: CompType::Slide4, data: Vec::new() },
            ],
        ],
    };

    let body = match format.message_layout() {
        mprom::format::MessageLayout::Flat => {
            MessageBody::Flat(vec![0, 0, 0, 1, 0, 0, 0, 8, 0, 4, b'h', b'e', b'y', b'!'])
        }
        mprom::format::MessageLayout::Directory => MessageBody::Directories(vec![
            MessageDir { comp_type: CompType::Lz, data: text[..100].to_vec() },
            MessageDir { comp_type: CompType::Slide3, data: vec![7; 64] },
        ]),
    };
    let messages = vec![MessageArchive {
        name:        "mes".into(),
        base:        0,
        use_dir_map: format == GameFormat::Mp3,
        body,
    }];

    let layout = format.bank_layout();
    let mbf0 = layout == BankLayout::Mbf0;
    let attrs = if mbf0 { [5, 6] } else { [0, 0] };
    let music = vec![MusicBank {
        name:       "mus".into(),
        base:       0,
        layout,
        globals:    if mbf0 { vec![0x33; GLOBALS_LEN] } else { Vec::new() },
        sound_bank: vec![0x44; 21],
        wave_table: vec![0x55; 30],
        sequences:  vec![
            Sequence { bank: 0, attrs, data: SequenceData::Owned(vec![9; 11]) },
            Sequence { bank: 1, attrs, data: SequenceData::Copy(0) },
            Sequence { bank: 2, attrs, data: SequenceData::Owned(vec![8; 16]) },
        ],
    }];

    let mut effects = vec![0x66u8; 0x208 + 16];
    effects[4..8].copy_from_slice(&1u32.to_be_bytes());

    GameData {
        format,
        files,
        messages,
        images: ImageArchive { name: "hvq".into(), base: 0, blocks: vec![b"HVQ-MPS!".to_vec(), vec![3; 10]] },
        animations: (format == GameFormat::Mp2)
            .then(|| ImageArchive { name: "anim".into(), base: 0, blocks: vec![vec![4; 6]] }),
        music,
        sfx: vec![SfxBank { name: "sfx".into(), base: 0, layout, data: sfx_blob(layout) }],
        effects: EffectTable { name: "fx".into(), base: 0, data: effects },
    }
}

/// The same game with every segment base cleared.
fn unplaced(mut game: GameData) -> GameData {
    game.files.base = 0;
    game.messages.iter_mut().for_each(|m| m.base = 0);
    game.images.base = 0;
    if let Some(anim) = game.animations.as_mut() {
        anim.base = 0;
    }
    game.music.iter_mut().for_each(|m| m.base = 0);
    game.sfx.iter_mut().for_each(|s| s.base = 0);
    game.effects.base = 0;
    game
}

fn session(format: GameFormat) -> Session {
    let desc = descriptor(format);
    let rom = Rom::from_bytes(base_rom(&desc)).unwrap();
    Session::new(rom, desc, SessionOptions { jobs: 2 }).unwrap()
}

// ── Build / extract ──────────────────────────────────────────────────────────

fn build_then_extract(format: GameFormat) {
    let session = session(format);
    let original = game(format);
    let built = session.build(&original).unwrap();
    // Only the patch sites below 0x210 may differ from the input prefix.
    assert_eq!(&built.image[0x210..PREFIX], &session.rom().as_bytes()[0x210..PREFIX]);

    let rom = Rom::from_bytes(built.image.clone()).unwrap();
    let rebuilt = Session::new(rom, session.descriptor().clone(), SessionOptions::default()).unwrap();
    assert_eq!(rebuilt.refs().resolve("files").unwrap(), PREFIX as u32);
    let extracted = rebuilt.extract().unwrap();
    assert_eq!(extracted.files.base, PREFIX as u32);
    assert_eq!(unplaced(extracted), unplaced(original));
}

#[test]
fn mp1_build_then_extract() {
    build_then_extract(GameFormat::Mp1);
}

#[test]
fn mp2_build_then_extract() {
    build_then_extract(GameFormat::Mp2);
}

#[test]
fn mp3_build_then_extract() {
    build_then_extract(GameFormat::Mp3);
}

#[test]
fn builds_are_deterministic() {
    let session = session(GameFormat::Mp3);
    let game = game(GameFormat::Mp3);
    let first = session.build(&game).unwrap();
    let second = session.build(&game).unwrap();
    assert_eq!(first.digest(), second.digest());
    assert_eq!(first.image, second.image);
}

#[test]
fn segments_are_aligned() {
    let session = session(GameFormat::Mp2);
    let built = session.build(&game(GameFormat::Mp2)).unwrap();
    for r in built.refs.iter() {
        assert_eq!(r.value % 16, 0, "{} end={} at {:#x}", r.name, r.end, r.value);
    }
    assert_eq!(built.image.len() % 16, 0);
    let files_end = built.refs.iter().find(|r| r.name == "files" && r.end).unwrap();
    let mes = built.refs.resolve("mes").unwrap();
    assert_eq!(files_end.value, mes);
}

#[test]
fn file_archive_tables() {
    let session = session(GameFormat::Mp1);
    let mut game = game(GameFormat::Mp1);
    game.files.dirs.truncate(1);
    let image = session.build(&game).unwrap().image;
    let word = |at: usize| u32::from_be_bytes(image[at..at + 4].try_into().unwrap()) as usize;

    assert_eq!(word(PREFIX), 1);
    let dir = PREFIX + word(PREFIX + 4);
    assert_eq!(word(dir), 2);
    for (i, original) in game.files.dirs[0].iter().enumerate() {
        let block = mprom::decode_block(&image[dir + word(dir + 4 + 4 * i)..]).unwrap();
        assert_eq!(block.data, original.data);
        assert_eq!(block.comp_type, original.comp_type);
        assert_eq!(block.block_len % 2, 0);
    }
}

#[test]
fn inconsistent_segrefs_are_rejected() {
    let mut desc = descriptor(GameFormat::Mp1);
    desc.segrefs.push(mprom::segref::SegRefEntry { segname: "mes".into(), hi: 0x300, lo: 0x304, end: false });
    let mut data = base_rom(&desc);
    data[0x301] = 0x40;
    let rom = Rom::from_bytes(data).unwrap();
    let err = Session::new(rom, desc, SessionOptions::default()).unwrap_err();
    assert!(matches!(err, Error::SegRefMismatch { ref name, .. } if name == "mes"));
    assert_eq!(err.kind(), mprom::ErrorKind::DescriptorInconsistency);
}

#[test]
fn missing_prefix_is_malformed() {
    let desc = descriptor(GameFormat::Mp1);
    let mut data = base_rom(&desc);
    data.truncate(0x800);
    let session = Session::new(Rom::from_bytes(data).unwrap(), desc, SessionOptions::default()).unwrap();
    assert!(matches!(session.build(&game(GameFormat::Mp1)), Err(Error::Malformed(_))));
}

// ── Dump / load ──────────────────────────────────────────────────────────────

#[test]
fn dump_then_load() {
    for format in [GameFormat::Mp1, GameFormat::Mp2, GameFormat::Mp3] {
        let session = session(format);
        let original = game(format);
        let dir = TempDir::new().unwrap();

        let listing = session.dump(&original, dir.path()).unwrap();
        assert!(dir.path().join("romdata.json").is_file());
        assert!(dir.path().join("filedata/board/0.mot").is_file());
        assert!(dir.path().join("filedata/0/1.bin").is_file());
        assert!(dir.path().join("hvqdata/title.bghvq").is_file());
        assert!(dir.path().join("musdata/mus/soundbank.ctl").is_file());
        assert_eq!(listing.musbanks[0].seqs[1].path, listing.musbanks[0].seqs[0].path);
        assert_eq!(listing.musbanks[0].seqs[2].path, "musdata/mus/seqs/1.seq");
        assert_eq!(dir.path().join("musdata/mus/globals.bin").is_file(), format != GameFormat::Mp1);
        match format {
            GameFormat::Mp3 => assert!(dir.path().join("mes/items.bin").is_file()),
            _ => assert!(dir.path().join("mes.bin").is_file()),
        }

        let loaded = session.load_assets(dir.path()).unwrap();
        assert_eq!(unplaced(loaded), unplaced(original));
    }
}

#[test]
fn load_rejects_wrong_game() {
    let session = session(GameFormat::Mp1);
    let original = game(GameFormat::Mp1);
    let dir = TempDir::new().unwrap();
    let mut listing = session.dump(&original, dir.path()).unwrap();
    listing.game = GameFormat::Mp3;
    assert!(matches!(
        session.load_from(&listing, &mprom::assets::DirSource::new(dir.path())),
        Err(Error::Listing(_))
    ));
}

#[test]
fn load_from_memory() {
    let session = session(GameFormat::Mp2);
    let original = game(GameFormat::Mp2);
    let (listing, assets) = mprom::assets::collect(&original, session.descriptor());
    let source: BTreeMap<String, Vec<u8>> = assets.iter().map(|a| (a.path.clone(), a.data.to_vec())).collect();
    let loaded = session.load_from(&listing, &source).unwrap();
    assert_eq!(unplaced(loaded), unplaced(original));

    let mut missing = source.clone();
    missing.remove("fx.bin");
    assert!(session.load_from(&listing, &missing).is_err());
}

#[test]
fn open_reads_descriptor_by_rom_id() {
    let dir = TempDir::new().unwrap();
    let desc = descriptor(GameFormat::Mp1);
    let rom_path = dir.path().join("base.z64");
    std::fs::write(&rom_path, base_rom(&desc)).unwrap();
    std::fs::write(dir.path().join(format!("game_{ROM_ID}.json")), desc.to_json().unwrap()).unwrap();

    let session = Session::open(&rom_path, dir.path(), SessionOptions::default()).unwrap();
    assert_eq!(session.format(), GameFormat::Mp1);
    assert!(Session::open(&rom_path, dir.path().join("missing"), SessionOptions::default()).is_err());
}
