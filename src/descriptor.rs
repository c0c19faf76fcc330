//! Game descriptor: segment names, name maps and patch sites for one ROM.
//!
//! Stored as `game_<ROMID>.json` in the descriptor directory:
//! ```json
//! {
//!   "game": "mp1",
//!   "segrefs":    [{ "segname": "filedata", "hi": 1234, "lo": 1238, "end": false }],
//!   "filedata":   { "segname": "filedata", "dirs": { "0": "board" } },
//!   "messdata":   [{ "segname": "mesdata", "use_dirmap": false }],
//!   "hvqdata":    { "segname": "hvqdata", "names": {} },
//!   "musbanks":   [{ "segname": "musbank0" }],
//!   "sfxbanks":   [{ "segname": "sfxbank0" }],
//!   "fxdata":     { "segname": "fxdata" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::format::GameFormat;
use crate::segref::{SegRefEntry, SegRefTable};

pub type NameMap = BTreeMap<u32, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub game:        String,
    #[serde(default)]
    pub segrefs:     Vec<SegRefEntry>,
    pub filedata:    NamedSegment,
    #[serde(default)]
    pub messdata:    Vec<MessageSegment>,
    #[serde(default)]
    pub messdir_map: NameMap,
    pub hvqdata:     NamedSegment,
    #[serde(default)]
    pub bganimdata:  Option<NamedSegment>,
    #[serde(default)]
    pub musbanks:    Vec<Segment>,
    #[serde(default)]
    pub sfxbanks:    Vec<Segment>,
    pub fxdata:      Segment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub segname: String,
}

/// A segment whose items may carry human-readable names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedSegment {
    pub segname: String,
    #[serde(default, alias = "dirs")]
    pub names:   NameMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSegment {
    pub segname:    String,
    #[serde(default)]
    pub use_dirmap: bool,
}

impl NamedSegment {
    /// The mapped name of item `index`, or the index itself.
    pub fn item_name(&self, index: usize) -> String {
        lookup(&self.names, index)
    }
}

fn lookup(map: &NameMap, index: usize) -> String {
    u32::try_from(index)
        .ok()
        .and_then(|i| map.get(&i))
        .cloned()
        .unwrap_or_else(|| index.to_string())
}

impl Descriptor {
    /// Load `game_<rom_id>.json` from `dir`.
    pub fn load<P: AsRef<Path>>(dir: P, rom_id: &str) -> Result<Self> {
        let path = dir.as_ref().join(format!("game_{rom_id}.json"));
        let text = fs::read_to_string(&path).map_err(|e| Error::file(&path, e))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn format(&self) -> Result<GameFormat> {
        GameFormat::from_name(&self.game)
            .ok_or_else(|| Error::Descriptor(format!("unknown game {:?}", self.game)))
    }

    /// The animation archive, when this game has one.
    pub fn animations(&self) -> Result<Option<&NamedSegment>> {
        let format = self.format()?;
        match (&self.bganimdata, format.has_animations()) {
            (Some(seg), true) => Ok(Some(seg)),
            (None, true) => Err(Error::Descriptor(format!("{format} requires bganimdata"))),
            (_, false) => Ok(None),
        }
    }

    /// Name of message directory `index` of an archive.
    pub fn message_dir_name(&self, use_dirmap: bool, index: usize) -> String {
        if use_dirmap {
            lookup(&self.messdir_map, index)
        } else {
            index.to_string()
        }
    }

    /// Every segment name the build lays out, in layout order.
    pub fn segment_names(&self) -> Vec<&str> {
        let mut names = vec![self.filedata.segname.as_str()];
        names.extend(self.messdata.iter().map(|m| m.segname.as_str()));
        names.push(&self.hvqdata.segname);
        if let Ok(Some(anim)) = self.animations() {
            names.push(&anim.segname);
        }
        names.extend(self.musbanks.iter().map(|m| m.segname.as_str()));
        names.extend(self.sfxbanks.iter().map(|m| m.segname.as_str()));
        names.push(&self.fxdata.segname);
        names
    }

    /// Structural checks, run before any decode or build work.
    pub fn validate(&self, refs: &SegRefTable) -> Result<GameFormat> {
        let format = self.format()?;
        if self.messdata.is_empty() {
            return Err(Error::Descriptor("no message archives".into()));
        }
        if self.musbanks.is_empty() {
            return Err(Error::Descriptor("no music banks".into()));
        }
        if self.sfxbanks.is_empty() {
            return Err(Error::Descriptor("no sound effect banks".into()));
        }
        if !self.messdir_map.is_empty() && !format.allows_message_dir_map() {
            return Err(Error::Descriptor(format!("messdir_map is not supported for {format}")));
        }
        if self.bganimdata.is_some() && !format.has_animations() {
            warn!(game = %format, "ignoring bganimdata");
        }
        self.animations()?;
        for name in self.segment_names() {
            if !refs.contains(name) {
                return Err(Error::UnknownSegment(name.to_owned()));
            }
        }
        Ok(format)
    }
}
