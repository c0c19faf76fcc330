//! Dump listing (`romdata.json`).
//!
//! Written next to the dumped assets and read back by the build.  Paths are
//! relative to the dump directory and always use `/`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::CompType;
use crate::error::{Error, Result};
use crate::format::{BankLayout, GameFormat};
use crate::segment::messages::DEFAULT_MESSAGE_COMP;

pub const LISTING_NAME: &str = "romdata.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub game:       GameFormat,
    pub filedata:   Vec<DirListing>,
    pub messdata:   Vec<MessageListing>,
    pub hvqdata:    Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bganimdata: Option<Vec<String>>,
    pub musbanks:   Vec<MusicListing>,
    pub sfxbanks:   Vec<BlobListing>,
    pub fxdata:     BlobListing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirListing {
    pub files: Vec<FileListing>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    pub path:     String,
    pub comptype: CompType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageListing {
    pub segindex: usize,
    #[serde(flatten)]
    pub body:     MessageListingBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "lowercase")]
pub enum MessageListingBody {
    Flat { path: String },
    Directory { dirs: Vec<MessageDirListing> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDirListing {
    pub path:     String,
    #[serde(default = "default_message_comp")]
    pub comptype: CompType,
}

fn default_message_comp() -> CompType {
    DEFAULT_MESSAGE_COMP
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicListing {
    pub segindex:  usize,
    pub layout:    BankLayout,
    pub soundbank: String,
    pub wavetable: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub globals:   Option<String>,
    pub seqs:      Vec<SeqListing>,
}

/// A sequence entry.  Entries sharing a path share their data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqListing {
    pub path:  String,
    pub bank:  u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<[u8; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobListing {
    #[serde(default)]
    pub segindex: usize,
    pub path:     String,
}

impl Listing {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Read `romdata.json` from a dump directory.
    pub fn read<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(LISTING_NAME);
        let data = fs::read(&path).map_err(|e| Error::file(&path, e))?;
        Self::from_bytes(&data)
    }

    /// Write `romdata.json` into a dump directory.
    pub fn write<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let path = dir.as_ref().join(LISTING_NAME);
        fs::write(&path, self.to_bytes()?).map_err(|e| Error::file(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_bodies_are_tagged() {
        let flat = MessageListing { segindex: 0, body: MessageListingBody::Flat { path: "mes.bin".into() } };
        let json = serde_json::to_value(&flat).unwrap();
        assert_eq!(json["layout"], "flat");
        assert_eq!(json["path"], "mes.bin");

        let dir: MessageListing = serde_json::from_str(
            r#"{ "segindex": 1, "layout": "directory", "dirs": [{ "path": "mes/0.bin" }] }"#,
        )
        .unwrap();
        match dir.body {
            MessageListingBody::Directory { dirs } => assert_eq!(dirs[0].comptype, CompType::Lz),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sequence_attrs_are_optional() {
        let seq: SeqListing = serde_json::from_str(r#"{ "path": "a.seq", "bank": 2 }"#).unwrap();
        assert_eq!(seq.attrs, None);
        let json = serde_json::to_string(&SeqListing { attrs: Some([1, 2]), ..seq }).unwrap();
        assert!(json.contains("\"attrs\":[1,2]"));
    }
}
