//! Per-game layout variants.
//!
//! The three supported games share every segment kind but differ in how a
//! few of them are laid out.  The variant is picked once from the
//! descriptor and every segment asks it instead of checking the game.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameFormat {
    Mp1,
    Mp2,
    Mp3,
}

/// Message archive shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLayout {
    /// Raw blob copied verbatim.
    Flat,
    /// Count/offset table of compressed directories.
    Directory,
}

/// Music and sound effect bank shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankLayout {
    /// `S2` header, sound bank and wave table ahead of the sequences.
    Legacy,
    /// `MBF0` header, sequences ahead of the sound bank and wave table.
    Mbf0,
}

impl GameFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mp1" => Some(GameFormat::Mp1),
            "mp2" => Some(GameFormat::Mp2),
            "mp3" => Some(GameFormat::Mp3),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GameFormat::Mp1 => "mp1",
            GameFormat::Mp2 => "mp2",
            GameFormat::Mp3 => "mp3",
        }
    }

    pub fn message_layout(self) -> MessageLayout {
        match self {
            GameFormat::Mp3 => MessageLayout::Directory,
            GameFormat::Mp1 | GameFormat::Mp2 => MessageLayout::Flat,
        }
    }

    pub fn bank_layout(self) -> BankLayout {
        match self {
            GameFormat::Mp1 => BankLayout::Legacy,
            GameFormat::Mp2 | GameFormat::Mp3 => BankLayout::Mbf0,
        }
    }

    /// Whether the ROM carries a background animation archive.
    pub fn has_animations(self) -> bool {
        self == GameFormat::Mp2
    }

    /// Whether message directories may be given names.
    pub fn allows_message_dir_map(self) -> bool {
        self.message_layout() == MessageLayout::Directory
    }
}

impl fmt::Display for GameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
