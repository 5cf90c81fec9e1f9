//! Minimal GBX header reader
//!
//! Only the uncompressed user-data header is read: for maps the uid, name,
//! environment, medal times and mode; for replays the map uid, finish time
//! and player. Bodies are never decompressed.

mod reader;

use reader::ChunkReader;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const MAP_CLASS_ID: u32 = 0x0304_3000;
pub const REPLAY_CLASS_ID: u32 = 0x0309_3000;

const LEGACY_MAP_CLASS_ID: u32 = 0x2400_3000;
const LEGACY_REPLAY_CLASS_ID: u32 = 0x2403_F000;

const MAP_DESCRIPTION_CHUNK: u32 = 0x0304_3002;
const MAP_COMMON_CHUNK: u32 = 0x0304_3003;
const REPLAY_VERSION_CHUNK: u32 = 0x0309_3000;

const HEAVY_CHUNK_FLAG: u32 = 0x8000_0000;

#[derive(Debug, Error, PartialEq)]
pub enum GbxError {
    #[error("Not a GBX file")]
    BadMagic,

    #[error("Unexpected end of data at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("Unsupported GBX content: {0}")]
    Unsupported(String),

    #[error("Expected class {expected:#010x}, found {found:#010x}")]
    WrongClass { expected: u32, found: u32 },

    #[error("Invalid lookback string index {index:#x} at offset {offset}")]
    BadLookback { index: u32, offset: usize },

    #[error("Header chunk {0:#010x} is missing")]
    MissingChunk(u32),
}

/// Game mode stored in the map description chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapMode {
    Race,
    Platform,
    Puzzle,
    Crazy,
    Shortcut,
    Stunts,
    Script,
}

impl MapMode {
    fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => MapMode::Race,
            1 => MapMode::Platform,
            2 => MapMode::Puzzle,
            3 => MapMode::Crazy,
            4 => MapMode::Shortcut,
            5 => MapMode::Stunts,
            6 => MapMode::Script,
            _ => return None,
        })
    }
}

/// Fields read from a map header
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapHeader {
    pub uid: String,
    pub name: String,
    /// Raw collection name, e.g. "Alpine" or "Stadium"
    pub collection: String,
    pub author_login: String,
    pub bronze_time: Option<Duration>,
    pub silver_time: Option<Duration>,
    pub gold_time: Option<Duration>,
    pub author_time: Option<Duration>,
    pub author_score: Option<u32>,
    pub mode: Option<MapMode>,
    pub cost: Option<u32>,
    pub is_multilap: Option<bool>,
    pub checkpoints: Option<u32>,
    pub laps: Option<u32>,
}

/// Fields read from a replay header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayHeader {
    pub map_uid: String,
    pub time: Option<Duration>,
    pub player_nickname: String,
    pub player_login: Option<String>,
}

struct HeaderChunk<'a> {
    id: u32,
    data: &'a [u8],
}

struct RawHeader<'a> {
    class_id: u32,
    chunks: Vec<HeaderChunk<'a>>,
}

impl RawHeader<'_> {
    fn chunk(&self, id: u32) -> Option<&[u8]> {
        self.chunks.iter().find(|c| c.id == id).map(|c| c.data)
    }
}

fn normalize_class(id: u32) -> u32 {
    match id {
        LEGACY_MAP_CLASS_ID => MAP_CLASS_ID,
        LEGACY_REPLAY_CLASS_ID => REPLAY_CLASS_ID,
        other => other,
    }
}

fn read_raw_header(bytes: &[u8]) -> Result<RawHeader<'_>, GbxError> {
    let mut r = ChunkReader::new(bytes);
    if r.bytes(3).map_err(|_| GbxError::BadMagic)? != b"GBX" {
        return Err(GbxError::BadMagic);
    }

    let version = r.u16()?;
    if version < 6 {
        return Err(GbxError::Unsupported(format!("header version {version}")));
    }
    // format, reference compression, body compression, unknown
    r.bytes(4)?;

    let class_id = normalize_class(r.u32()?);
    let user_data_size = r.u32()? as usize;
    if user_data_size == 0 {
        return Ok(RawHeader {
            class_id,
            chunks: Vec::new(),
        });
    }

    let mut user = ChunkReader::new(r.bytes(user_data_size)?);
    let count = user.u32()? as usize;
    let mut entries = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let raw_id = user.u32()?;
        let id = normalize_class(raw_id & 0xFFFF_F000) | (raw_id & 0xFFF);
        let size = (user.u32()? & !HEAVY_CHUNK_FLAG) as usize;
        entries.push((id, size));
    }

    let mut chunks = Vec::with_capacity(entries.len());
    for (id, size) in entries {
        chunks.push(HeaderChunk {
            id,
            data: user.bytes(size)?,
        });
    }

    Ok(RawHeader { class_id, chunks })
}

fn expect_class(header: &RawHeader<'_>, expected: u32) -> Result<(), GbxError> {
    if header.class_id != expected {
        return Err(GbxError::WrongClass {
            expected,
            found: header.class_id,
        });
    }
    Ok(())
}

fn time(raw: u32) -> Option<Duration> {
    if raw == u32::MAX {
        None
    } else {
        Some(Duration::from_millis(raw as u64))
    }
}

/// Read the header of a map (`.Challenge.Gbx`) file
pub fn read_map_header(bytes: &[u8]) -> Result<MapHeader, GbxError> {
    let raw = read_raw_header(bytes)?;
    expect_class(&raw, MAP_CLASS_ID)?;

    let mut header = MapHeader::default();

    let common = raw
        .chunk(MAP_COMMON_CHUNK)
        .ok_or(GbxError::MissingChunk(MAP_COMMON_CHUNK))?;
    let mut r = ChunkReader::new(common);
    let _version = r.u8()?;
    let (uid, collection, author) = r.meta()?;
    header.uid = uid;
    header.collection = collection;
    header.author_login = author;
    header.name = r.string()?;

    if let Some(description) = raw.chunk(MAP_DESCRIPTION_CHUNK) {
        read_map_description(description, &mut header)?;
    }

    Ok(header)
}

fn read_map_description(data: &[u8], header: &mut MapHeader) -> Result<(), GbxError> {
    let mut r = ChunkReader::new(data);
    let version = r.u8()?;
    if version < 3 {
        r.meta()?;
        r.string()?;
    }
    r.u32()?;
    if version >= 1 {
        header.bronze_time = time(r.u32()?);
        header.silver_time = time(r.u32()?);
        header.gold_time = time(r.u32()?);
        header.author_time = time(r.u32()?);
        if version == 2 {
            r.u8()?;
        }
        if version >= 4 {
            header.cost = Some(r.u32()?);
        }
        if version >= 5 {
            header.is_multilap = Some(r.bool()?);
        }
        if version == 6 {
            r.bool()?;
        }
        if version >= 7 {
            header.mode = MapMode::from_raw(r.u32()?);
        }
        if version >= 9 {
            r.u32()?;
        }
        if version >= 10 {
            header.author_score = Some(r.u32()?);
        }
        if version >= 11 {
            r.u32()?;
        }
        if version >= 12 {
            r.bool()?;
        }
        if version >= 13 {
            header.checkpoints = Some(r.u32()?);
            header.laps = Some(r.u32()?);
        }
    }
    Ok(())
}

/// Read the header of a replay (`.Replay.Gbx`) file
pub fn read_replay_header(bytes: &[u8]) -> Result<ReplayHeader, GbxError> {
    let raw = read_raw_header(bytes)?;
    expect_class(&raw, REPLAY_CLASS_ID)?;

    let data = raw
        .chunk(REPLAY_VERSION_CHUNK)
        .ok_or(GbxError::MissingChunk(REPLAY_VERSION_CHUNK))?;
    let mut r = ChunkReader::new(data);
    let version = r.u32()?;
    if version < 2 {
        return Err(GbxError::Unsupported(format!("replay version {version}")));
    }

    let (map_uid, _, _) = r.meta()?;
    let time = time(r.u32()?);
    let player_nickname = r.string()?;
    let player_login = if version >= 6 {
        Some(r.string()?)
    } else {
        None
    };

    Ok(ReplayHeader {
        map_uid,
        time,
        player_nickname,
        player_login,
    })
}
