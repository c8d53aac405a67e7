//! Error taxonomy for graphlet decoding and flow aggregation.
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::containers::Rank;

/// Broad class of a [`GraphletError`]. All of them are fatal for the operation
/// that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Capacity,
    Io,
}

#[derive(Error, Debug)]
pub enum GraphletError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: file is empty")]
    EmptyFile { path: PathBuf },

    #[error("stream length {len} is not a multiple of the 48-byte edge record (valid prefix ends at byte {valid})")]
    TruncatedStream { len: usize, valid: usize },

    #[error("graphlet version marker missing at start of stream")]
    MissingVersion,

    #[error("unsupported graphlet format version {version}")]
    UnsupportedVersion { version: u64 },

    #[error("edge {index} (byte offset {offset}): unknown rank value {raw:#x}")]
    UnknownRank { index: usize, offset: usize, raw: u8 },

    #[error("graphlet {graphlet}, edge {index} (byte offset {offset}): first edge has rank {found}, expected localIP_prot")]
    BadFirstRank {
        graphlet: usize,
        index: usize,
        offset: usize,
        found: Rank,
    },

    #[error("graphlet {graphlet}, edge {index} (byte offset {offset}): partition {found} follows partition {current}")]
    PartitionOrder {
        graphlet: usize,
        index: usize,
        offset: usize,
        current: u8,
        found: u8,
    },

    #[error("graphlet {graphlet}, edge {index} (byte offset {offset}): misplaced {rank} record")]
    MisplacedRecord {
        graphlet: usize,
        index: usize,
        offset: usize,
        rank: Rank,
    },

    #[error("edge {index} (byte offset {offset}) lies inside graphlet number {number}, not at its start")]
    NotGraphletStart {
        number: u16,
        index: usize,
        offset: usize,
    },

    #[error("record index {index} is outside the stream ({len} records)")]
    OutOfRange { index: usize, len: usize },

    #[error("formatting output: {0}")]
    Render(#[from] std::fmt::Error),

    #[error("flow table full: capacity of {capacity} flows reached")]
    Capacity { capacity: usize },
}

impl GraphletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::Write { .. } | Self::EmptyFile { .. } | Self::Render(_) => {
                ErrorKind::Io
            }
            Self::Capacity { .. } => ErrorKind::Capacity,
            _ => ErrorKind::Format,
        }
    }
}
