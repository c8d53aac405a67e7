//! The on-disk graphlet edge stream.
//!
//! A stream is a flat run of 48-byte records, three little-endian 128-bit
//! fields each: `tag`, `left`, `right`. The tag carries the rank in its low
//! 4 bits and the graphlet number in the 16 bits above.
use super::containers::{Edge, Field, Rank};
use super::error::GraphletError;

pub const FIELD_SIZE: usize = 16;
pub const RECORD_SIZE: usize = 3 * FIELD_SIZE;

/// The only graphlet format version the decoder accepts.
pub const FORMAT_VERSION: u64 = 3;

const RANK_MASK: u128 = 0xf;
const GRAPHLET_SHIFT: u32 = 4;

/// Read-only, validated view over edge records. Cheap to copy and share.
#[derive(Clone, Copy, Debug)]
pub struct EdgeStream<'a> {
    bytes: &'a [u8],
}

impl<'a> EdgeStream<'a> {
    /// Wraps `bytes`, refusing anything that is not a whole number of records.
    pub fn new(bytes: &'a [u8]) -> Result<Self, GraphletError> {
        if bytes.len() % RECORD_SIZE != 0 {
            return Err(GraphletError::TruncatedStream {
                len: bytes.len(),
                valid: bytes.len() - bytes.len() % RECORD_SIZE,
            });
        }
        Ok(Self { bytes })
    }

    /// Number of records, including the version header.
    pub fn len(&self) -> usize {
        self.bytes.len() / RECORD_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decodes record `index`.
    pub fn edge(&self, index: usize) -> Result<Edge, GraphletError> {
        let offset = index * RECORD_SIZE;
        let record = self
            .bytes
            .get(offset..offset + RECORD_SIZE)
            .ok_or(GraphletError::OutOfRange {
                index,
                len: self.len(),
            })?;
        let tag = read_field(record, 0);
        let raw = (tag & RANK_MASK) as u8;
        let rank = Rank::from_u8(raw).ok_or(GraphletError::UnknownRank {
            index,
            offset,
            raw,
        })?;
        Ok(Edge {
            rank,
            graphlet: (tag >> GRAPHLET_SHIFT) as u16,
            left: Field(read_field(record, FIELD_SIZE)),
            right: Field(read_field(record, 2 * FIELD_SIZE)),
        })
    }

    /// Checks the version header and returns the index of the first graphlet record.
    ///
    /// A duplicated version record directly after the first one is skipped.
    pub fn header_len(&self) -> Result<usize, GraphletError> {
        if self.is_empty() {
            return Err(GraphletError::MissingVersion);
        }
        let first = self.edge(0)?;
        if first.rank != Rank::Version {
            return Err(GraphletError::MissingVersion);
        }
        check_version(&first)?;
        if self.len() > 1 {
            let second = self.edge(1)?;
            if second.rank == Rank::Version {
                check_version(&second)?;
                log::debug!("Skipping repeated version record.");
                return Ok(2);
            }
        }
        Ok(1)
    }
}

fn check_version(edge: &Edge) -> Result<(), GraphletError> {
    let version = edge.left.low64();
    if version != FORMAT_VERSION {
        return Err(GraphletError::UnsupportedVersion { version });
    }
    Ok(())
}

pub fn byte_offset(index: usize) -> usize {
    index * RECORD_SIZE
}

fn read_field(record: &[u8], at: usize) -> u128 {
    let mut buf = [0u8; FIELD_SIZE];
    buf.copy_from_slice(&record[at..at + FIELD_SIZE]);
    u128::from_le_bytes(buf)
}

/// Encodes one record.
pub fn encode_edge(edge: &Edge) -> [u8; RECORD_SIZE] {
    let tag = (edge.rank as u128) | (u128::from(edge.graphlet) << GRAPHLET_SHIFT);
    let mut out = [0u8; RECORD_SIZE];
    out[..FIELD_SIZE].copy_from_slice(&tag.to_le_bytes());
    out[FIELD_SIZE..2 * FIELD_SIZE].copy_from_slice(&edge.left.raw().to_le_bytes());
    out[2 * FIELD_SIZE..].copy_from_slice(&edge.right.raw().to_le_bytes());
    out
}

/// The version header record a stream must start with.
pub fn version_edge() -> Edge {
    Edge::new(
        Rank::Version,
        0,
        Field::from_u64(FORMAT_VERSION),
        Field::default(),
    )
}

/// Encodes a version header followed by `edges`.
pub fn encode_stream(edges: &[Edge]) -> Vec<u8> {
    let mut out = Vec::with_capacity((edges.len() + 1) * RECORD_SIZE);
    out.extend_from_slice(&encode_edge(&version_edge()));
    for edge in edges {
        out.extend_from_slice(&encode_edge(edge));
    }
    out
}
