use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv6Addr};

use super::key::FixedKey;

/// Semantic type of one record in the edge stream.
/// Values must match the version 3 on-disk numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Rank {
    Version = 0,
    LocalIpProt = 1,
    ProtLocalPort = 2,
    ProtLocalPortSum = 3,
    LocalPortRemotePort = 4,
    LocalPortSumRemotePort = 5,
    LocalPortRemotePortSum = 6,
    LocalPortSumRemotePortSum = 7,
    RemotePortRemoteIp = 8,
    RemotePortSumRemoteIp = 9,
    RemotePortRemoteIpSum = 10,
    RemotePortSumRemoteIpSum = 11,
    EdgeLabel = 12,
    TotalBytes = 13,
}

impl Rank {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Version),
            1 => Some(Self::LocalIpProt),
            2 => Some(Self::ProtLocalPort),
            3 => Some(Self::ProtLocalPortSum),
            4 => Some(Self::LocalPortRemotePort),
            5 => Some(Self::LocalPortSumRemotePort),
            6 => Some(Self::LocalPortRemotePortSum),
            7 => Some(Self::LocalPortSumRemotePortSum),
            8 => Some(Self::RemotePortRemoteIp),
            9 => Some(Self::RemotePortSumRemoteIp),
            10 => Some(Self::RemotePortRemoteIpSum),
            11 => Some(Self::RemotePortSumRemoteIpSum),
            12 => Some(Self::EdgeLabel),
            13 => Some(Self::TotalBytes),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::LocalIpProt => "localIP_prot",
            Self::ProtLocalPort => "prot_localPort",
            Self::ProtLocalPortSum => "prot_localPortSum",
            Self::LocalPortRemotePort => "localPort_remotePort",
            Self::LocalPortSumRemotePort => "localPortSum_remotePort",
            Self::LocalPortRemotePortSum => "localPort_remotePortSum",
            Self::LocalPortSumRemotePortSum => "localPortSum_remotePortSum",
            Self::RemotePortRemoteIp => "remotePort_remoteIP",
            Self::RemotePortSumRemoteIp => "remotePortSum_remoteIP",
            Self::RemotePortRemoteIpSum => "remotePort_remoteIPsum",
            Self::RemotePortSumRemoteIpSum => "remotePortSum_remoteIPsum",
            Self::EdgeLabel => "edge_label",
            Self::TotalBytes => "totalBytes",
        }
    }

    /// Partition an ordinary edge belongs to. Version and pseudo-edges have none.
    pub fn partition(self) -> Option<Partition> {
        match self {
            Self::LocalIpProt => Some(Partition::Protocol),
            Self::ProtLocalPort | Self::ProtLocalPortSum => Some(Partition::LocalPort),
            Self::LocalPortRemotePort
            | Self::LocalPortSumRemotePort
            | Self::LocalPortRemotePortSum
            | Self::LocalPortSumRemotePortSum => Some(Partition::RemotePort),
            Self::RemotePortRemoteIp
            | Self::RemotePortSumRemoteIp
            | Self::RemotePortRemoteIpSum
            | Self::RemotePortSumRemoteIpSum => Some(Partition::RemoteHost),
            Self::Version | Self::EdgeLabel | Self::TotalBytes => None,
        }
    }

    pub fn left_is_summary(self) -> bool {
        matches!(
            self,
            Self::LocalPortSumRemotePort
                | Self::LocalPortSumRemotePortSum
                | Self::RemotePortSumRemoteIp
                | Self::RemotePortSumRemoteIpSum
        )
    }

    pub fn right_is_summary(self) -> bool {
        matches!(
            self,
            Self::ProtLocalPortSum
                | Self::LocalPortRemotePortSum
                | Self::LocalPortSumRemotePortSum
                | Self::RemotePortRemoteIpSum
                | Self::RemotePortSumRemoteIpSum
        )
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four layered node categories of a graphlet, in stream order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Partition {
    Protocol = 1,
    LocalPort = 2,
    RemotePort = 3,
    RemoteHost = 4,
}

impl Partition {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn left_column(self) -> Column {
        match self {
            Self::Protocol => Column::LocalIp,
            Self::LocalPort => Column::Protocol,
            Self::RemotePort => Column::LocalPort,
            Self::RemoteHost => Column::RemotePort,
        }
    }

    pub fn right_column(self) -> Column {
        match self {
            Self::Protocol => Column::Protocol,
            Self::LocalPort => Column::LocalPort,
            Self::RemotePort => Column::RemotePort,
            Self::RemoteHost => Column::RemoteIp,
        }
    }
}

/// The five rank columns of the rendered graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    LocalIp = 0,
    Protocol = 1,
    LocalPort = 2,
    RemotePort = 3,
    RemoteIp = 4,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Self::LocalIp,
        Self::Protocol,
        Self::LocalPort,
        Self::RemotePort,
        Self::RemoteIp,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::LocalIp => "localIP",
            Self::Protocol => "protocol",
            Self::LocalPort => "localPort",
            Self::RemotePort => "remotePort",
            Self::RemoteIp => "remoteIP",
        }
    }

    /// Prefix for DOT node names of this column.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::LocalIp => "lip",
            Self::Protocol => "pro",
            Self::LocalPort => "lp",
            Self::RemotePort => "rp",
            Self::RemoteIp => "rip",
        }
    }
}

// Packed node layout (low 64 bits of a field).
pub const FLAG_BIT: u64 = 1;
const PORT_SHIFT: u32 = 1;
const PROTOCOL_SHIFT: u32 = 17;
const CONTEXT_SHIFT: u32 = 25;

// Summary node layout (low 64 bits of a field).
const SUMMARY_ID_MASK: u64 = (1 << 30) - 1;
const ROLE_SHIFT: u32 = 30;
const COUNT_SHIFT: u32 = 32;

// Edge annotations live above the node value, in the `left` field.
const ANNOTATION_SHIFT: u32 = 64;

/// One 128-bit slot of an edge record, with an accessor per interpretation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Field(pub u128);

impl Field {
    pub fn from_addr(addr: IpAddr) -> Self {
        let v6 = match addr {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        };
        Self(u128::from(v6))
    }

    pub fn protocol_node(protocol: u8) -> Self {
        Self(u128::from(protocol) << PROTOCOL_SHIFT)
    }

    /// A plain port node. `context` keeps equal ports under different parents apart.
    pub fn port_node(protocol: u8, port: u16, context: u64) -> Self {
        let v = (u64::from(port) << PORT_SHIFT)
            | (u64::from(protocol) << PROTOCOL_SHIFT)
            | (context << CONTEXT_SHIFT);
        Self(u128::from(v))
    }

    pub fn summary_node(identity: u32, role: u8, count: u32) -> Self {
        let v = (u64::from(identity) & SUMMARY_ID_MASK)
            | (u64::from(role & 0b11) << ROLE_SHIFT)
            | (u64::from(count) << COUNT_SHIFT);
        Self(u128::from(v))
    }

    pub fn from_u64(v: u64) -> Self {
        Self(u128::from(v))
    }

    pub fn with_flag(self) -> Self {
        Self(self.0 | u128::from(FLAG_BIT))
    }

    /// Sets the annotation bits carried by the `left` field of partition 3/4 edges.
    pub fn with_annotation(self, bits: u8) -> Self {
        Self(self.0 | (u128::from(bits & 0b111) << ANNOTATION_SHIFT))
    }

    pub fn raw(self) -> u128 {
        self.0
    }

    pub fn low64(self) -> u64 {
        self.0 as u64
    }

    pub fn low32(self) -> u32 {
        self.0 as u32
    }

    pub fn addr(self) -> IpAddr {
        let v6 = Ipv6Addr::from(self.0);
        match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        }
    }

    pub fn flag(self) -> bool {
        self.low64() & FLAG_BIT != 0
    }

    pub fn port(self) -> u16 {
        (self.low64() >> PORT_SHIFT) as u16
    }

    pub fn protocol(self) -> u8 {
        (self.low64() >> PROTOCOL_SHIFT) as u8
    }

    pub fn summary_count(self) -> u32 {
        (self.low64() >> COUNT_SHIFT) as u32
    }

    pub fn role(self) -> u8 {
        ((self.low64() >> ROLE_SHIFT) & 0b11) as u8
    }

    /// 3-bit flow type of a partition-3 edge.
    pub fn flow_type_bits(self) -> u8 {
        ((self.0 >> ANNOTATION_SHIFT) & 0b111) as u8
    }

    /// 2-bit color code of a partition-4 edge.
    pub fn color_code(self) -> u8 {
        ((self.0 >> ANNOTATION_SHIFT) & 0b11) as u8
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Field({:#x})", self.0)
    }
}

/// One decoded stream record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub rank: Rank,
    /// On-disk graphlet number; wraps at 65536.
    pub graphlet: u16,
    pub left: Field,
    pub right: Field,
}

impl Edge {
    pub fn new(rank: Rank, graphlet: u16, left: Field, right: Field) -> Self {
        Self {
            rank,
            graphlet,
            left,
            right,
        }
    }

    pub fn left_node(&self) -> Option<NodeRef> {
        let partition = self.rank.partition()?;
        Some(NodeRef::new(
            partition.left_column(),
            self.rank.left_is_summary(),
            self.left,
        ))
    }

    pub fn right_node(&self) -> Option<NodeRef> {
        let partition = self.rank.partition()?;
        Some(NodeRef::new(
            partition.right_column(),
            self.rank.right_is_summary(),
            self.right,
        ))
    }

    /// 64-bit total carried by a totalBytes record.
    pub fn total_bytes(&self) -> u64 {
        (u64::from(self.left.low32()) << 32) | u64::from(self.right.low32())
    }
}

/// Column-qualified node identity: `[column * 2 + summary, id (16 bytes LE)]`.
pub type NodeKey = FixedKey<17>;

/// A graph node as seen from one side of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef {
    pub column: Column,
    pub summary: bool,
    pub id: u128,
}

impl NodeRef {
    /// Applies the id masking policy: summary values are used raw, plain port
    /// nodes lose the reserved flag bit, annotation bits never take part.
    pub fn new(column: Column, summary: bool, field: Field) -> Self {
        let id = match (column, summary) {
            (_, true) => u128::from(field.low64()),
            (Column::LocalIp | Column::RemoteIp, false) => field.raw(),
            (Column::Protocol, false) => u128::from(field.low64()),
            (Column::LocalPort | Column::RemotePort, false) => {
                u128::from(field.low64() & !FLAG_BIT)
            }
        };
        Self {
            column,
            summary,
            id,
        }
    }

    pub fn key(&self) -> NodeKey {
        let mut bytes = [0u8; 17];
        bytes[0] = (self.column as u8) * 2 + u8::from(self.summary);
        bytes[1..].copy_from_slice(&self.id.to_le_bytes());
        FixedKey::new(bytes)
    }

    /// DOT node name, unique within a document when `scope` differs per graphlet.
    pub fn name(&self, scope: usize) -> String {
        let kind = if self.summary { "s" } else { "" };
        format!("{}{}{}_{:x}", self.column.prefix(), kind, scope, self.id)
    }
}

/// Direction of a canonical flow relative to the local network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Inflow,
    Outflow,
    Biflow,
}

/// Direction plus the low-confidence qualifier; packs into the 3-bit flow type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FlowType {
    pub direction: Direction,
    pub low_confidence: bool,
}

impl FlowType {
    const OUTFLOW: u8 = 0b001;
    const INFLOW: u8 = 0b010;
    const LOW_CONFIDENCE: u8 = 0b100;

    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            low_confidence: false,
        }
    }

    pub fn bits(self) -> u8 {
        let dir = match self.direction {
            Direction::Outflow => Self::OUTFLOW,
            Direction::Inflow => Self::INFLOW,
            Direction::Biflow => Self::OUTFLOW | Self::INFLOW,
        };
        if self.low_confidence {
            dir | Self::LOW_CONFIDENCE
        } else {
            dir
        }
    }

    pub fn from_bits(bits: u8) -> Option<Self> {
        let direction = match bits & (Self::OUTFLOW | Self::INFLOW) {
            Self::OUTFLOW => Direction::Outflow,
            Self::INFLOW => Direction::Inflow,
            0b011 => Direction::Biflow,
            _ => return None,
        };
        Some(Self {
            direction,
            low_confidence: bits & Self::LOW_CONFIDENCE != 0,
        })
    }
}

/// Detail half of an edge label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelDetail {
    Packets(u32),
    /// Packets per flow, one decimal digit of precision.
    PacketsPerFlow(f64),
}

impl LabelDetail {
    const RATIO_BIT: u32 = 0x8000_0000;

    pub fn decode(raw: u32) -> Self {
        if raw & Self::RATIO_BIT != 0 {
            Self::PacketsPerFlow(f64::from(raw & !Self::RATIO_BIT) / 10.0)
        } else {
            Self::Packets(raw)
        }
    }
}

impl fmt::Display for LabelDetail {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Packets(n) => write!(f, "{}", n),
            Self::PacketsPerFlow(ratio) => write!(f, "{:.1}", ratio),
        }
    }
}

/// Per-graphlet statistics produced by the metadata scanner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Graphlet {
    /// Monotonic index, authoritative over the on-disk number.
    pub index: usize,
    /// Graphlet number as found in the record tags.
    pub number: u16,
    /// Index of the first edge in the stream.
    pub start_index: usize,
    pub edge_count: usize,
    pub protocols: usize,
    pub local_ports: usize,
    pub remote_ports: usize,
    pub remote_hosts: usize,
    pub total_bytes: Option<u64>,
}

impl Graphlet {
    pub fn end_index(&self) -> usize {
        self.start_index + self.edge_count
    }

    pub(crate) fn add_unique(&mut self, partition: Partition, count: usize) {
        match partition {
            Partition::Protocol => self.protocols += count,
            Partition::LocalPort => self.local_ports += count,
            Partition::RemotePort => self.remote_ports += count,
            Partition::RemoteHost => self.remote_hosts += count,
        }
    }
}
