//! Flow aggregation: canonicalizes direction and merges duplicate 5-tuples
//! into biflow aggregates, ahead of graphlet encoding.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use super::containers::{Direction, FlowType};
use super::error::GraphletError;
use super::key::FixedKey;
use super::utils::{addr_bits, in_network};

/// `[localIP (16), remoteIP (16), localPort (2), remotePort (2), protocol (1)]`.
pub type FlowKey = FixedKey<37>;

/// One flow as produced by an importer, before direction canonicalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFlow {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub packets: u64,
    pub bytes: u64,
    pub tos_flags: u8,
    /// Reverse-direction counters of a bidirectional export; zero if absent.
    pub reverse_packets: u64,
    pub reverse_bytes: u64,
}

impl RawFlow {
    fn is_bidirectional(&self) -> bool {
        self.reverse_bytes != 0 || self.reverse_packets != 0
    }
}

/// A canonical flow: "local" is always the endpoint inside the local network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FlowRecord {
    pub local_ip: IpAddr,
    pub remote_ip: IpAddr,
    pub local_port: u16,
    pub remote_port: u16,
    pub protocol: u8,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub flow_type: FlowType,
    pub tos_flags: u8,
}

impl FlowRecord {
    pub fn end_ms(&self) -> u64 {
        self.start_ms.saturating_add(self.duration_ms)
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(i64::try_from(self.start_ms).ok()?)
    }

    pub fn key(&self) -> FlowKey {
        flow_key(
            self.local_ip,
            self.remote_ip,
            self.local_port,
            self.remote_port,
            self.protocol,
        )
    }

    /// Folds a duplicate observation of the same 5-tuple into this record.
    fn merge(&mut self, other: &FlowRecord) {
        self.packet_count = self.packet_count.saturating_add(other.packet_count);
        self.byte_count = self.byte_count.saturating_add(other.byte_count);
        self.tos_flags |= other.tos_flags;

        // A later record extends to its own end; an earlier one moves the
        // start back and keeps the stored end.
        if other.start_ms > self.start_ms {
            self.duration_ms = other.end_ms().saturating_sub(self.start_ms);
        } else {
            self.duration_ms = self.end_ms().saturating_sub(other.start_ms);
            self.start_ms = other.start_ms;
        }

        if other.flow_type.direction != self.flow_type.direction
            && self.flow_type.direction != Direction::Biflow
        {
            self.flow_type.direction = Direction::Biflow;
        }
    }
}

impl fmt::Display for FlowRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let start = match self.start_time() {
            Some(t) => t.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            None => self.start_ms.to_string(),
        };
        write!(
            f,
            "{} {}:{} -> {}:{} proto:{} {:?} pkts:{} bytes:{} dur:{}ms",
            start,
            self.local_ip,
            self.local_port,
            self.remote_ip,
            self.remote_port,
            self.protocol,
            self.flow_type.direction,
            self.packet_count,
            self.byte_count,
            self.duration_ms
        )
    }
}

pub fn flow_key(
    local_ip: IpAddr,
    remote_ip: IpAddr,
    local_port: u16,
    remote_port: u16,
    protocol: u8,
) -> FlowKey {
    let mut bytes = [0u8; 37];
    bytes[..16].copy_from_slice(&addr_bits(local_ip).to_be_bytes());
    bytes[16..32].copy_from_slice(&addr_bits(remote_ip).to_be_bytes());
    bytes[32..34].copy_from_slice(&local_port.to_be_bytes());
    bytes[34..36].copy_from_slice(&remote_port.to_be_bytes());
    bytes[36] = protocol;
    FixedKey::new(bytes)
}

/// Canonicalizes `raw` against the local network.
///
/// The source endpoint is local (outflow) when it lies in `local_net`/`netmask`,
/// otherwise the destination is taken as local (inflow).
pub fn canonicalize(raw: &RawFlow, local_net: IpAddr, netmask: IpAddr) -> FlowRecord {
    let outflow = in_network(raw.src_ip, local_net, netmask);
    let (local_ip, local_port, remote_ip, remote_port) = if outflow {
        (raw.src_ip, raw.src_port, raw.dst_ip, raw.dst_port)
    } else {
        (raw.dst_ip, raw.dst_port, raw.src_ip, raw.src_port)
    };
    let direction = if raw.is_bidirectional() {
        Direction::Biflow
    } else if outflow {
        Direction::Outflow
    } else {
        Direction::Inflow
    };
    FlowRecord {
        local_ip,
        remote_ip,
        local_port,
        remote_port,
        protocol: raw.protocol,
        start_ms: raw.start_ms,
        duration_ms: raw.duration_ms,
        packet_count: raw.packets.saturating_add(raw.reverse_packets),
        byte_count: raw.bytes.saturating_add(raw.reverse_bytes),
        flow_type: FlowType::new(direction),
        tos_flags: raw.tos_flags,
    }
}

/// Keyed collection of canonical flows for one import run.
#[derive(Debug)]
pub struct FlowAggregator {
    index: HashMap<FlowKey, usize>,
    flows: Vec<FlowRecord>,
    capacity: usize,
}

impl FlowAggregator {
    /// Pre-sizes storage for at most `capacity` distinct flows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            flows: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds one imported flow, merging it into an existing record with the same
    /// canonical 5-tuple. Fails without side effects when a new flow would
    /// exceed the capacity.
    pub fn aggregate(
        &mut self,
        raw: &RawFlow,
        local_net: IpAddr,
        netmask: IpAddr,
    ) -> Result<(), GraphletError> {
        let record = canonicalize(raw, local_net, netmask);
        let key = record.key();
        match self.index.get(&key) {
            Some(&at) => {
                self.flows[at].merge(&record);
            }
            None => {
                if self.flows.len() >= self.capacity {
                    log::error!("Flow table full at {} flows.", self.capacity);
                    return Err(GraphletError::Capacity {
                        capacity: self.capacity,
                    });
                }
                self.index.insert(key, self.flows.len());
                self.flows.push(record);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Flows in first-seen order.
    pub fn flows(&self) -> &[FlowRecord] {
        &self.flows
    }

    pub fn into_flows(self) -> Vec<FlowRecord> {
        log::debug!("Aggregated {} flows.", self.flows.len());
        self.flows
    }
}
