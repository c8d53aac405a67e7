//! Metadata scanner: one forward pass that indexes every graphlet in a stream.
use std::collections::HashSet;

use super::containers::{Edge, Graphlet, NodeKey, Partition};
use super::error::GraphletError;
use super::stream::EdgeStream;
use super::walk::{GraphletVisitor, WalkMode, Walker};

/// Edge cadence of progress reports.
pub const PROGRESS_INTERVAL: usize = 100_000;

/// Scans `stream` and returns one [`Graphlet`] per contiguous run of records
/// sharing a graphlet number, in stream order.
pub fn scan(stream: &EdgeStream) -> Result<Vec<Graphlet>, GraphletError> {
    scan_with_progress(stream, PROGRESS_INTERVAL, |_, _| {})
}

/// Like [`scan`], calling `progress(done, total)` every `every` records.
pub fn scan_with_progress<F>(
    stream: &EdgeStream,
    every: usize,
    progress: F,
) -> Result<Vec<Graphlet>, GraphletError>
where
    F: FnMut(usize, usize),
{
    log::info!("Scanning {} edge records.", stream.len());
    let start = stream.header_len()?;

    let mut collector = MetadataCollector {
        graphlets: Vec::with_capacity(stream.len() / 3 + 1),
        current: None,
        nodes: HashSet::new(),
        total: stream.len(),
        every: every.max(1),
        progress,
    };
    Walker::new(*stream, WalkMode::All).run(start, &mut collector)?;

    log::info!("Found {} graphlets.", collector.graphlets.len());
    Ok(collector.graphlets)
}

struct MetadataCollector<F> {
    graphlets: Vec<Graphlet>,
    current: Option<Graphlet>,
    /// Unique right-hand nodes of the open partition.
    nodes: HashSet<NodeKey>,
    total: usize,
    every: usize,
    progress: F,
}

impl<F: FnMut(usize, usize)> MetadataCollector<F> {
    fn tick(&mut self, index: usize) {
        if index % self.every == 0 {
            log::debug!("Scanned {}/{} edges.", index, self.total);
            (self.progress)(index, self.total);
        }
    }
}

impl<F: FnMut(usize, usize)> GraphletVisitor for MetadataCollector<F> {
    fn begin_graphlet(&mut self, index: usize, edge: &Edge) -> Result<(), GraphletError> {
        self.current = Some(Graphlet {
            index: self.graphlets.len(),
            number: edge.graphlet,
            start_index: index,
            ..Default::default()
        });
        Ok(())
    }

    fn edge(
        &mut self,
        index: usize,
        edge: &Edge,
        _partition: Partition,
    ) -> Result<(), GraphletError> {
        self.tick(index);
        if let Some(node) = edge.right_node() {
            self.nodes.insert(node.key());
        }
        Ok(())
    }

    fn edge_label(&mut self, index: usize, _edge: &Edge) -> Result<(), GraphletError> {
        self.tick(index);
        Ok(())
    }

    fn total_bytes(&mut self, index: usize, total: u64) -> Result<(), GraphletError> {
        self.tick(index);
        if let Some(graphlet) = self.current.as_mut() {
            graphlet.total_bytes = Some(total);
        }
        Ok(())
    }

    fn close_partition(&mut self, partition: Partition) -> Result<(), GraphletError> {
        if let Some(graphlet) = self.current.as_mut() {
            graphlet.add_unique(partition, self.nodes.len());
        }
        self.nodes.clear();
        Ok(())
    }

    fn close_graphlet(&mut self, end_index: usize) -> Result<(), GraphletError> {
        if let Some(mut graphlet) = self.current.take() {
            graphlet.edge_count = end_index - graphlet.start_index;
            log::trace!(
                "Graphlet {} ({} edges from {})",
                graphlet.index,
                graphlet.edge_count,
                graphlet.start_index
            );
            self.graphlets.push(graphlet);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphlet::containers::{Field, Rank};
    use crate::graphlet::error::ErrorKind;
    use crate::graphlet::stream::{encode_edge, encode_stream, RECORD_SIZE};

    fn local_ip() -> Field {
        Field::from_addr("192.168.1.10".parse().unwrap())
    }

    fn graphlet(number: u16, remote_hosts: &[&str]) -> Vec<Edge> {
        let tcp = Field::protocol_node(6);
        let port = Field::port_node(6, 22, 0);
        let remote = Field::port_node(6, 50_000, 22);
        let mut edges = vec![
            Edge::new(Rank::LocalIpProt, number, local_ip(), tcp),
            Edge::new(Rank::ProtLocalPort, number, tcp, port.with_flag()),
            Edge::new(Rank::LocalPortRemotePort, number, port.with_annotation(0b010), remote),
        ];
        for host in remote_hosts {
            edges.push(Edge::new(
                Rank::RemotePortRemoteIp,
                number,
                remote,
                Field::from_addr(host.parse().unwrap()),
            ));
        }
        edges
    }

    #[test]
    fn test_graphlets_tile_the_stream() {
        let mut edges = graphlet(0, &["1.1.1.1", "2.2.2.2"]);
        edges.extend(graphlet(1, &["3.3.3.3"]));
        edges.extend(graphlet(2, &["4.4.4.4", "5.5.5.5", "4.4.4.4"]));
        let bytes = encode_stream(&edges);
        let stream = EdgeStream::new(&bytes).unwrap();

        let graphlets = scan(&stream).unwrap();
        assert_eq!(graphlets.len(), 3);
        assert_eq!(graphlets.iter().map(|g| g.edge_count).sum::<usize>(), edges.len());
        let mut expected_start = 1;
        for (i, g) in graphlets.iter().enumerate() {
            assert_eq!(g.index, i);
            assert_eq!(g.start_index, expected_start);
            expected_start = g.end_index();
        }
        assert_eq!(expected_start, stream.len());
        assert_eq!(graphlets[2].remote_hosts, 2);
        assert_eq!(graphlets[2].protocols, 1);
    }

    #[test]
    fn test_graphlet_numbers_wrap() {
        let mut edges = graphlet(u16::MAX, &["1.1.1.1"]);
        edges.extend(graphlet(0, &["1.1.1.1"]));
        let bytes = encode_stream(&edges);
        let graphlets = scan(&EdgeStream::new(&bytes).unwrap()).unwrap();
        assert_eq!(graphlets.len(), 2);
        assert_eq!(graphlets[0].number, u16::MAX);
        assert_eq!(graphlets[1].number, 0);
        assert_eq!(graphlets[1].index, 1);
    }

    #[test]
    fn test_flag_bit_does_not_split_local_ports() {
        let tcp = Field::protocol_node(6);
        let port = Field::port_node(6, 80, 0);
        let edges = vec![
            Edge::new(Rank::LocalIpProt, 0, local_ip(), tcp),
            Edge::new(Rank::ProtLocalPort, 0, tcp, port),
            Edge::new(Rank::ProtLocalPort, 0, tcp, port.with_flag()),
        ];
        let bytes = encode_stream(&edges);
        let graphlets = scan(&EdgeStream::new(&bytes).unwrap()).unwrap();
        assert_eq!(graphlets[0].local_ports, 1);
    }

    #[test]
    fn test_total_bytes_goes_to_open_graphlet() {
        let mut edges = graphlet(0, &["1.1.1.1"]);
        edges.push(Edge::new(
            Rank::TotalBytes,
            0,
            Field::from_u64(0x2),
            Field::from_u64(0x10),
        ));
        edges.extend(graphlet(1, &["1.1.1.1"]));
        let bytes = encode_stream(&edges);
        let graphlets = scan(&EdgeStream::new(&bytes).unwrap()).unwrap();
        assert_eq!(graphlets[0].total_bytes, Some(0x2_0000_0010));
        assert_eq!(graphlets[1].total_bytes, None);
        assert_eq!(graphlets[0].edge_count, 5);
    }

    #[test]
    fn test_malformed_rank_stops_scan() {
        let mut bytes = encode_stream(&graphlet(0, &["1.1.1.1"]));
        let mut bad = encode_edge(&Edge::new(
            Rank::RemotePortRemoteIp,
            0,
            Field::default(),
            Field::default(),
        ));
        bad[0] = (bad[0] & 0xf0) | 0x0f;
        bytes.extend_from_slice(&bad);
        bytes.extend_from_slice(&encode_stream(&graphlet(1, &["2.2.2.2"]))[RECORD_SIZE..]);

        let err = scan(&EdgeStream::new(&bytes).unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(matches!(
            err,
            GraphletError::UnknownRank { index: 5, offset: 240, raw: 0xf }
        ));
    }

    #[test]
    fn test_header_only_stream_has_no_graphlets() {
        let bytes = encode_stream(&[]);
        assert!(scan(&EdgeStream::new(&bytes).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_progress_cadence() {
        let mut edges = Vec::new();
        for n in 0..4 {
            edges.extend(graphlet(n, &["1.1.1.1", "2.2.2.2"]));
        }
        let bytes = encode_stream(&edges);
        let mut reports = Vec::new();
        scan_with_progress(&EdgeStream::new(&bytes).unwrap(), 5, |done, total| {
            reports.push((done, total));
        })
        .unwrap();
        assert_eq!(reports, vec![(5, 21), (10, 21), (15, 21), (20, 21)]);
    }
}
