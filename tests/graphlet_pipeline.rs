use std::net::IpAddr;

use graphletviz::graphlet::containers::LabelDetail;
use graphletviz::graphlet::containers::{Direction, Edge, Field, Rank};
use graphletviz::graphlet::stream::{encode_edge, encode_stream, RECORD_SIZE};
use graphletviz::graphlet::utils::load_file;
use graphletviz::graphlet::{
    scan, DotRenderer, EdgeStream, ErrorKind, FlowAggregator, GraphletError, RawFlow,
};

fn ip(s: &str) -> Field {
    Field::from_addr(s.parse().unwrap())
}

/// One host, two protocols, two active local ports, four remote ports and
/// three remote hosts: twelve edges behind the version record.
fn two_protocol_host() -> Vec<Edge> {
    let host = ip("10.0.0.5");
    let tcp = Field::protocol_node(6);
    let udp = Field::protocol_node(17);
    let http = Field::port_node(6, 80, 0);
    let dns = Field::port_node(17, 53, 0);
    let rp = |proto, port, ctx| Field::port_node(proto, port, ctx);
    let (rp1, rp2) = (rp(6, 50_001, 80), rp(6, 50_002, 80));
    let (rp3, rp4) = (rp(17, 40_001, 53), rp(17, 40_002, 53));
    let g = 7;
    vec![
        Edge::new(Rank::LocalIpProt, g, host, tcp),
        Edge::new(Rank::LocalIpProt, g, host, udp),
        Edge::new(Rank::ProtLocalPort, g, tcp, http),
        Edge::new(Rank::ProtLocalPort, g, udp, dns.with_flag()),
        Edge::new(Rank::LocalPortRemotePort, g, http.with_annotation(0b011), rp1),
        Edge::new(Rank::LocalPortRemotePort, g, http.with_annotation(0b010), rp2),
        Edge::new(Rank::LocalPortRemotePort, g, dns.with_annotation(0b001), rp3),
        Edge::new(Rank::LocalPortRemotePort, g, dns.with_annotation(0b101), rp4),
        Edge::new(Rank::RemotePortRemoteIp, g, rp1, ip("1.1.1.1")),
        Edge::new(Rank::RemotePortRemoteIp, g, rp2.with_annotation(1), ip("2.2.2.2")),
        Edge::new(Rank::RemotePortRemoteIp, g, rp3, ip("3.3.3.3")),
        Edge::new(Rank::RemotePortRemoteIp, g, rp4.with_annotation(2), ip("1.1.1.1")),
    ]
}

#[test]
fn test_thirteen_record_example() {
    let bytes = encode_stream(&two_protocol_host());
    assert_eq!(bytes.len(), 13 * RECORD_SIZE);
    let stream = EdgeStream::new(&bytes).unwrap();

    let graphlets = scan(&stream).unwrap();
    assert_eq!(graphlets.len(), 1);
    let g = &graphlets[0];
    assert_eq!(g.number, 7);
    assert_eq!(g.start_index, 1);
    assert_eq!(g.edge_count, 12);
    assert_eq!(g.protocols, 2);
    assert_eq!(g.local_ports, 2);
    assert_eq!(g.remote_ports, 4);
    assert_eq!(g.remote_hosts, 3);
    assert_eq!(g.total_bytes, None);
}

#[test]
fn test_thirteen_record_example_renders() {
    let bytes = encode_stream(&two_protocol_host());
    let stream = EdgeStream::new(&bytes).unwrap();
    let dot = DotRenderer::new().render(&stream, 1).unwrap();

    let edge_lines = dot
        .lines()
        .filter(|l| l.contains(" -- ") && !l.trim_start().starts_with('"'))
        .count();
    assert_eq!(edge_lines, 12);
    assert_eq!(dot.matches("rank=same").count(), 5);
    assert_eq!(dot.matches("ip=\"1.1.1.1\"").count(), 1);
    assert!(dot.contains("[label=\"UDP\"]"));
    assert!(dot.contains("[label=\"53\"]"));
    assert!(dot.contains("[style=bold, dir=both, color=black]"));
    assert!(dot.contains("[dir=back, color=red]"));
    assert!(dot.contains("[dir=forward, color=red]"));
    assert!(dot.contains("[dir=forward, color=green]"));
    assert!(dot.contains("[color=green]"));
}

#[test]
fn test_many_graphlets_tile_the_stream() {
    let mut edges = Vec::new();
    for n in 0..50u16 {
        let mut host = two_protocol_host();
        for edge in host.iter_mut() {
            edge.graphlet = n;
        }
        // every other graphlet carries a byte total
        if n % 2 == 0 {
            host.push(Edge::new(
                Rank::TotalBytes,
                n,
                Field::from_u64(0),
                Field::from_u64(u64::from(n) * 1_000),
            ));
        }
        edges.extend(host);
    }
    let bytes = encode_stream(&edges);
    let stream = EdgeStream::new(&bytes).unwrap();
    let graphlets = scan(&stream).unwrap();

    assert_eq!(graphlets.len(), 50);
    assert_eq!(
        graphlets.iter().map(|g| g.edge_count).sum::<usize>(),
        stream.len() - 1
    );
    for pair in graphlets.windows(2) {
        assert_eq!(pair[0].end_index(), pair[1].start_index);
    }
    assert_eq!(graphlets[4].total_bytes, Some(4_000));
    assert_eq!(graphlets[5].total_bytes, None);

    let dot = DotRenderer::new().render_document(&stream, &graphlets).unwrap();
    assert_eq!(dot.matches("rank=same").count(), 250);
}

#[test]
fn test_truncated_file_is_rejected() {
    let mut bytes = encode_stream(&two_protocol_host());
    bytes.truncate(bytes.len() - 7);
    let err = EdgeStream::new(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(matches!(err, GraphletError::TruncatedStream { valid, .. } if valid == 12 * RECORD_SIZE));
}

#[test]
fn test_malformed_rank_reports_offset() {
    let edges = two_protocol_host();
    let mut bytes = encode_stream(&edges[..6]);
    let mut bad = encode_edge(&edges[6]);
    bad[0] |= 0x0f;
    bytes.extend_from_slice(&bad);
    for edge in &edges[7..] {
        bytes.extend_from_slice(&encode_edge(edge));
    }
    let stream = EdgeStream::new(&bytes).unwrap();
    let err = scan(&stream).unwrap_err();
    assert!(matches!(
        err,
        GraphletError::UnknownRank { index: 7, offset, raw: 0xf } if offset == 7 * RECORD_SIZE
    ));
}

#[test]
fn test_unsupported_version_is_rejected() {
    let mut bytes = encode_stream(&two_protocol_host());
    bytes[RECORD_SIZE / 3] = 2;
    let stream = EdgeStream::new(&bytes).unwrap();
    assert!(matches!(
        scan(&stream),
        Err(GraphletError::UnsupportedVersion { version: 2 })
    ));
}

#[test]
fn test_graphlet_file_round_trip() {
    let path = std::env::temp_dir().join(format!("graphletviz-{}.hpg", std::process::id()));
    std::fs::write(&path, encode_stream(&two_protocol_host())).unwrap();
    let bytes = load_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let stream = EdgeStream::new(&bytes).unwrap();
    assert_eq!(scan(&stream).unwrap()[0].edge_count, 12);
}

#[test]
fn test_aggregated_flows_direction() {
    let net: IpAddr = "10.0.0.0".parse().unwrap();
    let mask: IpAddr = "255.0.0.0".parse().unwrap();
    let flow = |src: &str, dst: &str, sport, dport| RawFlow {
        src_ip: src.parse().unwrap(),
        dst_ip: dst.parse().unwrap(),
        src_port: sport,
        dst_port: dport,
        protocol: 17,
        start_ms: 1_700_000_000_000,
        duration_ms: 20,
        packets: 1,
        bytes: 80,
        tos_flags: 0,
        reverse_packets: 0,
        reverse_bytes: 0,
    };

    let mut agg = FlowAggregator::with_capacity(16);
    agg.aggregate(&flow("10.1.1.1", "8.8.8.8", 5353, 53), net, mask).unwrap();
    agg.aggregate(&flow("9.9.9.9", "10.1.1.1", 53, 6000), net, mask).unwrap();
    agg.aggregate(&flow("8.8.8.8", "10.1.1.1", 53, 5353), net, mask).unwrap();

    let flows = agg.into_flows();
    assert_eq!(flows.len(), 2);
    assert_eq!(flows[0].flow_type.direction, Direction::Biflow);
    assert_eq!(flows[0].packet_count, 2);
    assert_eq!(flows[1].flow_type.direction, Direction::Inflow);
    assert_eq!(flows[1].local_port, 6000);
}

#[test]
fn test_packets_per_flow_ratio() {
    assert_eq!(LabelDetail::decode(0x8000_000A), LabelDetail::PacketsPerFlow(1.0));
    assert_eq!(LabelDetail::decode(0x0000_000A), LabelDetail::Packets(10));
}
