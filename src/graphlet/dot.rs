//! Renders graphlets as Graphviz DOT text.
//!
//! Output is an undirected `graph` laid out left to right in five rank
//! columns (local IP, protocol, local port, remote port, remote IP). Each
//! graphlet contributes one `rank=same` subgraph per column, one annotation
//! line per node and one `a -- b` line per edge.
use std::collections::HashMap;
use std::fmt::Write;

use super::containers::{
    Column, Direction, Edge, Field, FlowType, Graphlet, LabelDetail, NodeKey, NodeRef, Partition,
    Rank,
};
use super::error::GraphletError;
use super::stream::{byte_offset, EdgeStream};
use super::utils::protocol_name;
use super::walk::{GraphletVisitor, WalkMode, Walker};

/// Turns graphlets into DOT documents.
///
/// Subgraph names come from a counter owned by the renderer, so they stay
/// unique across every graphlet one instance renders.
#[derive(Debug, Default)]
pub struct DotRenderer {
    subgraphs: usize,
}

impl DotRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders the single graphlet starting at record `start_index` as a complete document.
    pub fn render(&mut self, stream: &EdgeStream, start_index: usize) -> Result<String, GraphletError> {
        let mut out = String::new();
        write_header(&mut out)?;
        self.render_graphlet(stream, start_index, &mut out)?;
        out.push_str("}\n");
        Ok(out)
    }

    /// Renders all `graphlets` into one document.
    pub fn render_document(
        &mut self,
        stream: &EdgeStream,
        graphlets: &[Graphlet],
    ) -> Result<String, GraphletError> {
        let mut out = String::new();
        write_header(&mut out)?;
        for graphlet in graphlets {
            self.render_graphlet(stream, graphlet.start_index, &mut out)?;
        }
        out.push_str("}\n");
        Ok(out)
    }

    /// Appends the body of one graphlet to `out` and returns the index of the
    /// record after it.
    ///
    /// `start_index` must be a graphlet's first record (`Graphlet::start_index`).
    /// A `localIP_prot` record preceded by one of the same graphlet is rejected.
    pub fn render_graphlet(
        &mut self,
        stream: &EdgeStream,
        start_index: usize,
        out: &mut String,
    ) -> Result<usize, GraphletError> {
        let first = stream.edge(start_index)?;
        if first.rank == Rank::LocalIpProt && start_index > 0 {
            let prev = stream.edge(start_index - 1)?;
            if prev.rank != Rank::Version && prev.graphlet == first.graphlet {
                return Err(GraphletError::NotGraphletStart {
                    number: first.graphlet,
                    index: start_index,
                    offset: byte_offset(start_index),
                });
            }
        }
        let mut painter = Painter {
            out,
            subgraphs: &mut self.subgraphs,
            scope: start_index,
            nodes: HashMap::new(),
            display: Vec::new(),
            pending: None,
        };
        Walker::new(*stream, WalkMode::Single).run(start_index, &mut painter)
    }
}

fn write_header(out: &mut String) -> Result<(), GraphletError> {
    writeln!(out, "graph graphlets {{")?;
    writeln!(out, "  rankdir=LR;")?;
    writeln!(out, "  node [shape=plaintext];")?;
    let columns: Vec<String> = Column::ALL
        .iter()
        .map(|c| format!("\"{}\"", c.label()))
        .collect();
    writeln!(out, "  {};", columns.join(" -- "))?;
    writeln!(out, "  node [shape=ellipse, fontsize=10];")?;
    Ok(())
}

struct DisplayNode {
    node: NodeRef,
    rank: Rank,
    raw: Field,
}

struct PendingEdge {
    from: String,
    to: String,
    attrs: Vec<String>,
}

/// Visitor state for one graphlet.
struct Painter<'r> {
    out: &'r mut String,
    subgraphs: &'r mut usize,
    /// Start index of the graphlet; keeps node names distinct between graphlets.
    scope: usize,
    nodes: HashMap<NodeKey, usize>,
    display: Vec<DisplayNode>,
    /// Last edge, held back so a following edge_label can attach to it.
    pending: Option<PendingEdge>,
}

impl Painter<'_> {
    fn register(&mut self, node: NodeRef, rank: Rank, raw: Field) {
        let key = node.key();
        if !self.nodes.contains_key(&key) {
            self.nodes.insert(key, self.display.len());
            self.display.push(DisplayNode { node, rank, raw });
        }
    }

    fn flush_edge(&mut self) -> Result<(), GraphletError> {
        if let Some(edge) = self.pending.take() {
            if edge.attrs.is_empty() {
                writeln!(self.out, "  {} -- {};", edge.from, edge.to)?;
            } else {
                writeln!(
                    self.out,
                    "  {} -- {} [{}];",
                    edge.from,
                    edge.to,
                    edge.attrs.join(", ")
                )?;
            }
        }
        Ok(())
    }
}

impl GraphletVisitor for Painter<'_> {
    fn begin_graphlet(&mut self, index: usize, edge: &Edge) -> Result<(), GraphletError> {
        writeln!(self.out, "  // graphlet {} at edge {}", edge.graphlet, index)?;
        Ok(())
    }

    fn edge(&mut self, _index: usize, edge: &Edge, partition: Partition) -> Result<(), GraphletError> {
        self.flush_edge()?;
        let (Some(left), Some(right)) = (edge.left_node(), edge.right_node()) else {
            return Ok(());
        };
        if partition == Partition::Protocol {
            self.register(left, edge.rank, edge.left);
        }
        self.register(right, edge.rank, edge.right);

        let attrs = match partition {
            Partition::RemotePort => flow_attrs(edge.left.flow_type_bits()),
            Partition::RemoteHost => color_attrs(edge.left.color_code()),
            _ => Vec::new(),
        };
        self.pending = Some(PendingEdge {
            from: left.name(self.scope),
            to: right.name(self.scope),
            attrs,
        });
        Ok(())
    }

    fn edge_label(&mut self, _index: usize, edge: &Edge) -> Result<(), GraphletError> {
        if let Some(pending) = self.pending.as_mut() {
            pending.attrs.push(format!(
                "label=\"{}({})\"",
                edge.left.low64(),
                LabelDetail::decode(edge.right.low32())
            ));
        }
        Ok(())
    }

    fn close_partition(&mut self, _partition: Partition) -> Result<(), GraphletError> {
        self.flush_edge()?;
        for column in Column::ALL {
            let names: Vec<String> = self
                .display
                .iter()
                .filter(|d| d.node.column == column)
                .map(|d| d.node.name(self.scope))
                .collect();
            if names.is_empty() {
                continue;
            }
            writeln!(
                self.out,
                "  subgraph s{} {{ rank=same; \"{}\"; {}; }}",
                self.subgraphs,
                column.label(),
                names.join("; ")
            )?;
            *self.subgraphs += 1;
        }
        for d in &self.display {
            writeln!(
                self.out,
                "  {} [{}];",
                d.node.name(self.scope),
                annotation(d).join(", ")
            )?;
        }
        self.nodes.clear();
        self.display.clear();
        Ok(())
    }

    fn close_graphlet(&mut self, _end_index: usize) -> Result<(), GraphletError> {
        self.flush_edge()
    }
}

fn annotation(d: &DisplayNode) -> Vec<String> {
    let raw = d.raw;
    if d.node.summary {
        let what = if d.node.column == Column::RemoteIp {
            "hosts"
        } else {
            "con"
        };
        let mut attrs = vec![
            format!("label=\"#{}={}\"", what, raw.summary_count()),
            "shape=box".to_string(),
            "style=bold".to_string(),
        ];
        if raw.role() != 0 {
            attrs.push(format!("role={}", raw.role()));
        }
        return attrs;
    }
    match d.node.column {
        Column::LocalIp => vec![format!("label=\"{}\"", raw.addr())],
        Column::Protocol => vec![format!("label=\"{}\"", protocol_name(raw.protocol()))],
        Column::LocalPort | Column::RemotePort => vec![format!("label=\"{}\"", raw.port())],
        Column::RemoteIp => {
            let addr = raw.addr();
            log::trace!("remote host {} via {}", addr, d.rank);
            vec![format!("label=\"{}\"", addr), format!("ip=\"{}\"", addr)]
        }
    }
}

/// Direction and color of a partition-3 edge from its 3-bit flow type.
fn flow_attrs(bits: u8) -> Vec<String> {
    let attrs: &[&str] = match FlowType::from_bits(bits) {
        Some(FlowType {
            direction: Direction::Biflow,
            ..
        }) => &["style=bold", "dir=both", "color=black"],
        Some(FlowType {
            direction: Direction::Inflow,
            low_confidence: false,
        }) => &["dir=back", "color=red"],
        Some(FlowType {
            direction: Direction::Outflow,
            low_confidence: false,
        }) => &["dir=forward", "color=red"],
        Some(FlowType {
            direction: Direction::Inflow,
            low_confidence: true,
        }) => &["dir=back", "color=green"],
        Some(FlowType {
            direction: Direction::Outflow,
            low_confidence: true,
        }) => &["dir=forward", "color=green"],
        None => &[],
    };
    attrs.iter().map(|a| a.to_string()).collect()
}

/// Color of a partition-4 edge; 0 keeps the default black.
fn color_attrs(code: u8) -> Vec<String> {
    match code {
        1 => vec!["color=red".to_string()],
        2 => vec!["color=green".to_string()],
        _ => Vec::new(),
    }
}
