//! Single forward pass over graphlet records.
//!
//! Both the metadata scanner and the DOT renderer are [`GraphletVisitor`]s
//! driven by one [`Walker`]. The walker owns the ordering rules and the only
//! close-out path, so partition and graphlet boundaries are handled the same
//! way mid-stream and at the end of the stream.
use super::containers::{Edge, Partition, Rank};
use super::error::GraphletError;
use super::stream::{byte_offset, EdgeStream};

/// How the walker classified the record it just read (or the end of input).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    InPartition,
    PartitionBoundary,
    GraphletBoundary,
    EndOfStream,
}

impl Boundary {
    fn closes_graphlet(self) -> bool {
        matches!(self, Self::GraphletBoundary | Self::EndOfStream)
    }
}

/// Callbacks for one walk. Partition and graphlet closes always arrive in
/// order: every `close_partition` of a graphlet precedes its `close_graphlet`.
pub trait GraphletVisitor {
    fn begin_graphlet(&mut self, index: usize, edge: &Edge) -> Result<(), GraphletError>;

    /// An ordinary edge of `partition`.
    fn edge(&mut self, index: usize, edge: &Edge, partition: Partition)
        -> Result<(), GraphletError>;

    /// Annotation for the ordinary edge read just before.
    fn edge_label(&mut self, _index: usize, _edge: &Edge) -> Result<(), GraphletError> {
        Ok(())
    }

    fn total_bytes(&mut self, _index: usize, _total: u64) -> Result<(), GraphletError> {
        Ok(())
    }

    fn close_partition(&mut self, partition: Partition) -> Result<(), GraphletError>;

    /// `end_index` is one past the last record of the graphlet.
    fn close_graphlet(&mut self, end_index: usize) -> Result<(), GraphletError>;
}

/// Whether to stop after the first graphlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    All,
    Single,
}

#[derive(Debug, Default)]
struct OpenGraphlet {
    number: u16,
    seen_total_bytes: bool,
}

#[derive(Debug)]
pub struct Walker<'a> {
    stream: EdgeStream<'a>,
    mode: WalkMode,
    graphlet: Option<OpenGraphlet>,
    partition: Option<Partition>,
    /// Monotonic index of the open graphlet, for error context.
    graphlet_index: usize,
    last_was_ordinary: bool,
}

impl<'a> Walker<'a> {
    pub fn new(stream: EdgeStream<'a>, mode: WalkMode) -> Self {
        Self {
            stream,
            mode,
            graphlet: None,
            partition: None,
            graphlet_index: 0,
            last_was_ordinary: false,
        }
    }

    /// Walks records from `start` and returns the index where the walk stopped.
    pub fn run<V: GraphletVisitor>(
        &mut self,
        start: usize,
        visitor: &mut V,
    ) -> Result<usize, GraphletError> {
        for index in start..self.stream.len() {
            let edge = self.stream.edge(index)?;
            let boundary = self.classify(index, &edge)?;
            if boundary != Boundary::InPartition {
                self.close_out(boundary, index, visitor)?;
                if boundary == Boundary::GraphletBoundary && self.mode == WalkMode::Single {
                    return Ok(index);
                }
            }
            self.accept(index, &edge, visitor)?;
        }
        let end = self.stream.len();
        self.close_out(Boundary::EndOfStream, end, visitor)?;
        Ok(end)
    }

    /// Decides what `edge` means for the open partition and graphlet. Pure
    /// apart from validation; state changes happen in `close_out` and `accept`.
    fn classify(&self, index: usize, edge: &Edge) -> Result<Boundary, GraphletError> {
        if edge.rank == Rank::Version {
            return Err(self.misplaced(index, edge.rank));
        }
        match &self.graphlet {
            Some(open) if open.number != edge.graphlet => return Ok(Boundary::GraphletBoundary),
            None => return Ok(Boundary::InPartition),
            Some(_) => {}
        }
        match (edge.rank.partition(), self.partition) {
            (Some(next), Some(current)) if next < current => Err(GraphletError::PartitionOrder {
                graphlet: self.graphlet_index,
                index,
                offset: byte_offset(index),
                current: current.number(),
                found: next.number(),
            }),
            (Some(next), Some(current)) if next != current => Ok(Boundary::PartitionBoundary),
            _ => Ok(Boundary::InPartition),
        }
    }

    /// The one close-out handler: finish the open partition, then the open
    /// graphlet when the boundary ends it. Calling it twice is harmless.
    fn close_out<V: GraphletVisitor>(
        &mut self,
        boundary: Boundary,
        index: usize,
        visitor: &mut V,
    ) -> Result<(), GraphletError> {
        if let Some(partition) = self.partition.take() {
            visitor.close_partition(partition)?;
        }
        if boundary.closes_graphlet() && self.graphlet.take().is_some() {
            visitor.close_graphlet(index)?;
            self.graphlet_index += 1;
            self.last_was_ordinary = false;
        }
        Ok(())
    }

    fn accept<V: GraphletVisitor>(
        &mut self,
        index: usize,
        edge: &Edge,
        visitor: &mut V,
    ) -> Result<(), GraphletError> {
        if self.graphlet.is_none() {
            if edge.rank != Rank::LocalIpProt {
                return Err(GraphletError::BadFirstRank {
                    graphlet: self.graphlet_index,
                    index,
                    offset: byte_offset(index),
                    found: edge.rank,
                });
            }
            self.graphlet = Some(OpenGraphlet {
                number: edge.graphlet,
                ..Default::default()
            });
            visitor.begin_graphlet(index, edge)?;
        }

        match edge.rank.partition() {
            Some(partition) => {
                self.partition = Some(partition);
                self.last_was_ordinary = true;
                visitor.edge(index, edge, partition)
            }
            None if edge.rank == Rank::EdgeLabel => {
                let labelled = matches!(
                    self.partition,
                    Some(Partition::RemotePort | Partition::RemoteHost)
                );
                if !self.last_was_ordinary || !labelled {
                    return Err(self.misplaced(index, edge.rank));
                }
                self.last_was_ordinary = false;
                visitor.edge_label(index, edge)
            }
            None => {
                // totalBytes; the graphlet is open here
                let seen = self
                    .graphlet
                    .as_ref()
                    .map_or(false, |open| open.seen_total_bytes);
                if seen {
                    return Err(self.misplaced(index, edge.rank));
                }
                if let Some(open) = self.graphlet.as_mut() {
                    open.seen_total_bytes = true;
                }
                self.last_was_ordinary = false;
                visitor.total_bytes(index, edge.total_bytes())
            }
        }
    }

    fn misplaced(&self, index: usize, rank: Rank) -> GraphletError {
        GraphletError::MisplacedRecord {
            graphlet: self.graphlet_index,
            index,
            offset: byte_offset(index),
            rank,
        }
    }
}
