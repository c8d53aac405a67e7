//! Decoding and rendering of host graphlets.
//! A graphlet summarizes one host's traffic as protocol -> local port -> remote port -> remote host.
pub mod containers;
pub mod dot;
pub mod error;
pub mod flow;
pub mod key;
pub mod scan;
pub mod stream;
pub mod utils;
pub mod walk;

pub use containers::{Edge, Field, Graphlet, Rank};
pub use dot::DotRenderer;
pub use error::{ErrorKind, GraphletError};
pub use flow::{FlowAggregator, FlowRecord, RawFlow};
pub use key::FixedKey;
pub use scan::scan;
pub use stream::EdgeStream;
