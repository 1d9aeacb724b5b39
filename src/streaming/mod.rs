//! Live streaming: destination seams and the fan-out multiplexer.

mod destination;
mod fanout;

pub use destination::{
    DestinationConnection, DestinationConnector, DestinationContext, StreamProfile,
};
pub use fanout::StreamingFanout;
