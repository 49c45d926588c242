//! Frame Writer.
//!
//! Frames leave the sampler through a [`FrameSink`]. [`FrameWriter`] turns them into a gapless,
//! zero-padded image sequence on disk; [`FrameSequence`] reads such a sequence back for the
//! assembler.

/// On-disk naming scheme and sequence scanning.
pub mod sequence;
/// Sink contract and the in-memory sink.
pub mod sink;
/// Filesystem sink.
pub mod writer;

pub use sequence::{FrameNaming, FrameSequence};
pub use sink::{FrameSink, InMemorySink, SinkConfig};
pub use writer::{FrameWriter, WriteReport};
