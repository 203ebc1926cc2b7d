//! Content hashing.
//!
//! Files are read in fixed-size chunks and fed to a streaming hash, so the
//! chunk size only affects I/O and never the resulting digest.

pub mod algorithm;
pub mod chunked;

pub use algorithm::Algorithm;
pub use chunked::{ChunkedHasher, HashOutcome, DEFAULT_CHUNK_SIZE};
