//! Crate-wide error type.
//!
//! Most failure modes in the trace pipeline (§7 of the design notes) are
//! modelled as panics rather than `Result`s, because they indicate a
//! simulator/emitter disagreement the process cannot recover from: invariant
//! violations, and an unrecognised mnemonic while not running in verbose
//! mode. `G4TraceError` covers the remaining, genuinely recoverable cases —
//! configuration parsing and sink I/O — that a caller may want to report and
//! continue past (e.g. skip opening a trace file rather than abort the whole
//! simulation).

use thiserror::Error;

/// Errors surfaced by configuration parsing and the compressed output sink.
#[derive(Debug, Error)]
pub enum G4TraceError {
    /// The compression descriptor string did not match `<method>[-<preset>]`
    /// with `method` one of `none`, `zstd`, `lzma`.
    #[error("invalid compression descriptor {descriptor:?}: {reason}")]
    InvalidCompressionDescriptor {
        /// The offending descriptor string.
        descriptor: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// Creating the trace destination directory failed.
    #[error("failed to create trace destination directory {path:?}: {source}")]
    DestinationDirectory {
        /// Path that could not be created.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A sink write, flush, or close failed.
    #[error("trace sink I/O error: {0}")]
    SinkIo(#[from] std::io::Error),
}
