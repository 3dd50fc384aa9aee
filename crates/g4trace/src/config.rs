//! Session-wide trace configuration (§3, §4.7, §6 of the design notes).
//!
//! `SessionConfig` is the immutable part of the global trace session: the
//! settings that flow in from the hosting simulator's CLI (out of scope
//! here) once at startup and never change afterwards. The one genuinely
//! mutable piece of session-wide state — the count of traces opened so far
//! — lives on [`crate::session::SessionCoordinator`], not here, per design
//! note 9 ("the only mutable shared field is the counter, which requires an
//! atomic").

use std::path::PathBuf;

use serde::Deserialize;

use crate::common::error::G4TraceError;

/// Compression method selectable for a trace sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    /// No compression; writes pass straight through to the file.
    None,
    /// Streaming zstd, with the checksum flag set.
    Zstd,
    /// Streaming xz/lzma easy-encoder, with a CRC64 check.
    Lzma,
}

/// A parsed compression descriptor: method plus preset/level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompressionDescriptor {
    /// Compression method.
    pub method: CompressionMethod,
    /// Compression preset/level. Ignored for [`CompressionMethod::None`].
    pub preset: u32,
}

/// Default zstd compression level used when a descriptor omits a preset.
const DEFAULT_ZSTD_PRESET: u32 = 13;

/// Default lzma/xz preset used when a descriptor omits a preset.
const DEFAULT_LZMA_PRESET: u32 = 3;

impl CompressionDescriptor {
    /// Parses a descriptor string of the form `<method>[-<preset>]`, where
    /// `method` is one of `none`, `zstd`, `lzma`. A missing preset falls
    /// back to the method's default (13 for zstd, 3 for lzma; ignored for
    /// `none`).
    pub fn parse(descriptor: &str) -> Result<Self, G4TraceError> {
        let (method_str, preset_str) = match descriptor.split_once('-') {
            Some((method, preset)) => (method, Some(preset)),
            None => (descriptor, None),
        };

        let method = match method_str {
            "none" => CompressionMethod::None,
            "zstd" => CompressionMethod::Zstd,
            "lzma" => CompressionMethod::Lzma,
            other => {
                return Err(G4TraceError::InvalidCompressionDescriptor {
                    descriptor: descriptor.to_owned(),
                    reason: format!("unknown compression method {other:?}"),
                })
            }
        };

        let preset = match preset_str {
            Some(preset) => preset.parse::<u32>().map_err(|source| {
                G4TraceError::InvalidCompressionDescriptor {
                    descriptor: descriptor.to_owned(),
                    reason: format!("preset {preset:?} is not a valid integer: {source}"),
                }
            })?,
            None => match method {
                CompressionMethod::None => 0,
                CompressionMethod::Zstd => DEFAULT_ZSTD_PRESET,
                CompressionMethod::Lzma => DEFAULT_LZMA_PRESET,
            },
        };

        Ok(Self { method, preset })
    }
}

/// Process-wide, immutable trace-session configuration.
///
/// Flows in from the hosting simulator's CLI/config file. See
/// [`crate::session::SessionCoordinator`] for the mutable counter that
/// accompanies this configuration.
///
/// ```
/// use g4trace::SessionConfig;
///
/// let json = r#"{ "enable": true, "destination": "/tmp/traces" }"#;
/// let config: SessionConfig = serde_json::from_str(json).unwrap();
/// assert!(config.enable);
/// assert_eq!(config.compression, "none");
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
    /// Whether tracing is enabled at all. When `false`, the emitter returns
    /// immediately for every instruction and no sinks are ever opened.
    #[serde(default)]
    pub enable: bool,
    /// Whether to prefix each record with a disassembly annotation.
    #[serde(default)]
    pub verbose: bool,
    /// Whether instructions committed at a privileged level are excluded
    /// from the trace. Privileged state comes from the host simulator's
    /// commit log, not from this crate.
    #[serde(default)]
    pub filter_privileged: bool,
    /// Directory trace files and the sidecar index are written into.
    pub destination: PathBuf,
    /// Maximum number of instructions to trace per processor before
    /// emitting a terminal `END` record.
    #[serde(default = "default_max_trace_instructions")]
    pub max_trace_instructions: u64,
    /// Compression descriptor string (`<method>[-<preset>]`), parsed lazily
    /// by [`SessionConfig::compression`].
    #[serde(default = "default_compression_descriptor")]
    pub compression: String,
}

const fn default_max_trace_instructions() -> u64 {
    u64::MAX
}

fn default_compression_descriptor() -> String {
    "none".to_owned()
}

impl SessionConfig {
    /// Parses the configured compression descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`G4TraceError::InvalidCompressionDescriptor`] if the
    /// configured string does not match `<method>[-<preset>]`.
    pub fn compression(&self) -> Result<CompressionDescriptor, G4TraceError> {
        CompressionDescriptor::parse(&self.compression)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enable: false,
            verbose: false,
            filter_privileged: false,
            destination: PathBuf::from("."),
            max_trace_instructions: default_max_trace_instructions(),
            compression: default_compression_descriptor(),
        }
    }
}
