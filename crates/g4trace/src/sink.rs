//! Compressed output sink (§4.7).
//!
//! A write-only byte stream wrapping a file, with an optional streaming
//! compression codec selected by [`crate::config::CompressionDescriptor`].
//! All three variants guarantee that every byte handed to `write` is
//! eventually flushed through to the file on [`TraceSink::close`].

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use xz2::stream::{Check, Stream};
use xz2::write::XzEncoder;
use zstd::stream::write::Encoder as ZstdEncoder;

use crate::common::error::G4TraceError;
use crate::config::{CompressionDescriptor, CompressionMethod};

/// Buffer size for the plain (uncompressed) sink's `BufWriter`.
const BUFFER_SIZE: usize = 64 * 1024;

/// A trace sink: an open, write-only byte stream onto which delta-encoded
/// trace records are serialised, possibly through a compressing codec.
///
/// Implemented as an enum rather than a trait object because closing a
/// compressing codec (`finish`) consumes it by value — a `Box<dyn Write>`
/// cannot express that without an extra `Option` dance.
pub enum TraceSink {
    /// Uncompressed: writes go straight to a buffered file.
    Plain(BufWriter<File>),
    /// Streaming zstd, checksum enabled.
    Zstd(Box<ZstdEncoder<'static, BufWriter<File>>>),
    /// Streaming xz/lzma easy-encoder, CRC64 check.
    Xz(Box<XzEncoder<BufWriter<File>>>),
}

impl TraceSink {
    /// Opens a new sink at `path`, using the codec named by `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`G4TraceError::SinkIo`] if the file cannot be created or the
    /// codec fails to initialise.
    pub fn open(path: &Path, descriptor: CompressionDescriptor) -> Result<Self, G4TraceError> {
        let file = BufWriter::with_capacity(BUFFER_SIZE, File::create(path)?);
        match descriptor.method {
            CompressionMethod::None => Ok(Self::Plain(file)),
            CompressionMethod::Zstd => {
                let mut encoder = ZstdEncoder::new(file, preset_as_zstd_level(descriptor.preset))?;
                encoder.include_checksum(true)?;
                Ok(Self::Zstd(Box::new(encoder)))
            }
            CompressionMethod::Lzma => {
                let stream = Stream::new_easy_encoder(descriptor.preset, Check::Crc64)
                    .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
                Ok(Self::Xz(Box::new(XzEncoder::new_stream(file, stream))))
            }
        }
    }

    /// Flushes any buffered data and finalises the underlying codec,
    /// consuming the sink. A second call is not possible: closing moves
    /// `self`.
    ///
    /// # Errors
    ///
    /// Returns [`G4TraceError::SinkIo`] if the final flush/finish fails.
    pub fn close(self) -> Result<(), G4TraceError> {
        match self {
            Self::Plain(mut file) => {
                file.flush()?;
                Ok(())
            }
            Self::Zstd(encoder) => {
                let mut file = encoder.finish()?;
                file.flush()?;
                Ok(())
            }
            Self::Xz(encoder) => {
                let mut file = encoder.finish()?;
                file.flush()?;
                Ok(())
            }
        }
    }
}

impl Write for TraceSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(file) => file.write(buf),
            Self::Zstd(encoder) => encoder.write(buf),
            Self::Xz(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(file) => file.flush(),
            Self::Zstd(encoder) => encoder.flush(),
            Self::Xz(encoder) => encoder.flush(),
        }
    }
}

/// Clamps a configured preset into the range the zstd crate accepts for a
/// compression level (1-22); the descriptor parser validates the integer
/// syntax but not the method-specific range.
fn preset_as_zstd_level(preset: u32) -> i32 {
    preset.min(22) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    fn round_trip(descriptor: CompressionDescriptor, data: &[u8]) -> Vec<u8> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.trc");
        let mut sink = TraceSink::open(&path, descriptor).unwrap();
        sink.write_all(data).unwrap();
        sink.close().unwrap();

        let mut raw = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut raw).unwrap();

        match descriptor.method {
            CompressionMethod::None => raw,
            CompressionMethod::Zstd => zstd::stream::decode_all(&raw[..]).unwrap(),
            CompressionMethod::Lzma => {
                let mut decompressed = Vec::new();
                xz2::read::XzDecoder::new(&raw[..])
                    .read_to_end(&mut decompressed)
                    .unwrap();
                decompressed
            }
        }
    }

    #[test]
    fn none_round_trips() {
        let data = b"hello trace world".repeat(100);
        let descriptor = CompressionDescriptor::parse("none").unwrap();
        assert_eq!(round_trip(descriptor, &data), data);
    }

    #[test]
    fn zstd_round_trips() {
        let data = b"L4x1z5\nS8x10y5 20000 4\n".repeat(1000);
        let descriptor = CompressionDescriptor::parse("zstd-3").unwrap();
        assert_eq!(round_trip(descriptor, &data), data);
    }

    #[test]
    fn lzma_round_trips() {
        let data = b"L4x1z5\nS8x10y5 20000 4\n".repeat(1000);
        let descriptor = CompressionDescriptor::parse("lzma-3").unwrap();
        assert_eq!(round_trip(descriptor, &data), data);
    }
}
