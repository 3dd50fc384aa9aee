//! Trace session coordinator (§4.6).
//!
//! Process-wide (but not a global/singleton in this port — see design note
//! 9): holds the immutable [`SessionConfig`] plus the one field that is
//! genuinely shared and mutated from every hart, the count of trace files
//! opened so far. Each [`crate::state::PerProcessorTraceState`] is
//! constructed with a shared reference to one coordinator.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::common::error::G4TraceError;
use crate::config::SessionConfig;
use crate::sink::TraceSink;

/// Three-line sidecar index written alongside the per-hart trace files.
const INDEX_FILE_NAME: &str = "trace.index";

/// Process-wide trace session state.
///
/// Owns the immutable configuration and the only mutable shared field
/// (`traces_opened`), which requires an atomic because multiple processors
/// may open their first trace file concurrently.
#[derive(Debug)]
pub struct SessionCoordinator {
    config: SessionConfig,
    traces_opened: AtomicU32,
}

impl SessionCoordinator {
    /// Builds a coordinator for a fresh trace session. `traces_opened`
    /// always starts at zero: this value is not meant to be restored across
    /// runs.
    #[must_use]
    pub const fn new(config: SessionConfig) -> Self {
        Self {
            config,
            traces_opened: AtomicU32::new(0),
        }
    }

    /// The session's immutable configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The number of trace files opened so far.
    #[must_use]
    pub fn traces_opened(&self) -> u32 {
        self.traces_opened.load(Ordering::SeqCst)
    }

    /// Opens the next numbered trace file under the session's destination
    /// directory and returns its sink.
    ///
    /// Ensures the destination directory exists (idempotently — an
    /// already-existing directory is not an error), formats the filename
    /// `trace-####.trc` from the current `traces_opened` count, opens the
    /// appropriate compressing sink, and atomically increments the counter.
    ///
    /// # Errors
    ///
    /// Returns [`G4TraceError::DestinationDirectory`] if the destination
    /// cannot be created, [`G4TraceError::InvalidCompressionDescriptor`] if
    /// the configured compression string is malformed, or
    /// [`G4TraceError::SinkIo`] if the sink cannot be opened.
    pub fn open_trace_file(&self) -> Result<TraceSink, G4TraceError> {
        fs::create_dir_all(&self.config.destination).map_err(|source| {
            G4TraceError::DestinationDirectory {
                path: self.config.destination.clone(),
                source,
            }
        })?;

        let descriptor = self.config.compression()?;
        let index = self.traces_opened.fetch_add(1, Ordering::SeqCst);
        let path = self.config.destination.join(format!("trace-{index:04}.trc"));
        TraceSink::open(&path, descriptor)
    }

    /// Writes the sidecar `trace.index` file at session teardown.
    ///
    /// If no traces were ever opened, emits a diagnostic instead (§4.6) and
    /// writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`G4TraceError::SinkIo`] if the index file cannot be written.
    pub fn write_index(&self) -> Result<(), G4TraceError> {
        if !self.config.enable {
            return Ok(());
        }

        let opened = self.traces_opened();
        if opened == 0 {
            tracing::warn!(
                "no gems4proc trace created: no processor used the START_TRACING hint"
            );
            return Ok(());
        }

        let path: PathBuf = self.config.destination.join(INDEX_FILE_NAME);
        let contents = format!(
            "{opened}\nTRACE_HAS_SEQUENCE_NUMBERS: 0\nTRACE_HAS_SC_vs_RELAXED_LOCK_TYPE: 0\n"
        );
        fs::write(&path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> SessionConfig {
        SessionConfig {
            enable: true,
            verbose: false,
            filter_privileged: false,
            destination: dir.to_path_buf(),
            max_trace_instructions: u64::MAX,
            compression: "none".to_owned(),
        }
    }

    #[test]
    fn opens_numbered_trace_files() {
        let dir = tempdir().unwrap();
        let coordinator = SessionCoordinator::new(config_in(dir.path()));

        let sink0 = coordinator.open_trace_file().unwrap();
        let sink1 = coordinator.open_trace_file().unwrap();
        sink0.close().unwrap();
        sink1.close().unwrap();

        assert!(dir.path().join("trace-0000.trc").exists());
        assert!(dir.path().join("trace-0001.trc").exists());
        assert_eq!(coordinator.traces_opened(), 2);
    }

    #[test]
    fn writes_index_after_traces_opened() {
        let dir = tempdir().unwrap();
        let coordinator = SessionCoordinator::new(config_in(dir.path()));
        coordinator.open_trace_file().unwrap().close().unwrap();

        coordinator.write_index().unwrap();

        let contents = fs::read_to_string(dir.path().join(INDEX_FILE_NAME)).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("1"));
        assert_eq!(lines.next(), Some("TRACE_HAS_SEQUENCE_NUMBERS: 0"));
        assert_eq!(lines.next(), Some("TRACE_HAS_SC_vs_RELAXED_LOCK_TYPE: 0"));
    }

    #[test]
    fn writes_no_index_when_no_traces_opened() {
        // Installs a test-writer subscriber so the `tracing::warn!` this
        // path emits is visible in the test's captured output rather than
        // silently dropped for lack of a subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let dir = tempdir().unwrap();
        let coordinator = SessionCoordinator::new(config_in(dir.path()));

        coordinator.write_index().unwrap();

        assert!(!dir.path().join(INDEX_FILE_NAME).exists());
    }

    #[test]
    fn directory_already_existing_is_not_an_error() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        let coordinator = SessionCoordinator::new(config_in(dir.path()));
        assert!(coordinator.open_trace_file().is_ok());
    }
}
