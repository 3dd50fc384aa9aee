//! Per-processor trace-state controller (§4.5).
//!
//! One instance per simulated hart. Owns the hart's sink (opened lazily on
//! the first `START_TRACING` marker), the last-PC bookkeeping needed for
//! delta-encoding, and the instruction counter. Never shared across harts —
//! the emitter runs on the simulator's single-threaded commit path, so this
//! type carries no internal locking.

use std::sync::Arc;

use crate::common::error::G4TraceError;
use crate::session::SessionCoordinator;
use crate::sink::TraceSink;

/// Sentinel for "no program counter recorded yet" / "not applicable".
pub const INVALID_PC: u64 = u64::MAX;

/// Mutable per-hart trace state.
pub struct PerProcessorTraceState {
    global: Arc<SessionCoordinator>,
    has_started: bool,
    sink: Option<TraceSink>,
    last_pc: u64,
    set_pc_done: bool,
    last_set_pc: u64,
    instructions_traced: u64,
}

impl PerProcessorTraceState {
    /// Builds a fresh, un-started per-hart state sharing `global`'s
    /// session configuration and trace-file counter.
    #[must_use]
    pub fn new(global: Arc<SessionCoordinator>) -> Self {
        Self {
            global,
            has_started: false,
            sink: None,
            last_pc: INVALID_PC,
            set_pc_done: false,
            last_set_pc: INVALID_PC,
            instructions_traced: 0,
        }
    }

    /// The session-wide coordinator this hart's state is tied to.
    #[must_use]
    pub fn global(&self) -> &Arc<SessionCoordinator> {
        &self.global
    }

    /// Whether this hart has observed its first `START_TRACING` marker.
    /// Monotone: once `true`, never reverts (invariant (e), §3).
    #[must_use]
    pub const fn has_started(&self) -> bool {
        self.has_started
    }

    /// The PC of the last emitted (non-marker) record, used to compute the
    /// next record's delta.
    #[must_use]
    pub const fn last_pc(&self) -> u64 {
        self.last_pc
    }

    /// Number of records emitted so far for this hart.
    #[must_use]
    pub const fn instructions_traced(&self) -> u64 {
        self.instructions_traced
    }

    /// Whether this instruction's commit reported a set-PC event.
    #[must_use]
    pub const fn set_pc_done(&self) -> bool {
        self.set_pc_done
    }

    /// The target of the most recently reported set-PC event.
    #[must_use]
    pub const fn last_set_pc(&self) -> u64 {
        self.last_set_pc
    }

    /// Records this instruction's set-PC event (or its absence) ahead of
    /// emitting its operands — the emitter validates classifier targets
    /// against it.
    pub fn observe_set_pc(&mut self, set_pc: Option<u64>) {
        self.set_pc_done = set_pc.is_some();
        if let Some(target) = set_pc {
            self.last_set_pc = target;
        }
    }

    /// Opens this hart's sink if it is not already open and tracing is
    /// globally enabled; idempotent (a second `START_TRACING` is a no-op at
    /// the call site, but this function itself tolerates being called when
    /// already open).
    ///
    /// # Errors
    ///
    /// Propagates any error from [`SessionCoordinator::open_trace_file`].
    pub fn ensure_sink_open(&mut self) -> Result<(), G4TraceError> {
        if self.sink.is_some() || !self.global.config().enable {
            return Ok(());
        }
        self.sink = Some(self.global.open_trace_file()?);
        Ok(())
    }

    /// Marks this hart as started and sets `last_pc` to `next_pc` (the PC
    /// of the first instruction that will actually be traced).
    pub fn mark_started(&mut self, next_pc: u64) {
        self.has_started = true;
        self.last_pc = next_pc;
    }

    /// Advances bookkeeping after one record has been written: bumps the
    /// instruction counter and sets `last_pc` to `pc` (invariants (f), (g)).
    pub fn record_emitted(&mut self, pc: u64) {
        self.last_pc = pc;
        self.instructions_traced += 1;
    }

    /// Mutable access to the open sink, if any.
    pub fn sink_mut(&mut self) -> Option<&mut TraceSink> {
        self.sink.as_mut()
    }

    /// Whether a sink is currently open.
    #[must_use]
    pub const fn sink_is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// Closes the sink, if open: flushes and destroys it. A null sink is a
    /// no-op (invariant (h): opened and closed exactly once).
    ///
    /// # Errors
    ///
    /// Propagates any error from [`TraceSink::close`].
    pub fn close_sink(&mut self) -> Result<(), G4TraceError> {
        if let Some(sink) = self.sink.take() {
            sink.close()?;
        }
        Ok(())
    }
}

impl Drop for PerProcessorTraceState {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            if let Err(err) = sink.close() {
                tracing::error!("failed to close trace sink on teardown: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use tempfile::tempdir;

    fn coordinator(dir: &std::path::Path) -> Arc<SessionCoordinator> {
        Arc::new(SessionCoordinator::new(SessionConfig {
            enable: true,
            verbose: false,
            filter_privileged: false,
            destination: dir.to_path_buf(),
            max_trace_instructions: u64::MAX,
            compression: "none".to_owned(),
        }))
    }

    #[test]
    fn sink_opens_lazily_exactly_once() {
        let dir = tempdir().unwrap();
        let mut state = PerProcessorTraceState::new(coordinator(dir.path()));
        assert!(!state.sink_is_open());

        state.ensure_sink_open().unwrap();
        assert!(state.sink_is_open());
        assert_eq!(state.global().traces_opened(), 1);

        // A second call is a no-op: no new file, no new counter bump.
        state.ensure_sink_open().unwrap();
        assert_eq!(state.global().traces_opened(), 1);
    }

    #[test]
    fn disabled_session_never_opens_a_sink() {
        let dir = tempdir().unwrap();
        let coordinator = Arc::new(SessionCoordinator::new(SessionConfig {
            enable: false,
            ..SessionConfig::default()
        }));
        let _ = dir;
        let mut state = PerProcessorTraceState::new(coordinator);
        state.ensure_sink_open().unwrap();
        assert!(!state.sink_is_open());
    }

    #[test]
    fn has_started_is_monotone() {
        let dir = tempdir().unwrap();
        let mut state = PerProcessorTraceState::new(coordinator(dir.path()));
        assert!(!state.has_started());
        state.mark_started(0x1004);
        assert!(state.has_started());
        assert_eq!(state.last_pc(), 0x1004);
    }
}
