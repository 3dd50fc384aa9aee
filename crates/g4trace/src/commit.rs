//! Commit-log: per-instruction side effects reported by the host simulator.
//!
//! The classifier and emitter never touch the live register file or memory
//! model — both are out of scope (§1) and owned by the hosting simulator.
//! Instead, on every committed instruction the simulator hands the tracer a
//! `CommitLog` snapshot of exactly what that instruction did: which
//! registers it read, which it wrote, and which memory addresses it loaded
//! from or stored to. This mirrors the source's "commit-log dependence"
//! design note: JALR/JR read their target from this read-set, not the live
//! register file, because by the time the emitter runs the destination
//! register has already been overwritten.

use crate::common::reg::RegisterId;

/// A single memory access: the address touched, the size in bytes, and the
/// value observed (unused by the tracer — recorded only because the host
/// simulator's commit log naturally carries it).
#[derive(Clone, Copy, Debug)]
pub struct MemAccess {
    /// Byte address of the access.
    pub addr: u64,
    /// Size of the access in bytes.
    pub size: u32,
}

impl MemAccess {
    /// Builds a memory access record.
    #[must_use]
    pub const fn new(addr: u64, size: u32) -> Self {
        Self { addr, size }
    }
}

/// Side effects of one committed instruction, as reported by the host
/// simulator.
#[derive(Clone, Debug, Default)]
pub struct CommitLog {
    /// Registers read by the instruction, in read order.
    pub reads: Vec<(RegisterId, u64)>,
    /// Registers written by the instruction, in write order.
    pub writes: Vec<RegisterId>,
    /// Memory loads performed, in access order.
    pub loads: Vec<MemAccess>,
    /// Memory stores performed, in access order.
    pub stores: Vec<MemAccess>,
    /// The program counter the instruction committed to, if it updated PC
    /// to something other than the architecturally sequential next PC (the
    /// "set-PC event" used to validate the classifier's target computation).
    pub set_pc: Option<u64>,
    /// Whether this instruction committed at a privileged level.
    pub privileged: bool,
}

impl CommitLog {
    /// Looks up the committed value last read for `reg`, used by the
    /// classifier to resolve JALR/JR targets.
    ///
    /// Returns `None` if `reg` was not in the read-set; callers that expect
    /// it to be present (the classifier, for a register the decoder
    /// identified as `rs1`) should treat that as a simulator/emitter
    /// disagreement, not a recoverable condition.
    #[must_use]
    pub fn read_value(&self, reg: RegisterId) -> Option<u64> {
        self.reads
            .iter()
            .find(|(id, _)| *id == reg)
            .map(|(_, value)| *value)
    }
}
