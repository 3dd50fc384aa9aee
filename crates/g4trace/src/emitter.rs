//! Trace emitter (§4.3, §4.4).
//!
//! Consumes one committed instruction together with its [`CommitLog`],
//! consults the classifier, updates the per-processor trace state, and
//! writes the delta-encoded record to the sink. Grounded directly in
//! `g4trace_trace_inst` (`original_source/riscv/g4trace.cc`): the write
//! order, the suppressed-register constants, and the assertion placement
//! all mirror that function line for line.

use std::io::Write;

use crate::classify::classify;
use crate::commit::CommitLog;
use crate::common::constants::INSTRUCTION_SIZE_32;
use crate::common::error::G4TraceError;
use crate::common::reg::RegisterId;
use crate::inst::{InstInfo, InstType};
use crate::isa::disasm::disassemble;
use crate::isa::rvc::expand::expand;
use crate::shape::MemAccessShape;
use crate::state::PerProcessorTraceState;

/// Width, in characters, of the left-aligned disassembly annotation
/// written in verbose mode.
const VERBOSE_DISASM_WIDTH: usize = 32;

/// CSR reads and writes are suppressed from the trace by default.
const SUPPRESS_CSR: bool = true;

/// `vstatus` reads and writes are suppressed from the trace by default.
const SUPPRESS_VSTATUS: bool = true;

/// Processes one committed instruction: classifies it, updates `state`,
/// and writes its record to `state`'s sink.
///
/// Returns immediately without writing anything if the session is
/// globally disabled, if this instruction committed at a privileged level
/// and privileged filtering is on, or if the hart has not yet observed its
/// first `START_TRACING` marker (no sink is open to write to).
///
/// # Errors
///
/// Propagates any I/O error from the underlying sink, and any error from
/// lazily opening the sink on the first `START_TRACING` marker.
///
/// # Panics
///
/// Panics (matching the original's `assert()` calls) on an unrecognised
/// mnemonic while verbose mode is off, or on any violation of the
/// invariants in §3 of the design notes — these indicate a disagreement
/// between the simulator and the emitter, not a recoverable condition.
pub fn emit(
    state: &mut PerProcessorTraceState,
    pc: u64,
    raw: u32,
    is_compressed: bool,
    commit: &CommitLog,
) -> Result<(), G4TraceError> {
    let config = state.global().config();
    let enable = config.enable;
    let filter_privileged = config.filter_privileged;
    let verbose = config.verbose;
    let max_trace_instructions = config.max_trace_instructions;

    if !enable {
        return Ok(());
    }
    if commit.privileged && filter_privileged {
        return Ok(());
    }

    state.observe_set_pc(commit.set_pc);

    if state.instructions_traced() >= max_trace_instructions {
        if let Some(sink) = state.sink_mut() {
            writeln!(sink, "END {:x}", state.last_pc())?;
        }
        return Ok(());
    }

    let info = classify(raw, is_compressed, pc, commit);

    if info.ty == InstType::StartTracing {
        if state.has_started() {
            return Ok(());
        }
        state.ensure_sink_open()?;
        let next_pc = pc.wrapping_add(INSTRUCTION_SIZE_32);
        state.mark_started(next_pc);
        if let Some(sink) = state.sink_mut() {
            writeln!(sink, "{next_pc:x}")?;
        }
        return Ok(());
    }

    if !state.sink_is_open() {
        return Ok(());
    }

    if info.ty == InstType::Clear {
        if let Some(sink) = state.sink_mut() {
            writeln!(sink, "CLEAR")?;
        }
        return Ok(());
    }
    if info.ty == InstType::EndRoi {
        if let Some(sink) = state.sink_mut() {
            writeln!(sink, "END {:x}", state.last_pc())?;
        }
        return Ok(());
    }

    assert!(
        verbose || info.ty != InstType::Unknown,
        "unrecognised mnemonic {raw:#x} at pc {pc:#x} while not running in verbose mode"
    );
    assert!(
        commit.loads.is_empty() || matches!(info.ty, InstType::L | InstType::Lr | InstType::Rmw),
        "load reported for a type that does not read memory: {:?}",
        info.ty
    );
    assert!(
        commit.stores.is_empty()
            || matches!(info.ty, InstType::S | InstType::Sc | InstType::Rmw),
        "store reported for a type that does not write memory: {:?}",
        info.ty
    );
    if info.ty.requires_shape() {
        assert_ne!(info.shape, MemAccessShape::Invalid, "missing shape for {:?}", info.ty);
    }
    if info.ty.requires_store_operands() {
        assert!(!info.s_base.is_invalid(), "missing s_base for {:?}", info.ty);
        assert!(!info.s_data.is_invalid(), "missing s_data for {:?}", info.ty);
    }
    if info.ty == InstType::Rmw {
        assert_eq!(
            commit.loads.len(),
            commit.stores.len(),
            "RMW must report an equal number of loads and stores"
        );
    }

    let diff_pc = (pc as i64).wrapping_sub(state.last_pc() as i64);
    let set_pc_done = state.set_pc_done();
    let last_set_pc = state.last_set_pc();
    state.record_emitted(pc);

    let sink = state.sink_mut().expect("sink open checked above");

    if verbose {
        let expanded = if is_compressed { expand(raw as u16) } else { raw };
        write!(sink, "{{ {:<width$} }} ", disassemble(expanded), width = VERBOSE_DISASM_WIDTH)?;
        sink.flush()?;
    }
    if let Some(tag) = info.ty.trace_tag() {
        write!(sink, "{tag}")?;
    }
    write!(sink, "{diff_pc}")?;

    write_source_registers(sink, &info, commit)?;
    write_destination_registers(sink, commit)?;

    if !commit.loads.is_empty() {
        write_mem_accesses(sink, &commit.loads, info.shape)?;
    }
    if !commit.stores.is_empty() && info.ty != InstType::Rmw {
        write_mem_accesses(sink, &commit.stores, info.shape)?;
    }

    if let Some(target) = info.target {
        assert!(info.ty.requires_target(), "target set on a type that does not use one");
        write!(sink, "t{}", (target as i64).wrapping_sub(pc as i64))?;
        if info.ty == InstType::B {
            if set_pc_done {
                assert_eq!(target, last_set_pc, "branch target disagrees with reported set-PC");
                write!(sink, "*")?;
            }
        } else {
            assert!(set_pc_done, "{:?} requires a reported set-PC event", info.ty);
            assert_eq!(target, last_set_pc, "target disagrees with reported set-PC");
        }
    }

    writeln!(sink)?;
    Ok(())
}

/// Writes the source-register operand section (§4.3 item 1).
///
/// Stores write their base register as `x`, then every other committed
/// read as `y`; every other type writes each committed read as `x`. CSR
/// and `vstatus` reads are suppressed either way.
fn write_source_registers<W: Write>(
    sink: &mut W,
    info: &InstInfo,
    commit: &CommitLog,
) -> Result<(), G4TraceError> {
    if matches!(info.ty, InstType::S | InstType::Sc) {
        write!(sink, "x{}", info.s_base.raw())?;
        for (id, _) in &commit.reads {
            if *id != info.s_base && !suppressed(*id) {
                write!(sink, "y{}", id.raw())?;
            }
        }
    } else {
        for (id, _) in &commit.reads {
            if !suppressed(*id) {
                write!(sink, "x{}", id.raw())?;
            }
        }
    }
    Ok(())
}

/// Writes the destination-register operand section (§4.3 item 2): every
/// committed write as `z`, except `x0`, `vstatus`, and (by default) CSRs.
fn write_destination_registers<W: Write>(
    sink: &mut W,
    commit: &CommitLog,
) -> Result<(), G4TraceError> {
    for id in &commit.writes {
        if id.is_x0() || id.is_vstatus() {
            continue;
        }
        if id.is_csr() && SUPPRESS_CSR {
            continue;
        }
        write!(sink, "z{}", id.raw())?;
    }
    Ok(())
}

/// Whether a committed read should be suppressed from the source-register
/// operand section: CSR and `vstatus` reads, by default.
fn suppressed(id: RegisterId) -> bool {
    (id.is_csr() && SUPPRESS_CSR) || (id.is_vstatus() && SUPPRESS_VSTATUS)
}

/// Encodes a non-empty list of memory accesses per §4.4.
fn write_mem_accesses<W: Write>(
    sink: &mut W,
    accesses: &[crate::commit::MemAccess],
    shape: MemAccessShape,
) -> Result<(), G4TraceError> {
    match shape {
        MemAccessShape::Scalar => {
            assert_eq!(accesses.len(), 1, "scalar access must report exactly one address");
            let access = accesses[0];
            write!(sink, " {:x} {}", access.addr, access.size)?;
        }
        MemAccessShape::Contiguous => {
            let first = accesses[0];
            write!(sink, "s{}e{} {:x}", first.size, accesses.len(), first.addr)?;
        }
        MemAccessShape::Indexed => {
            let first = accesses[0];
            write!(sink, "s{}e{}", first.size, accesses.len())?;
            for (index, access) in accesses.iter().enumerate() {
                let separator = if index == 0 { ' ' } else { ',' };
                write!(sink, "{separator}{:x}", access.addr)?;
            }
        }
        MemAccessShape::Strided | MemAccessShape::Invalid => {
            write!(sink, " TODO access_type={}", shape as i32)?;
            for access in accesses {
                write!(sink, " {:x} {}", access.addr, access.size)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::MemAccess;
    use crate::config::SessionConfig;
    use crate::session::SessionCoordinator;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn enabled_state(dir: &Path) -> PerProcessorTraceState {
        let coordinator = SessionCoordinator::new(SessionConfig {
            enable: true,
            verbose: false,
            filter_privileged: false,
            destination: dir.to_path_buf(),
            max_trace_instructions: u64::MAX,
            compression: "none".to_owned(),
        });
        PerProcessorTraceState::new(Arc::new(coordinator))
    }

    fn read_trace(dir: &Path) -> String {
        std::fs::read_to_string(dir.join("trace-0000.trc")).unwrap()
    }

    const SRAI_START_TRACING: u32 = 0x4020_5013;
    const SRAI_END_ROI: u32 = 0x4010_5013;

    #[test]
    fn minimal_scenario() {
        let dir = tempdir().unwrap();
        let mut state = enabled_state(dir.path());

        emit(&mut state, 0x1000, SRAI_START_TRACING, false, &CommitLog::default()).unwrap();

        // add x5, x1, x2 at 0x1004.
        let add = (2 << 20) | (1 << 15) | (5 << 7) | 0b0110011;
        let mut commit = CommitLog::default();
        commit.reads.push((RegisterId::integer(1), 0));
        commit.reads.push((RegisterId::integer(2), 0));
        commit.writes.push(RegisterId::integer(5));
        emit(&mut state, 0x1004, add, false, &commit).unwrap();

        emit(&mut state, 0x1008, SRAI_END_ROI, false, &CommitLog::default()).unwrap();
        state.close_sink().unwrap();

        assert_eq!(read_trace(dir.path()), "1004\n0x1x2z5\nEND 1004\n");
    }

    #[test]
    fn store_scenario() {
        let dir = tempdir().unwrap();
        let mut state = enabled_state(dir.path());
        emit(&mut state, 0x1000, SRAI_START_TRACING, false, &CommitLog::default()).unwrap();

        // sw x5, 0(x10) at 0x1008 (delta 4 from header next-pc 0x1004).
        let sw = (5 << 20) | (10 << 15) | (0b010 << 12) | 0b0100011;
        let mut commit = CommitLog::default();
        commit.reads.push((RegisterId::integer(10), 0x2_0000));
        commit.reads.push((RegisterId::integer(5), 0));
        commit.stores.push(MemAccess::new(0x2_0000, 4));
        emit(&mut state, 0x1008, sw, false, &commit).unwrap();
        state.close_sink().unwrap();

        assert_eq!(read_trace(dir.path()), "1004\nS4x10y5 20000 4\n");
    }

    #[test]
    fn instruction_cap_emits_end_and_nothing_else() {
        let dir = tempdir().unwrap();
        let coordinator = SessionCoordinator::new(SessionConfig {
            enable: true,
            verbose: false,
            filter_privileged: false,
            destination: dir.path().to_path_buf(),
            max_trace_instructions: 1,
            compression: "none".to_owned(),
        });
        let mut state = PerProcessorTraceState::new(Arc::new(coordinator));
        emit(&mut state, 0x1000, SRAI_START_TRACING, false, &CommitLog::default()).unwrap();

        let nop = 0b0110011; // add x0, x0, x0 (GENERIC, no operands)
        emit(&mut state, 0x1004, nop, false, &CommitLog::default()).unwrap();
        emit(&mut state, 0x1008, nop, false, &CommitLog::default()).unwrap();
        state.close_sink().unwrap();

        assert_eq!(read_trace(dir.path()), "1004\n0\nEND 1004\n");
    }

    #[test]
    fn second_start_tracing_is_ignored() {
        let dir = tempdir().unwrap();
        let mut state = enabled_state(dir.path());
        emit(&mut state, 0x1000, SRAI_START_TRACING, false, &CommitLog::default()).unwrap();
        emit(&mut state, 0x1004, SRAI_START_TRACING, false, &CommitLog::default()).unwrap();
        state.close_sink().unwrap();

        assert_eq!(read_trace(dir.path()), "1004\n");
    }

    #[test]
    fn disabled_session_emits_nothing() {
        let dir = tempdir().unwrap();
        let coordinator = SessionCoordinator::new(SessionConfig::default());
        let mut state = PerProcessorTraceState::new(Arc::new(coordinator));
        emit(&mut state, 0x1000, SRAI_START_TRACING, false, &CommitLog::default()).unwrap();
        assert!(!state.sink_is_open());
        assert!(!dir.path().join("trace-0000.trc").exists());
    }
}
