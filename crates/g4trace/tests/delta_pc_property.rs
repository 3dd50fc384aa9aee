//! Property test (§8): the delta-PC chain the emitter writes must always
//! permit exact reconstruction of the original PC sequence, for any
//! sequence of forward gaps between committed instructions.

use std::path::Path;
use std::sync::Arc;

use g4trace::{CommitLog, PerProcessorTraceState, SessionConfig, SessionCoordinator};
use proptest::prelude::*;
use tempfile::tempdir;

const SRAI_START_TRACING: u32 = 0x4020_5013;
/// `add x0, x0, x0`: classifies as `Generic`, which carries no tag and no
/// operands, so each record is a bare signed `diff_pc`.
const GENERIC_NOP: u32 = 0b0110011;

fn session_in(dir: &Path) -> PerProcessorTraceState {
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

/// Walks a trace's delta-PC chain back into absolute addresses, starting
/// from the `START_TRACING` header's next-PC line.
fn reconstruct_pcs(trace: &str) -> Vec<u64> {
    let mut lines = trace.lines();
    let mut pc = u64::from_str_radix(lines.next().expect("header line"), 16).unwrap();
    let mut pcs = Vec::new();
    for line in lines {
        let diff: i64 = line.parse().expect("a Generic record is a bare signed diff_pc");
        pc = (pc as i64 + diff) as u64;
        pcs.push(pc);
    }
    pcs
}

proptest! {
    #[test]
    fn delta_pc_chain_round_trips_for_any_gap_sequence(
        gaps in proptest::collection::vec(2i64..=4096, 1..64)
    ) {
        let dir = tempdir().unwrap();
        let mut state = session_in(dir.path());

        let start_pc = 0x8000_0000u64;
        g4trace::emit(&mut state, start_pc, SRAI_START_TRACING, false, &CommitLog::default()).unwrap();

        let mut pc = start_pc.wrapping_add(4);
        let mut expected = Vec::with_capacity(gaps.len());
        for gap in &gaps {
            pc = pc.wrapping_add(*gap as u64);
            expected.push(pc);
            g4trace::emit(&mut state, pc, GENERIC_NOP, false, &CommitLog::default()).unwrap();
        }
        state.close_sink().unwrap();

        let trace = std::fs::read_to_string(dir.path().join("trace-0000.trc")).unwrap();
        prop_assert_eq!(reconstruct_pcs(&trace), expected);
    }
}
