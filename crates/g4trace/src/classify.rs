//! Instruction classifier (§4.2).
//!
//! Maps a committed instruction's mnemonic, together with the commit-log
//! side effects the simulator observed for it, to an [`InstInfo`]. This is
//! the authoritative classifier; an opcode-bit-decoded form is not carried
//! forward here since the mnemonic-keyed table is what the trace format is
//! actually defined against.

use crate::commit::CommitLog;
use crate::common::reg::RegisterId;
use crate::inst::{InstInfo, InstType};
use crate::mnemonic::{mnemonic_of, ArithClass, Mnemonic};
use crate::shape::{decode_mem_access_shape, MemAccessShape};

/// Integer link registers recognised as call/return link targets (`ra`/`x1`
/// and `x5`, the alternate link register).
const fn is_link(reg: usize) -> bool {
    reg == 1 || reg == 5
}

/// Classifies one committed instruction.
///
/// `raw` is the instruction word (16 bits, zero-extended, when
/// `is_compressed`; otherwise the full 32-bit encoding). `pc` is this
/// instruction's program counter. `commit` is the simulator's reported side
/// effects for this instruction, used to resolve indirect-jump targets.
#[must_use]
pub fn classify(raw: u32, is_compressed: bool, pc: u64, commit: &CommitLog) -> InstInfo {
    match mnemonic_of(raw, is_compressed) {
        Mnemonic::Srai { shamt } => classify_srai(shamt),
        Mnemonic::Branch { imm, .. } => {
            let mut info = InstInfo::new(InstType::B);
            info.target = Some(pc.wrapping_add(imm as u64));
            info
        }
        Mnemonic::Jal { rd, imm } => {
            let ty = if rd == 0 {
                InstType::J
            } else if is_link(rd) {
                InstType::C
            } else {
                // A jal writing a non-link register still links; the spec's
                // two-way split only distinguishes "discards the link"
                // (rd=0) from "writes a recognised link register". Treat an
                // unusual link register the same as a direct call.
                InstType::C
            };
            let mut info = InstInfo::new(ty);
            info.target = Some(pc.wrapping_add(imm as u64));
            info
        }
        Mnemonic::Jalr { rd, rs1, imm } => {
            let rd_link = is_link(rd);
            let rs1_link = is_link(rs1);
            let ty = if !rd_link && rs1_link {
                InstType::R
            } else {
                InstType::IndirectCall
            };
            classify_indirect(ty, rs1, imm, commit)
        }
        Mnemonic::CJr { rs1 } => {
            let ty = if is_link(rs1) {
                InstType::R
            } else {
                InstType::IndirectJump
            };
            classify_indirect(ty, rs1, 0, commit)
        }
        Mnemonic::CJalr { rs1 } => classify_indirect(InstType::IndirectCall, rs1, 0, commit),
        Mnemonic::ScalarLoad { rs1, rd, is_float } => {
            let mut info = InstInfo::new(InstType::L);
            info.shape = MemAccessShape::Scalar;
            info.s_base = RegisterId::integer(rs1 as u32);
            let _ = (rd, is_float);
            info
        }
        Mnemonic::ScalarStore { rs1, rs2, is_float } => {
            let mut info = InstInfo::new(InstType::S);
            info.shape = MemAccessShape::Scalar;
            info.s_base = RegisterId::integer(rs1 as u32);
            info.s_data = if is_float {
                RegisterId::float(rs2 as u32)
            } else {
                RegisterId::integer(rs2 as u32)
            };
            info
        }
        Mnemonic::VectorLoad { raw: inst, rs1, rd } => {
            let mut info = InstInfo::new(InstType::L);
            info.shape = decode_mem_access_shape(inst);
            info.s_base = RegisterId::integer(rs1 as u32);
            let _ = rd;
            info
        }
        Mnemonic::VectorStore { raw: inst, rs1, rs2 } => {
            let mut info = InstInfo::new(InstType::S);
            info.shape = decode_mem_access_shape(inst);
            info.s_base = RegisterId::integer(rs1 as u32);
            info.s_data = RegisterId::vector(rs2 as u32);
            info
        }
        Mnemonic::LoadReserved { rs1, rd } => {
            let mut info = InstInfo::new(InstType::Lr);
            info.shape = MemAccessShape::Scalar;
            info.s_base = RegisterId::integer(rs1 as u32);
            let _ = rd;
            info
        }
        Mnemonic::StoreConditional { rs1, rs2 } => {
            let mut info = InstInfo::new(InstType::Sc);
            info.shape = MemAccessShape::Scalar;
            info.s_base = RegisterId::integer(rs1 as u32);
            info.s_data = RegisterId::integer(rs2 as u32);
            info
        }
        Mnemonic::Amo { rs1, rs2 } => {
            let mut info = InstInfo::new(InstType::Rmw);
            info.shape = MemAccessShape::Scalar;
            info.s_base = RegisterId::integer(rs1 as u32);
            info.s_data = RegisterId::integer(rs2 as u32);
            info
        }
        Mnemonic::FpArith(class) => InstInfo::new(match class {
            ArithClass::Add => InstType::A,
            ArithClass::Mul => InstType::M,
            ArithClass::Div => InstType::D,
            ArithClass::Sqrt => InstType::Q,
        }),
        Mnemonic::Generic => InstInfo::new(InstType::Generic),
        Mnemonic::Unknown => InstInfo::new(InstType::Unknown),
    }
}

fn classify_srai(shamt: u32) -> InstInfo {
    match shamt {
        2 => InstInfo::new(InstType::StartTracing),
        0 => InstInfo::new(InstType::Clear),
        1 => InstInfo::new(InstType::EndRoi),
        _ => InstInfo::new(InstType::Generic),
    }
}

/// Resolves an indirect jump/call/return target from the commit-log's
/// read-set, per the commit-log-dependence design note: by the time the
/// emitter runs, the live register file may already hold the post-commit
/// value, so the target must come from what the simulator reported `rs1`
/// held *at* commit.
fn classify_indirect(ty: InstType, rs1: usize, imm: i64, commit: &CommitLog) -> InstInfo {
    let mut info = InstInfo::new(ty);
    let base = commit
        .read_value(RegisterId::integer(rs1 as u32))
        .unwrap_or(0);
    let target = (base.wrapping_add(imm as u64)) & !1u64;
    info.target = Some(target);
    info
}
