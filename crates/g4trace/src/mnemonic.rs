//! Mnemonic identification.
//!
//! Per the design notes, the set of mnemonics the classifier dispatches on
//! is closed and known at build time, so it is represented here as a tagged
//! variant rather than a runtime closure table keyed by instruction-name
//! string. [`mnemonic_of`] is the pure decode step; [`crate::classify`]
//! consumes its output together with the commit-log to produce an
//! [`crate::inst::InstInfo`].
//!
//! Every arithmetic/system/logic mnemonic that the classifier does not
//! specially treat collapses to [`Mnemonic::Generic`] here already — the
//! classifier does not need to know, say, `add` from `xor` from `csrrw`,
//! only that none of them are loads, stores, branches, or floating-point.

use crate::isa::instruction::Decoded;
use crate::isa::privileged::opcodes as sys_op;
use crate::isa::rv64a::{funct5 as a_f5, opcodes as a_op};
use crate::isa::rv64d::funct7 as d_f7;
use crate::isa::rv64f::{funct7 as f_f7, opcodes as fp_op};
use crate::isa::rv64i::{funct3 as i_f3, funct7 as i_f7, opcodes as i_op};
use crate::isa::rvc::constants::{q2, QUADRANT_2};
use crate::isa::rvc::expand::expand;

/// Floating/vector arithmetic class, broken out so the downstream model can
/// charge distinct latencies (`A`/`M`/`D`/`Q` in the spec's `InstType`
/// alphabet).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithClass {
    /// Add/subtract, and vector reductions over add.
    Add,
    /// Multiply, and fused multiply-add.
    Mul,
    /// Divide.
    Div,
    /// Square root.
    Sqrt,
}

/// The mnemonic identity of a committed instruction, as far as the
/// classifier cares.
#[derive(Clone, Copy, Debug)]
pub enum Mnemonic {
    /// `srai`, carrying its shift amount (0/1/2 are reserved tracing
    /// markers; any other value is an ordinary arithmetic shift).
    Srai {
        /// Shift amount (low 6 bits of the I-type immediate).
        shamt: u32,
    },
    /// Any of `beq`/`bne`/`blt`/`bge`/`bltu`/`bgeu`, or the compressed
    /// `c.beqz`/`c.bnez` forms (reconstructed by `expand`).
    Branch {
        /// First compared register.
        rs1: usize,
        /// Second compared register (`x0` for the compressed `z`-forms).
        rs2: usize,
        /// Sign-extended branch offset.
        imm: i64,
    },
    /// `jal`, or the compressed `c.j` (reconstructed by `expand`).
    Jal {
        /// Destination (link) register; `0` for `c.j`.
        rd: usize,
        /// Sign-extended jump offset.
        imm: i64,
    },
    /// The standard 32-bit `jalr`.
    Jalr {
        /// Destination (link) register.
        rd: usize,
        /// Base register the target is computed from.
        rs1: usize,
        /// Sign-extended offset added to `rs1`.
        imm: i64,
    },
    /// The compressed `c.jr` (distinct from `jalr` because it can resolve to
    /// a plain indirect jump, not only return/call — see the classifier).
    CJr {
        /// Register holding the jump target.
        rs1: usize,
    },
    /// The compressed `c.jalr`, which the spec always classifies as an
    /// indirect call.
    CJalr {
        /// Register holding the call target.
        rs1: usize,
    },
    /// Any scalar integer or floating-point load (`lb`..`ld`, `flw`/`fld`,
    /// and their compressed forms).
    ScalarLoad {
        /// Base register.
        rs1: usize,
        /// Destination register (bank determined by `is_float`).
        rd: usize,
        /// Whether this is a floating-point load (destination is an `f`
        /// register).
        is_float: bool,
    },
    /// Any scalar integer or floating-point store (`sb`..`sd`, `fsw`/`fsd`,
    /// and their compressed forms).
    ScalarStore {
        /// Base register.
        rs1: usize,
        /// Data register (bank determined by `is_float`).
        rs2: usize,
        /// Whether this is a floating-point store.
        is_float: bool,
    },
    /// A vector load (`LOAD-FP` major opcode with a vector-shaped width
    /// field — see [`crate::shape`]).
    VectorLoad {
        /// Raw instruction word, needed by the shape decoder.
        raw: u32,
        /// Base register.
        rs1: usize,
        /// Destination vector register.
        rd: usize,
    },
    /// A vector store (`STORE-FP` major opcode, vector-shaped width field).
    VectorStore {
        /// Raw instruction word, needed by the shape decoder.
        raw: u32,
        /// Base register.
        rs1: usize,
        /// Source vector register (`vs3`, encoded in the `rd` field).
        rs2: usize,
    },
    /// `lr.w`/`lr.d`.
    LoadReserved {
        /// Address register.
        rs1: usize,
        /// Destination register.
        rd: usize,
    },
    /// `sc.w`/`sc.d`.
    StoreConditional {
        /// Address register.
        rs1: usize,
        /// Data register.
        rs2: usize,
    },
    /// Any `amo*.w`/`amo*.d`.
    Amo {
        /// Address register.
        rs1: usize,
        /// Data register.
        rs2: usize,
    },
    /// Floating-point arithmetic classified into one of the four latency
    /// classes.
    FpArith(ArithClass),
    /// Any recognised mnemonic the classifier does not specially treat.
    Generic,
    /// An encoding that does not correspond to any recognised RV64GC
    /// mnemonic (custom/reserved major opcode).
    Unknown,
}

/// Major opcode for vector arithmetic (`OP-V`); treated as `GENERIC`
/// alongside scalar ALU ops since this crate does not decode individual
/// vector arithmetic operations.
const MAJOR_OPCODE_OP_V: u32 = 0b101_0111;

/// Identifies the mnemonic of a committed instruction.
///
/// `raw` holds the 16-bit encoding in its low bits when `is_compressed` is
/// set, otherwise the full 32-bit encoding.
#[must_use]
pub fn mnemonic_of(raw: u32, is_compressed: bool) -> Mnemonic {
    if !is_compressed {
        return mnemonic_of_standard(raw);
    }

    let inst16 = raw as u16;

    // c.jr/c.jalr must be told apart from a standard jalr before expansion:
    // both expand to the same OP_JALR-opcode 32-bit word, but the spec gives
    // them different classification rules (a standard jalr never resolves
    // to a plain indirect jump, while c.jr can).
    let quadrant = inst16 & 0x3;
    let funct3 = (inst16 >> 13) & 0x7;
    if quadrant == QUADRANT_2 && funct3 == q2::C_MISC_ALU {
        let bit12 = (inst16 >> 12) & 1;
        let rs2 = usize::from((inst16 >> 2) & 0x1F);
        let rs1 = usize::from((inst16 >> 7) & 0x1F);
        if rs2 == 0 && rs1 != 0 {
            return if bit12 == 0 {
                Mnemonic::CJr { rs1 }
            } else {
                Mnemonic::CJalr { rs1 }
            };
        }
    }

    let expanded = expand(inst16);
    if expanded == 0 {
        // Reserved/hint encoding (e.g. C.ADDI4SPN with an all-zero
        // immediate, or rd=x0 on a form that requires rd != 0).
        return Mnemonic::Generic;
    }
    mnemonic_of_standard(expanded)
}

fn mnemonic_of_standard(inst: u32) -> Mnemonic {
    let decoded: Decoded = crate::isa::decode::decode(inst);
    let opcode = decoded.opcode;

    if opcode == i_op::OP_IMM {
        return if decoded.funct3 == i_f3::SRL_SRA && decoded.funct7 == i_f7::SRA {
            Mnemonic::Srai {
                shamt: (decoded.imm as u32) & 0x3F,
            }
        } else {
            Mnemonic::Generic
        };
    }
    if opcode == i_op::OP_BRANCH {
        return Mnemonic::Branch {
            rs1: decoded.rs1,
            rs2: decoded.rs2,
            imm: decoded.imm,
        };
    }
    if opcode == i_op::OP_JAL {
        return Mnemonic::Jal {
            rd: decoded.rd,
            imm: decoded.imm,
        };
    }
    if opcode == i_op::OP_JALR {
        return Mnemonic::Jalr {
            rd: decoded.rd,
            rs1: decoded.rs1,
            imm: decoded.imm,
        };
    }
    if opcode == i_op::OP_LOAD {
        return Mnemonic::ScalarLoad {
            rs1: decoded.rs1,
            rd: decoded.rd,
            is_float: false,
        };
    }
    if opcode == fp_op::OP_LOAD_FP {
        return if is_vector_width(decoded.funct3) {
            Mnemonic::VectorLoad {
                raw: inst,
                rs1: decoded.rs1,
                rd: decoded.rd,
            }
        } else {
            Mnemonic::ScalarLoad {
                rs1: decoded.rs1,
                rd: decoded.rd,
                is_float: true,
            }
        };
    }
    if opcode == i_op::OP_STORE {
        return Mnemonic::ScalarStore {
            rs1: decoded.rs1,
            rs2: decoded.rs2,
            is_float: false,
        };
    }
    if opcode == fp_op::OP_STORE_FP {
        return if is_vector_width(decoded.funct3) {
            Mnemonic::VectorStore {
                raw: inst,
                rs1: decoded.rs1,
                rs2: decoded.rd,
            }
        } else {
            Mnemonic::ScalarStore {
                rs1: decoded.rs1,
                rs2: decoded.rs2,
                is_float: true,
            }
        };
    }
    if opcode == a_op::OP_AMO {
        let funct5 = decoded.funct7 >> 2;
        return if funct5 == a_f5::LR {
            Mnemonic::LoadReserved {
                rs1: decoded.rs1,
                rd: decoded.rd,
            }
        } else if funct5 == a_f5::SC {
            Mnemonic::StoreConditional {
                rs1: decoded.rs1,
                rs2: decoded.rs2,
            }
        } else {
            Mnemonic::Amo {
                rs1: decoded.rs1,
                rs2: decoded.rs2,
            }
        };
    }
    if opcode == fp_op::OP_FP {
        return fp_arith_class(decoded.funct7).map_or(Mnemonic::Generic, Mnemonic::FpArith);
    }
    if opcode == fp_op::OP_FMADD
        || opcode == fp_op::OP_FMSUB
        || opcode == fp_op::OP_FNMADD
        || opcode == fp_op::OP_FNMSUB
    {
        return Mnemonic::FpArith(ArithClass::Mul);
    }
    if opcode == sys_op::OP_SYSTEM || opcode == MAJOR_OPCODE_OP_V {
        return Mnemonic::Generic;
    }
    if opcode == i_op::OP_REG
        || opcode == i_op::OP_REG_32
        || opcode == i_op::OP_IMM_32
        || opcode == i_op::OP_LUI
        || opcode == i_op::OP_AUIPC
        || opcode == i_op::OP_MISC_MEM
    {
        return Mnemonic::Generic;
    }
    Mnemonic::Unknown
}

/// Maps an `OP_FP` `funct7` (single or double precision) to the four
/// classifiable arithmetic classes; returns `None` for the funct7 values the
/// classifier does not specially treat (compare, convert, sign-inject,
/// classify, move).
fn fp_arith_class(funct7: u32) -> Option<ArithClass> {
    match funct7 {
        _ if funct7 == f_f7::FADD || funct7 == d_f7::FADD_D => Some(ArithClass::Add),
        _ if funct7 == f_f7::FSUB || funct7 == d_f7::FSUB_D => Some(ArithClass::Add),
        _ if funct7 == f_f7::FMUL || funct7 == d_f7::FMUL_D => Some(ArithClass::Mul),
        _ if funct7 == f_f7::FDIV || funct7 == d_f7::FDIV_D => Some(ArithClass::Div),
        _ if funct7 == f_f7::FSQRT || funct7 == d_f7::FSQRT_D => Some(ArithClass::Sqrt),
        _ => None,
    }
}

/// A `LOAD-FP`/`STORE-FP` width field selects a vector op when it is `0` or
/// greater than `5` (see [`crate::shape`]); scalar single/double/quad widths
/// are `2`/`3`/`4`.
const fn is_vector_width(width: u32) -> bool {
    width == 0 || width > 5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srai_with_shamt_two_is_identified() {
        // srai x0, x0, 2
        let inst = (0x20 << 25) | (2 << 20) | (i_f3::SRL_SRA << 12) | i_op::OP_IMM;
        match mnemonic_of(inst, false) {
            Mnemonic::Srai { shamt } => assert_eq!(shamt, 2),
            other => panic!("expected Srai, got {other:?}"),
        }
    }

    #[test]
    fn srli_is_not_srai() {
        let inst = (2 << 20) | (i_f3::SRL_SRA << 12) | i_op::OP_IMM;
        assert!(matches!(mnemonic_of(inst, false), Mnemonic::Generic));
    }

    #[test]
    fn standard_jalr_is_jalr_not_cjr() {
        let inst = (4 << 15) | i_op::OP_JALR;
        assert!(matches!(mnemonic_of(inst, false), Mnemonic::Jalr { .. }));
    }

    #[test]
    fn compressed_jr_is_cjr() {
        // c.jr x1: quadrant 2, funct3=100, bit12=0, rs1=1, rs2=0.
        let inst16: u16 = (1 << 7) | (q2::C_MISC_ALU << 13) | QUADRANT_2;
        match mnemonic_of(u32::from(inst16), true) {
            Mnemonic::CJr { rs1 } => assert_eq!(rs1, 1),
            other => panic!("expected CJr, got {other:?}"),
        }
    }

    #[test]
    fn compressed_jalr_is_cjalr() {
        // c.jalr x1: quadrant 2, funct3=100, bit12=1, rs1=1, rs2=0.
        let inst16: u16 = (1 << 12) | (1 << 7) | (q2::C_MISC_ALU << 13) | QUADRANT_2;
        match mnemonic_of(u32::from(inst16), true) {
            Mnemonic::CJalr { rs1 } => assert_eq!(rs1, 1),
            other => panic!("expected CJalr, got {other:?}"),
        }
    }

    #[test]
    fn lr_w_is_load_reserved() {
        let inst = (a_f5::LR << 27) | (1 << 15) | a_op::OP_AMO;
        assert!(matches!(
            mnemonic_of(inst, false),
            Mnemonic::LoadReserved { .. }
        ));
    }

    #[test]
    fn sc_w_is_store_conditional() {
        let inst = (a_f5::SC << 27) | (1 << 15) | (2 << 20) | a_op::OP_AMO;
        assert!(matches!(
            mnemonic_of(inst, false),
            Mnemonic::StoreConditional { .. }
        ));
    }

    #[test]
    fn amoadd_is_amo() {
        let inst = (a_f5::AMOADD << 27) | (1 << 15) | (2 << 20) | a_op::OP_AMO;
        assert!(matches!(mnemonic_of(inst, false), Mnemonic::Amo { .. }));
    }

    #[test]
    fn fadd_s_is_add_class() {
        let inst = (f_f7::FADD << 25) | fp_op::OP_FP;
        assert!(matches!(
            mnemonic_of(inst, false),
            Mnemonic::FpArith(ArithClass::Add)
        ));
    }

    #[test]
    fn fmadd_is_mul_class() {
        let inst = fp_op::OP_FMADD;
        assert!(matches!(
            mnemonic_of(inst, false),
            Mnemonic::FpArith(ArithClass::Mul)
        ));
    }

    #[test]
    fn fcvt_is_generic_not_unknown() {
        let inst = (f_f7::FCVT_W_F << 25) | fp_op::OP_FP;
        assert!(matches!(mnemonic_of(inst, false), Mnemonic::Generic));
    }

    #[test]
    fn custom_opcode_is_unknown() {
        let inst: u32 = 0b0001011;
        assert!(matches!(mnemonic_of(inst, false), Mnemonic::Unknown));
    }

    #[test]
    fn vector_load_uses_vector_width() {
        let inst = fp_op::OP_LOAD_FP;
        assert!(matches!(
            mnemonic_of(inst, false),
            Mnemonic::VectorLoad { .. }
        ));
    }
}
