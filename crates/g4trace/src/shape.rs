//! Memory-access shape decoder.
//!
//! Pure helper that inspects a raw instruction word to decide whether a
//! memory operation addresses one scalar location or a vector of locations,
//! and if the latter, in which layout. This is independent of the mnemonic
//! classifier: it only needs the raw bits, and the classifier calls into it
//! once it already knows the instruction is a load or a store.

use crate::isa::instruction::InstructionBits;

/// Opcode quadrant (low 2 bits) every full-width RISC-V instruction must
/// carry.
const STANDARD_QUADRANT: u32 = 0b11;

/// Major opcode (bits 6-2) for vector/scalar floating-point loads
/// (`LOAD-FP`).
const MAJOR_OPCODE_LOAD_FP: u32 = 0x01;

/// Major opcode (bits 6-2) for vector/scalar floating-point stores
/// (`STORE-FP`).
const MAJOR_OPCODE_STORE_FP: u32 = 0x09;

/// Shape of a memory access: how many addresses a single instruction
/// touches, and how they relate to each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemAccessShape {
    /// Exactly one address.
    Scalar,
    /// `n` elements of equal size starting at a single (lowest) address.
    Contiguous,
    /// `n` addresses separated by a fixed (possibly non-unit) stride.
    ///
    /// Reserved: the emitter falls back to a `TODO access_type=` encoding
    /// for this shape rather than a fully specified one (see
    /// [`crate::emitter`]'s memory-address encoding and the open question
    /// recorded in `DESIGN.md`).
    Strided,
    /// `n` addresses, not necessarily contiguous or ordered.
    Indexed,
    /// Not a valid memory-access shape (e.g. malformed vector encoding).
    Invalid,
}

/// Decodes the memory-access shape of `inst`.
///
/// Returns [`MemAccessShape::Scalar`] for any non-vector memory operation.
/// Asserts that the instruction's opcode quadrant is `0b11` (standard
/// 32-bit encoding) — this decoder is never called on a 16-bit compressed
/// word.
#[must_use]
pub fn decode_mem_access_shape(inst: u32) -> MemAccessShape {
    assert_eq!(
        inst & STANDARD_QUADRANT,
        STANDARD_QUADRANT,
        "memory-access shape decoder called on a non-standard-width instruction"
    );

    let major_opcode = (inst.opcode() >> 2) & 0x1F;
    let width = inst.funct3();

    let is_vector_mem = matches!(major_opcode, MAJOR_OPCODE_LOAD_FP | MAJOR_OPCODE_STORE_FP)
        && (width == 0 || width > 5);

    if !is_vector_mem {
        return MemAccessShape::Scalar;
    }

    let mop = (inst >> 26) & 0x3;
    match mop {
        0 => MemAccessShape::Contiguous,
        1 | 3 => MemAccessShape::Indexed,
        2 => MemAccessShape::Strided,
        _ => MemAccessShape::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_fields(opcode: u32, width: u32, mop: u32) -> u32 {
        opcode | (width << 12) | (mop << 26)
    }

    #[test]
    fn scalar_integer_load_is_scalar() {
        // lw x1, 0(x2): opcode OP_LOAD (0b0000011), width=2.
        let inst = with_fields(0b0000011, 2, 0);
        assert_eq!(decode_mem_access_shape(inst), MemAccessShape::Scalar);
    }

    #[test]
    fn scalar_fp_load_with_fp_width_is_scalar() {
        // flw: opcode LOAD-FP (0b0000111), width=2 (W) stays scalar.
        let inst = with_fields(0b0000111, 2, 0);
        assert_eq!(decode_mem_access_shape(inst), MemAccessShape::Scalar);
    }

    #[test]
    fn vector_load_contiguous() {
        let inst = with_fields(0b0000111, 0, 0);
        assert_eq!(decode_mem_access_shape(inst), MemAccessShape::Contiguous);
    }

    #[test]
    fn vector_load_strided() {
        let inst = with_fields(0b0000111, 6, 2);
        assert_eq!(decode_mem_access_shape(inst), MemAccessShape::Strided);
    }

    #[test]
    fn vector_load_indexed() {
        let inst_unordered = with_fields(0b0000111, 6, 1);
        let inst_ordered = with_fields(0b0000111, 6, 3);
        assert_eq!(decode_mem_access_shape(inst_unordered), MemAccessShape::Indexed);
        assert_eq!(decode_mem_access_shape(inst_ordered), MemAccessShape::Indexed);
    }

    #[test]
    fn vector_store_uses_store_fp_major_opcode() {
        let inst = with_fields(0b0100111, 0, 0);
        assert_eq!(decode_mem_access_shape(inst), MemAccessShape::Contiguous);
    }

    #[test]
    #[should_panic(expected = "non-standard-width")]
    fn panics_on_compressed_quadrant() {
        let _ = decode_mem_access_shape(0b01);
    }
}
