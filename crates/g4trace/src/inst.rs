//! Abstract instruction taxonomy and per-instruction classifier output.

use crate::common::reg::RegisterId;
use crate::shape::MemAccessShape;

/// Abstract operation class a committed instruction is classified into.
///
/// This is deliberately coarser than the RISC-V mnemonic space: the
/// downstream microarchitectural model only needs to tell memory ops apart
/// from control flow apart from floating-point latency classes, not every
/// individual opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstType {
    /// Any ALU/vector/system op not specially treated.
    Generic,
    /// Ordinary load.
    L,
    /// Load-reserved.
    Lr,
    /// Ordinary store.
    S,
    /// Store-conditional.
    Sc,
    /// Atomic read-modify-write.
    Rmw,
    /// Conditional branch.
    B,
    /// Call (`jal`/`jalr` writing a link register).
    C,
    /// Indirect call (`jalr` variant).
    IndirectCall,
    /// Unconditional direct jump (no link).
    J,
    /// Indirect jump (`jr` to a non-link register).
    IndirectJump,
    /// Return (`jr` on a link register).
    R,
    /// Floating/vector add (and vector reductions over add).
    A,
    /// Floating/vector multiply (and FMA).
    M,
    /// Floating/vector divide.
    D,
    /// Floating/vector square root.
    Q,
    /// Reserved no-op: begin tracing / write header.
    StartTracing,
    /// Reserved no-op: region-of-interest begin.
    Clear,
    /// Reserved no-op: region-of-interest end.
    EndRoi,
    /// Unrecognised mnemonic; non-fatal only in verbose mode.
    Unknown,
    /// Catch-all for a classification that could not be formed at all.
    Invalid,
}

impl InstType {
    /// The single-letter (or two-letter, for `LR`/`SC`/`RMW`/multi-char tags)
    /// prefix this type contributes to a trace record, or `None` for the
    /// types that are emitted with no letter prefix (`GENERIC`) or that never
    /// reach the generic operand-writing path (the three markers).
    #[must_use]
    pub const fn trace_tag(self) -> Option<&'static str> {
        match self {
            Self::Generic => None,
            Self::L => Some("L"),
            Self::Lr => Some("LR"),
            Self::S => Some("S"),
            Self::Sc => Some("SC"),
            Self::Rmw => Some("RMW"),
            Self::B => Some("B"),
            Self::C => Some("C"),
            Self::IndirectCall => Some("c"),
            Self::J => Some("J"),
            Self::IndirectJump => Some("j"),
            Self::R => Some("r"),
            Self::A => Some("A"),
            Self::M => Some("M"),
            Self::D => Some("D"),
            Self::Q => Some("Q"),
            Self::Unknown => Some("UNKNOWN"),
            Self::StartTracing | Self::Clear | Self::EndRoi | Self::Invalid => None,
        }
    }

    /// Whether invariant (b) (§3) requires a non-invalid [`MemAccessShape`]
    /// for this type.
    #[must_use]
    pub const fn requires_shape(self) -> bool {
        matches!(self, Self::L | Self::Lr | Self::S | Self::Sc | Self::Rmw)
    }

    /// Whether invariant (c) (§3) requires non-invalid `s_base`/`s_data` for
    /// this type.
    #[must_use]
    pub const fn requires_store_operands(self) -> bool {
        matches!(self, Self::S | Self::Sc | Self::Rmw)
    }

    /// Whether invariant (d) (§3) requires a non-invalid `target` for this
    /// type.
    #[must_use]
    pub const fn requires_target(self) -> bool {
        matches!(
            self,
            Self::B | Self::C | Self::IndirectCall | Self::J | Self::IndirectJump | Self::R
        )
    }
}

/// Classifier output for a single committed instruction.
///
/// Fields default to invalid sentinels; the classifier populates only the
/// fields relevant to `ty`.
#[derive(Clone, Copy, Debug)]
pub struct InstInfo {
    /// Abstract operation class.
    pub ty: InstType,
    /// Base register for a store/RMW (`s_base` in the spec).
    pub s_base: RegisterId,
    /// Data register for a store/RMW (`s_data` in the spec).
    pub s_data: RegisterId,
    /// Memory-access shape, for load/store/atomic types.
    pub shape: MemAccessShape,
    /// Branch/jump target address, for control-flow types.
    pub target: Option<u64>,
}

impl InstInfo {
    /// Builds a bare `InstInfo` of the given type with every other field at
    /// its invalid default.
    #[must_use]
    pub const fn new(ty: InstType) -> Self {
        Self {
            ty,
            s_base: RegisterId::INVALID,
            s_data: RegisterId::INVALID,
            shape: MemAccessShape::Invalid,
            target: None,
        }
    }
}

impl Default for InstInfo {
    fn default() -> Self {
        Self::new(InstType::Invalid)
    }
}
