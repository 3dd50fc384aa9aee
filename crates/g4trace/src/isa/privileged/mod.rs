//! Privileged Architecture Definitions.
//!
//! Defines opcodes for the small slice of the RISC-V Privileged Specification
//! the classifier needs to recognise: `EBREAK`, used by the compressed-instruction
//! expander, and the `SYSTEM` major opcode, used to keep CSR/ECALL/xRET traffic
//! routed to `GENERIC` rather than falling through to `UNKNOWN`.

/// System instruction opcodes (ECALL, EBREAK, xRET, CSR).
pub mod opcodes;
