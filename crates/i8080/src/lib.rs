//! # i8080
//!
//! An emulator core for the Intel 8080 microprocessor, built to host a
//! small cooperative supervisor on top of the bare interpreter.
//!
//! The 8080 is an 8-bit processor from the mid-1970s whose software model
//! still underpins CP/M-era programs and a long line of arcade hardware.
//! The architecture, as this crate models it:
//!
//!  - A register file of seven byte registers (`A`, `B`, `C`, `D`, `E`,
//!    `H`, `L`). `BC`, `DE`, and `HL` double as 16-bit pairs, and the
//!    pseudo-register `M` names the byte in memory at the address in
//!    `HL`.
//!  - Five condition flags (sign, zero, auxiliary carry, parity, carry)
//!    that pack into the PSW byte with a fixed bit layout for
//!    `PUSH PSW`/`POP PSW`.
//!  - A 16-bit stack pointer and program counter; words in guest memory
//!    are little-endian.
//!  - Vectored interrupts: a pending request carries the opcode byte
//!    (typically `RST n`) executed at the next instruction boundary when
//!    interrupts are enabled.
//!  - A 16-bit address space that may be backed by switchable banks with
//!    a guest-address mapping table, see [`memory::BankedMemory`].
//!
//! On top of the interpreter sit the pieces a supervisor needs: a
//! priority interrupt queue drained at instruction boundaries, a
//! quantum-driven [`Scheduler`] that raises a context-switch interrupt,
//! and a configurable trap opcode that flags a system call for the host
//! loop. Tracing and profiling observers, and raw state snapshots, hang
//! off the same seams.

mod cpu;
mod error;
pub mod interrupt;
pub mod memory;
pub mod ops;
mod regs;
pub mod snapshot;
pub mod trace;
mod traits;

pub use cpu::{Cpu, DEFAULT_TRAP_OPCODE};
pub use error::{CoreError, Result};
pub use interrupt::{
    rst_vector, InterruptController, InterruptRequest, Scheduler, DEFAULT_QUANTUM,
    DEFAULT_SCHEDULER_VECTOR, SCHEDULER_PRIORITY,
};
pub use regs::{Condition, Flags, Register, RegisterPair, PARITY_TABLE};
pub use traits::{GuestBytes, MemoryMapper, PortMapper, GUEST_SPACE};
