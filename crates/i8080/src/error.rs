use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Faults surfaced by the interpreter core. Errors unwind out of
/// [`Cpu::step`](crate::Cpu::step) and abort the current instruction; the
/// host loop decides whether to terminate, snapshot, or resume.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The decoder hit an encoding the 8080 leaves undefined. The tracer
    /// and state manager reuse this kind for dump files they cannot open.
    #[error("invalid opcode: {0}")]
    InvalidOpcode(String),
    /// Address outside the backing store, a write to a read-only mapping,
    /// an overlapping mapping, or a bad bank number.
    #[error("memory access violation: {0}")]
    MemoryAccessViolation(String),
    /// A push would move SP below the configured stack floor.
    #[error("stack overflow: SP {sp:#06X} would cross {floor:#06X}")]
    StackOverflow { sp: u16, floor: u16 },
    /// Dequeue from an empty interrupt queue.
    #[error("no pending interrupts")]
    InvalidInterrupt,
}

impl CoreError {
    pub(crate) fn undefined_opcode(opcode: u8, pc: u16) -> Self {
        Self::InvalidOpcode(format!("undefined encoding {opcode:#04X} at {pc:#06X}"))
    }
}
