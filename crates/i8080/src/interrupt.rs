//! Pending-interrupt bookkeeping and the quantum-driven scheduler hook.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::trace;

use crate::{CoreError, Result};

/// Default cycle budget between scheduler interrupts.
pub const DEFAULT_QUANTUM: u32 = 80;
/// Default scheduler vector byte: RST 1.
pub const DEFAULT_SCHEDULER_VECTOR: u8 = 0xCF;
/// Scheduler interrupts queue at the lowest priority.
pub const SCHEDULER_PRIORITY: u8 = 0;

/// Vector byte for `RST n`: `0xC7 | (n << 3)`, landing at entry `8 * n`.
pub fn rst_vector(n: u8) -> u8 {
    0xC7 | ((n & 0x07) << 3)
}

/// A pending interrupt request: the opcode byte executed on acceptance
/// and its priority.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InterruptRequest {
    pub vector: u8,
    pub priority: u8,
}

#[derive(PartialEq, Eq)]
struct PendingEntry {
    priority: u8,
    seq: u64,
    vector: u8,
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then FIFO within a priority.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A priority-ordered multiset of pending interrupt requests. Delivery
/// order is highest priority first, FIFO within equal priority.
#[derive(Default)]
pub struct InterruptController {
    queue: BinaryHeap<PendingEntry>,
    next_seq: u64,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a request. The vector byte is the opcode executed on
    /// acceptance, typically `RST n`.
    pub fn queue(&mut self, vector: u8, priority: u8) {
        trace!(vector, priority, "interrupt queued");
        self.queue.push(PendingEntry {
            priority,
            seq: self.next_seq,
            vector,
        });
        self.next_seq += 1;
    }

    /// Dequeue the highest-priority pending request.
    pub fn next(&mut self) -> Result<InterruptRequest> {
        let entry = self.queue.pop().ok_or(CoreError::InvalidInterrupt)?;
        Ok(InterruptRequest {
            vector: entry.vector,
            priority: entry.priority,
        })
    }

    pub fn pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

/// The scheduler hook: credits elapsed cycles against a quantum and
/// names the vector to queue when the quantum expires. The supervisor is
/// responsible for re-enabling interrupts before handing control back.
pub struct Scheduler {
    quantum: u32,
    vector: u8,
    counter: u32,
}

impl Scheduler {
    /// A scheduler firing `vector` every `quantum` cycles. A quantum of
    /// zero disables the hook.
    pub fn new(quantum: u32, vector: u8) -> Self {
        Self {
            quantum,
            vector,
            counter: 0,
        }
    }

    /// Credit one instruction's cycles. Returns the scheduler vector when
    /// the quantum expires; the counter resets at the same time.
    pub fn credit(&mut self, cycles: u32) -> Option<u8> {
        if self.quantum == 0 {
            return None;
        }
        self.counter += cycles;
        if self.counter >= self.quantum {
            trace!(elapsed = self.counter, "quantum expired");
            self.counter = 0;
            return Some(self.vector);
        }
        None
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_QUANTUM, DEFAULT_SCHEDULER_VECTOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_priority_dispatches_first() {
        let mut controller = InterruptController::new();
        controller.queue(0xCF, 1);
        controller.queue(0xD7, 3);
        controller.queue(0xC7, 2);
        assert_eq!(controller.next().unwrap().vector, 0xD7);
        assert_eq!(controller.next().unwrap().vector, 0xC7);
        assert_eq!(controller.next().unwrap().vector, 0xCF);
    }

    #[test]
    fn equal_priority_is_fifo() {
        let mut controller = InterruptController::new();
        controller.queue(0xC7, 5);
        controller.queue(0xCF, 5);
        controller.queue(0xD7, 5);
        assert_eq!(controller.next().unwrap().vector, 0xC7);
        assert_eq!(controller.next().unwrap().vector, 0xCF);
        assert_eq!(controller.next().unwrap().vector, 0xD7);
    }

    #[test]
    fn empty_queue_faults_on_dequeue() {
        let mut controller = InterruptController::new();
        assert!(matches!(
            controller.next(),
            Err(CoreError::InvalidInterrupt)
        ));
        controller.queue(0xC7, 0);
        assert!(controller.pending());
        controller.clear();
        assert!(!controller.pending());
    }

    #[test]
    fn rst_vectors_encode_the_entry_address() {
        assert_eq!(rst_vector(0), 0xC7);
        assert_eq!(rst_vector(1), 0xCF);
        assert_eq!(rst_vector(2), 0xD7);
        assert_eq!(rst_vector(7), 0xFF);
    }

    #[test]
    fn quantum_expiry_yields_the_vector_and_resets() {
        let mut scheduler = Scheduler::new(80, 0xCF);
        assert_eq!(scheduler.credit(40), None);
        assert_eq!(scheduler.credit(39), None);
        assert_eq!(scheduler.credit(4), Some(0xCF));
        assert_eq!(scheduler.counter(), 0);
        assert_eq!(scheduler.credit(79), None);
        assert_eq!(scheduler.credit(1), Some(0xCF));
    }

    #[test]
    fn zero_quantum_disables_the_hook() {
        let mut scheduler = Scheduler::new(0, 0xCF);
        assert_eq!(scheduler.credit(1_000), None);
        assert_eq!(scheduler.counter(), 0);
    }
}
