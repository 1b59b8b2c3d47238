//! GTUOS system calls: the supervisor half of the trap protocol.
//!
//! A guest raises a call by loading the call number into `A`, its
//! arguments into `B` or `DE`, and executing the trap opcode. The host
//! loop observes the pending-call flag after the trapping instruction and
//! hands CPU and memory to [`Gtuos::handle_call`]. Each serviced call
//! returns a fixed cycle cost that the run loop credits to the scheduler.

use std::io::{self, BufRead, Write};

use i8080::{Cpu, MemoryMapper, RegisterPair, Result};
use tracing::warn;

/// Print register B as a decimal number.
pub const CALL_PRINT_B: u8 = 1;
/// Print the byte at address DE as a decimal number.
pub const CALL_PRINT_MEM: u8 = 2;
/// Read a decimal number from stdin into register B.
pub const CALL_READ_B: u8 = 3;
/// Read a decimal number from stdin into the byte at address DE.
pub const CALL_READ_MEM: u8 = 4;
/// Print the NUL-terminated string starting at address DE.
pub const CALL_PRINT_STR: u8 = 5;
/// Read a line from stdin into memory at DE, NUL-terminated.
pub const CALL_READ_STR: u8 = 6;

// Cycle costs per call: register traffic is cheap, string traffic is
// not.
const BYTE_CALL_COST: u32 = 10;
const STRING_CALL_COST: u32 = 100;

/// The supervisor. Stateless beyond the process's stdin/stdout; the call
/// convention lives entirely in guest registers.
#[derive(Default)]
pub struct Gtuos;

impl Gtuos {
    pub fn new() -> Self {
        Self
    }

    /// Service the pending system call and return its cycle cost. An
    /// unknown call number is logged and costs nothing.
    pub fn handle_call(&mut self, cpu: &mut Cpu, mem: &mut impl MemoryMapper) -> Result<u32> {
        let call = cpu.a;
        let cost = match call {
            CALL_PRINT_B => {
                print!("{}", cpu.b);
                BYTE_CALL_COST
            }
            CALL_PRINT_MEM => {
                let value = mem.read(cpu.pair(RegisterPair::DE))?;
                print!("{value}");
                BYTE_CALL_COST
            }
            CALL_READ_B => {
                cpu.b = read_decimal();
                BYTE_CALL_COST
            }
            CALL_READ_MEM => {
                let value = read_decimal();
                mem.write(cpu.pair(RegisterPair::DE), value)?;
                BYTE_CALL_COST
            }
            CALL_PRINT_STR => {
                let start = cpu.pair(RegisterPair::DE);
                let mut addr = start;
                loop {
                    let byte = mem.read(addr)?;
                    if byte == 0 {
                        break;
                    }
                    print!("{}", byte as char);
                    addr = addr.wrapping_add(1);
                    if addr == start {
                        // Unterminated string wrapped the address space.
                        break;
                    }
                }
                STRING_CALL_COST
            }
            CALL_READ_STR => {
                let line = read_line();
                let mut addr = cpu.pair(RegisterPair::DE);
                for byte in line.bytes() {
                    mem.write(addr, byte)?;
                    addr = addr.wrapping_add(1);
                }
                mem.write(addr, 0)?;
                STRING_CALL_COST
            }
            unknown => {
                warn!(call = unknown, pc = cpu.pc, "unknown system call");
                0
            }
        };
        let _ = io::stdout().flush();
        Ok(cost)
    }
}

fn read_line() -> String {
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return String::new();
    }
    line.trim_end_matches(['\r', '\n']).to_string()
}

fn read_decimal() -> u8 {
    read_line().trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use i8080::memory::Ram;

    #[test]
    fn print_calls_read_their_arguments_from_guest_state() {
        let mut os = Gtuos::new();
        let mut cpu = Cpu::new();
        let mut mem = Ram::new();

        cpu.a = CALL_PRINT_B;
        cpu.b = 42;
        assert_eq!(os.handle_call(&mut cpu, &mut mem).unwrap(), 10);

        cpu.a = CALL_PRINT_MEM;
        cpu.set_pair(RegisterPair::DE, 0x2000);
        mem.write(0x2000, 7).unwrap();
        assert_eq!(os.handle_call(&mut cpu, &mut mem).unwrap(), 10);

        cpu.a = CALL_PRINT_STR;
        mem.load_image(b"ok\0", 0x2100).unwrap();
        cpu.set_pair(RegisterPair::DE, 0x2100);
        assert_eq!(os.handle_call(&mut cpu, &mut mem).unwrap(), 100);
    }

    #[test]
    fn unknown_calls_cost_nothing() {
        let mut os = Gtuos::new();
        let mut cpu = Cpu::new();
        let mut mem = Ram::new();
        cpu.a = 0x7F;
        assert_eq!(os.handle_call(&mut cpu, &mut mem).unwrap(), 0);
    }
}
