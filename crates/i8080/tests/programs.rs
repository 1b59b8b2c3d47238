//! End-to-end programs run through the public API: small machine-code
//! images stepped until HALT.

use i8080::memory::{BankedMemory, Ram};
use i8080::{rst_vector, Cpu, MemoryMapper, Scheduler, SCHEDULER_PRIORITY};

fn run_until_halt(cpu: &mut Cpu, mem: &mut impl MemoryMapper) -> u64 {
    let mut total = 0;
    for _ in 0..10_000 {
        // A halted CPU with a deliverable interrupt still wakes up.
        if cpu.halted() && !(cpu.interrupts_enabled() && cpu.interrupts.pending()) {
            break;
        }
        total += cpu.step(mem, &mut (), false).unwrap() as u64;
    }
    assert!(cpu.halted(), "program did not halt");
    total
}

#[test]
fn sums_a_table_of_bytes() {
    // Sum five bytes at 0x2000 into A, store the result at 0x2100.
    let program = [
        0x21, 0x00, 0x20, // LXI H,0x2000
        0x06, 0x05, //       MVI B,5
        0xAF, //             XRA A
        0x86, //             loop: ADD M
        0x23, //             INX H
        0x05, //             DCR B
        0xC2, 0x06, 0x00, // JNZ loop
        0x32, 0x00, 0x21, // STA 0x2100
        0x76, //             HLT
    ];
    let mut mem = Ram::new();
    mem.load_image(&program, 0).unwrap();
    mem.load_image(&[1, 2, 3, 4, 5], 0x2000).unwrap();

    let mut cpu = Cpu::new();
    run_until_halt(&mut cpu, &mut mem);
    assert_eq!(mem.peek(0x2100).unwrap(), 15);
    assert_eq!(cpu.a, 15);
}

#[test]
fn nested_calls_preserve_the_stack() {
    let program = [
        0x31, 0x00, 0x24, // LXI SP,0x2400
        0xCD, 0x10, 0x00, // CALL 0x0010
        0x76, //             HLT
    ];
    let outer = [
        0x3C, //             INR A
        0xCD, 0x20, 0x00, // CALL 0x0020
        0xC9, //             RET
    ];
    let inner = [
        0x3C, // INR A
        0xC9, // RET
    ];
    let mut mem = Ram::new();
    mem.load_image(&program, 0).unwrap();
    mem.load_image(&outer, 0x0010).unwrap();
    mem.load_image(&inner, 0x0020).unwrap();

    let mut cpu = Cpu::new();
    run_until_halt(&mut cpu, &mut mem);
    assert_eq!(cpu.a, 2);
    assert_eq!(cpu.sp, 0x2400);
}

#[test]
fn scheduler_interrupt_drives_a_guest_handler() {
    // The handler at 0x0008 counts context switches in C and must leave
    // the main loop's flags untouched; the main loop spins incrementing
    // B and exits with interrupts masked.
    let main = [
        0x31, 0x00, 0x24, // LXI SP,0x2400
        0xFB, //             EI
        0x04, //             loop: INR B
        0x3E, 0x20, //       MVI A,0x20
        0xB8, //             CMP B
        0xC2, 0x04, 0x00, // JNZ loop
        0xF3, //             DI
        0x76, //             HLT
    ];
    let handler = [
        0xF5, // PUSH PSW
        0x0C, // INR C
        0xFB, // EI
        0xF1, // POP PSW
        0xC9, // RET
    ];
    let mut mem = Ram::new();
    mem.load_image(&main, 0).unwrap();
    mem.load_image(&handler, 0x0008).unwrap();

    let mut cpu = Cpu::new();
    cpu.scheduler = Scheduler::new(40, rst_vector(1));
    run_until_halt(&mut cpu, &mut mem);
    assert_eq!(cpu.b, 0x20);
    assert!(cpu.c > 0, "the scheduler never fired");
}

#[test]
fn priority_orders_competing_interrupts() {
    // Handlers mark distinct memory cells with an arrival sequence
    // number kept in E.
    let main = [
        0x31, 0x00, 0x24, // LXI SP,0x2400
        0xFB, //             EI
        0x00, //             NOP
        0x00, //             NOP
        0x00, //             NOP
        0x76, //             HLT
    ];
    // Each handler: E += 1; store E at its cell; EI; RET.
    let handler = |cell: u16| {
        let [lo, hi] = cell.to_le_bytes();
        [0x1C, 0x7B, 0x32, lo, hi, 0xFB, 0xC9]
    };
    let mut mem = Ram::new();
    mem.load_image(&main, 0).unwrap();
    mem.load_image(&handler(0x2000), 0x0008).unwrap(); // RST 1
    mem.load_image(&handler(0x2001), 0x0010).unwrap(); // RST 2

    let mut cpu = Cpu::new();
    // Queue the low-priority request first; the high-priority one must
    // still be delivered first.
    cpu.interrupts.queue(rst_vector(1), SCHEDULER_PRIORITY);
    cpu.interrupts.queue(rst_vector(2), 5);
    run_until_halt(&mut cpu, &mut mem);

    assert_eq!(mem.peek(0x2001).unwrap(), 1); // RST 2 handler ran first
    assert_eq!(mem.peek(0x2000).unwrap(), 2);
}

#[test]
fn banked_memory_runs_programs_like_flat_ram() {
    let program = [
        0x3E, 0x42, //       MVI A,0x42
        0x32, 0x00, 0x30, // STA 0x3000
        0x3A, 0x00, 0x30, // LDA 0x3000
        0x76, //             HLT
    ];
    let mut mem = BankedMemory::new(1, i8080::GUEST_SPACE)
        .unwrap()
        .with_cache();
    mem.load_image(&program, 0).unwrap();

    let mut cpu = Cpu::new();
    run_until_halt(&mut cpu, &mut mem);
    assert_eq!(cpu.a, 0x42);
    assert_eq!(mem.peek(0x3000).unwrap(), 0x42);
}

#[test]
fn trap_opcode_round_trips_through_a_host_supervisor() {
    let program = [
        0x31, 0x00, 0x24, // LXI SP,0x2400
        0x3E, 0x01, //       MVI A,1
        0xFF, //             RST 7 (trap)
        0x76, //             HLT
    ];
    // The trap vector returns straight to the caller.
    let vector = [0xC9]; // RET
    let mut mem = Ram::new();
    mem.load_image(&program, 0).unwrap();
    mem.load_image(&vector, 0x0038).unwrap();

    let mut cpu = Cpu::new();
    let mut calls = Vec::new();
    loop {
        cpu.step(&mut mem, &mut (), false).unwrap();
        if cpu.system_call_pending() {
            calls.push(cpu.a);
            cpu.clear_system_call();
        }
        if cpu.halted() {
            break;
        }
    }
    assert_eq!(calls, vec![1]);
}
