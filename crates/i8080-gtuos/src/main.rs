//! `gtuos`: load a raw 8080 image, run it under the supervisor until
//! HALT.

mod os;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use i8080::memory::BankedMemory;
use i8080::trace::{Profiler, Tracer};
use i8080::{Cpu, MemoryMapper, Scheduler, GUEST_SPACE, SCHEDULER_PRIORITY};
use tracing_subscriber::EnvFilter;

use crate::os::Gtuos;

#[derive(Parser)]
#[command(name = "gtuos", about = "Run an 8080 guest image under the GTUOS supervisor")]
struct Args {
    /// Raw 8080 image, loaded at 0x0000
    #[arg(value_name = "EXE_FILE")]
    exe_file: PathBuf,

    /// Non-zero enables per-instruction debug output
    #[arg(value_name = "DEBUG", default_value_t = 0)]
    debug: i32,

    /// Cycle budget between scheduler interrupts
    #[arg(long, default_value_t = i8080::DEFAULT_QUANTUM)]
    quantum: u32,

    /// Vector byte queued when the quantum expires
    #[arg(long, default_value_t = i8080::DEFAULT_SCHEDULER_VECTOR)]
    scheduler_vector: u8,

    /// Opcode that raises a system call
    #[arg(long, default_value_t = i8080::DEFAULT_TRAP_OPCODE)]
    trap: u8,

    /// Write the instruction trace here on exit
    #[arg(long, value_name = "FILE")]
    trace_dump: Option<PathBuf>,

    /// Write the per-opcode profile here on exit
    #[arg(long, value_name = "FILE")]
    profile_report: Option<PathBuf>,

    /// Maximum number of instructions to execute (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_instructions: u64,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Missing or malformed arguments exit with code 1.
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let image = match fs::read(&args.exe_file) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("gtuos: cannot read {}: {err}", args.exe_file.display());
            return ExitCode::from(1);
        }
    };

    let mut mem = match BankedMemory::new(1, GUEST_SPACE) {
        Ok(mem) => mem.with_cache(),
        Err(err) => {
            eprintln!("gtuos: {err}");
            return ExitCode::from(1);
        }
    };
    if let Err(err) = mem.load_image(&image, 0x0000) {
        eprintln!("gtuos: cannot load {}: {err}", args.exe_file.display());
        return ExitCode::from(1);
    }

    let mut cpu = Cpu::new().with_trap_opcode(args.trap);
    cpu.scheduler = Scheduler::new(args.quantum, args.scheduler_vector);

    let mut supervisor = Gtuos::new();
    let mut tracer = args.trace_dump.as_ref().map(|_| Tracer::new());
    let mut profiler = args.profile_report.as_ref().map(|_| Profiler::new());
    let debug = args.debug != 0;

    let mut ports = ();
    let mut executed = 0u64;
    while !cpu.halted() {
        let pc = cpu.pc;
        let misses_before = mem.cache_misses();
        let cycles = match cpu.step(&mut mem, &mut ports, debug) {
            Ok(cycles) => cycles,
            Err(err) => {
                eprintln!("gtuos: fault at {pc:#06X}: {err}");
                return ExitCode::from(1);
            }
        };
        if let Some(tracer) = tracer.as_mut() {
            tracer.record(pc, cpu.last_opcode(), &cpu);
        }
        if let Some(profiler) = profiler.as_mut() {
            profiler.record(cpu.last_opcode(), cycles, mem.cache_misses() > misses_before);
        }
        if cpu.system_call_pending() {
            match supervisor.handle_call(&mut cpu, &mut mem) {
                Ok(cost) => {
                    if let Some(vector) = cpu.scheduler.credit(cost) {
                        cpu.interrupts.queue(vector, SCHEDULER_PRIORITY);
                    }
                }
                Err(err) => {
                    eprintln!("gtuos: system call failed at {pc:#06X}: {err}");
                    return ExitCode::from(1);
                }
            }
            cpu.clear_system_call();
        }
        executed += 1;
        if args.max_instructions != 0 && executed >= args.max_instructions {
            eprintln!("gtuos: instruction budget exhausted at {:#06X}", cpu.pc);
            break;
        }
    }

    if let (Some(tracer), Some(path)) = (&tracer, &args.trace_dump) {
        if let Err(err) = tracer.dump(path) {
            eprintln!("gtuos: {err}");
        }
    }
    if let (Some(profiler), Some(path)) = (&profiler, &args.profile_report) {
        if let Err(err) = profiler.report(path) {
            eprintln!("gtuos: {err}");
        }
    }

    println!(
        "halted at {:#06X} after {executed} instructions, {} cycles",
        cpu.pc,
        cpu.cycle_count()
    );
    ExitCode::SUCCESS
}
