use std::env;
use std::error::Error;
use std::path::Path;
use std::process;
use std::sync::Arc;

use nes_cpu::bus::BusConfig;
use nes_cpu::cartridge::{Cartridge, LoadOptions};
use nes_cpu::debug_flags;
use nes_cpu::disassembler;
use nes_cpu::emulator::Emulator;

struct Options {
    rom: String,
    ticks: u64,
    pc: Option<u16>,
    lenient: bool,
    list: bool,
}

fn usage(program: &str) {
    eprintln!(
        "Usage: {} [--ticks N] [--pc ADDR] [--lenient] [--list] <rom.nes>",
        program
    );
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut rom = None;
    let mut ticks = debug_flags::max_ticks();
    let mut pc = None;
    let mut lenient = false;
    let mut list = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--ticks" => {
                let value = args.get(i + 1).ok_or("--ticks requires a value")?;
                ticks = value
                    .parse()
                    .map_err(|_| format!("--ticks: invalid count '{}'", value))?;
                i += 2;
            }
            "--pc" => {
                let value = args.get(i + 1).ok_or("--pc requires a value")?;
                let digits = value.trim_start_matches('$').trim_start_matches("0x");
                let addr = u16::from_str_radix(digits, 16)
                    .map_err(|_| format!("--pc: invalid address '{}'", value))?;
                pc = Some(addr);
                i += 2;
            }
            "--lenient" => {
                lenient = true;
                i += 1;
            }
            "--list" => {
                list = true;
                i += 1;
            }
            s if s.starts_with('-') => return Err(format!("Unknown option: {}", s)),
            s => {
                if rom.replace(s.to_string()).is_some() {
                    return Err("only one ROM may be given".to_string());
                }
                i += 1;
            }
        }
    }

    Ok(Options {
        rom: rom.ok_or("ROM argument missing")?,
        ticks,
        pc,
        lenient,
        list,
    })
}

fn run(options: &Options) -> Result<(), Box<dyn Error>> {
    let data = std::fs::read(Path::new(&options.rom))
        .map_err(|e| format!("failed to read {}: {}", options.rom, e))?;

    let load_options = LoadOptions::from_env().lenient_if(options.lenient);
    let cartridge = Arc::new(Cartridge::load_with(data, load_options)?);

    if options.list {
        for instruction in disassembler::program_listing(&cartridge) {
            println!("{}", instruction);
        }
        return Ok(());
    }

    let mut emulator = Emulator::with_bus_config(BusConfig::from_env());
    emulator.set_program(cartridge);
    if let Some(pc) = options.pc {
        emulator.set_pc(pc);
    }

    let result = emulator.run(options.ticks);
    println!(
        "{}",
        serde_json::to_string_pretty(&emulator.cpu().registers())?
    );
    let cycles = result?;
    log::info!("Ran {} ticks, {} cycles", options.ticks, cycles);
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("headless_run");
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage(program);
        return;
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("{}", msg);
            usage(program);
            process::exit(2);
        }
    };

    if let Err(e) = run(&options) {
        eprintln!("{}", e);
        process::exit(1);
    }
}
