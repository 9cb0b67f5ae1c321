// kestrel - A small scripting language with a bytecode compiler and stack VM
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use kestrel_vm::{InterpretResult, VM, VmConfig};
use tracing_subscriber::EnvFilter;

// sysexits(3)
const EX_USAGE: i32 = 64;
const EX_DATAERR: i32 = 65;
const EX_SOFTWARE: i32 = 70;
const EX_IOERR: i32 = 74;

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();

    // Handle --version flag
    if args.len() == 2 && (args[1] == "--version" || args[1] == "-v") {
        println!("Kestrel v{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let mut vm = VM::with_config(VmConfig::from_env());

    match args.len() {
        1 => run_repl(&mut vm),
        2 => run_file(&args[1], &mut vm),
        _ => {
            eprintln!("Usage: kestrel [script.kst]");
            process::exit(EX_USAGE);
        }
    }
}

/// Log to stderr, filtered by `KESTREL_LOG` (default `warn`).
fn init_logging() {
    let filter =
        EnvFilter::try_from_env("KESTREL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Run a script file, exiting with a sysexits code on failure.
fn run_file(file_path: &str, vm: &mut VM) {
    let path = Path::new(file_path);

    if path.extension().and_then(|e| e.to_str()) != Some("kst") {
        tracing::warn!(file = file_path, "script does not have a .kst extension");
    }

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading '{}': {}", file_path, e);
            process::exit(EX_IOERR);
        }
    };

    match vm.interpret_source(&source) {
        InterpretResult::Ok => {}
        InterpretResult::CompileError => process::exit(EX_DATAERR),
        InterpretResult::RuntimeError => process::exit(EX_SOFTWARE),
    }
}

/// Run the interactive REPL. Globals persist from one line to the next.
fn run_repl(vm: &mut VM) {
    println!("Kestrel v{}", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut input = String::new();
        match stdin.read_line(&mut input) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {
                let input = input.trim();
                if input.is_empty() {
                    continue;
                }
                // Errors are already reported on stderr by the VM.
                vm.interpret_source(input);
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                process::exit(EX_IOERR);
            }
        }
    }
}
