use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use espresso::classfile::ClassFile;
use espresso::interpreter::Interpreter;
use espresso::vm::{FileLoader, Vm};

/// A minimal JVM that runs the main method of a single compiled
/// class file.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// The .class file to execute
    class_file: PathBuf,

    /// Print each executed instruction
    #[arg(short, long)]
    verbose: bool,

    /// Show frame state (locals, operand stack) per instruction
    #[arg(long)]
    debug: bool,

    /// Trace calls and returns for a single method
    #[arg(long, value_name = "METHOD")]
    trace: Option<String>,

    /// Print heap statistics after execution
    #[arg(long)]
    stats: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let cf = match ClassFile::parse_file(&cli.class_file) {
        Ok(cf) => cf,
        Err(err) => {
            eprintln!("error loading class file: {err}");
            process::exit(1);
        }
    };

    println!(
        "Loaded class: {} (Java {})",
        cf.class_name(),
        cf.major_version.saturating_sub(44)
    );
    println!("---");

    let vm = Arc::new(Vm::new());

    // Lazy class loading searches next to the main class first.
    let mut search_dirs = Vec::new();
    if let Some(parent) = cli.class_file.parent() {
        search_dirs.push(parent.to_path_buf());
    }
    search_dirs.push(PathBuf::from("."));
    vm.set_loader(Box::new(FileLoader::new(search_dirs)));

    let mut interp = Interpreter::new(vm.clone());
    interp.set_verbose(cli.verbose);
    if cli.debug {
        interp.set_debug(true);
        println!("Debug mode enabled - showing frame state");
        println!("---");
    }
    if let Some(method) = &cli.trace {
        interp.set_trace(method);
        println!("Tracing method: {method}");
        println!("---");
    }

    if let Err(err) = interp.execute(cf) {
        eprintln!("execution error: {err}");
        process::exit(1);
    }

    println!("---");
    println!("Execution completed.");

    if cli.stats {
        let stats = vm.heap.stats();
        println!("---");
        println!("Heap Statistics:");
        println!("  Allocations:  {}", stats.alloc_count);
        println!("  Freed:        {}", stats.free_count);
        println!("  Live Objects: {}", stats.live_objects);
        println!("  Heap Size:    {} bytes", stats.total_bytes);
        println!("  GC Runs:      {}", stats.gc_runs);
    }

    vm.shutdown();
}
