use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::debug;
use serde_json::error::Category;

use flc::builtins::load_builtin_functions;
use flc::{ast, compile, DEFAULT_STACK_SIZE};

/// Compile FL syntax trees to binary images.
#[derive(Parser)]
#[command(name = "flc", version)]
struct Args {
    /// Input file: a JSON-serialized FL syntax tree
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (required unless -d is given)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output assembly language instead of the binary image
    #[arg(short = 's', long = "assembly")]
    assembly: bool,

    /// Dump the assembly to stdout instead of writing a file
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Builtin-function declarations file
    #[arg(short = 'b', long = "builtins")]
    builtins: Option<PathBuf>,

    /// Bytes reserved for the VM runtime stack
    #[arg(long, default_value_t = DEFAULT_STACK_SIZE)]
    stack_size: i32,
}

fn run(args: &Args) -> Result<ExitCode, flc::CompileError> {
    let text = fs::read_to_string(&args.input)?;
    let program: ast::Program = match serde_json::from_str(&text) {
        Ok(program) => program,
        Err(err) => {
            // Same shape the grammar front end reports: a class tag and
            // the offending line.
            let tag = match err.classify() {
                Category::Data => "UT",
                Category::Syntax => "UC",
                Category::Eof | Category::Io => "UI",
            };
            println!("[{tag}]Error on line: {}", err.line());
            return Ok(ExitCode::from(1));
        }
    };

    let builtins = load_builtin_functions(args.builtins.as_deref())?;
    debug!("loaded {} builtin signatures", builtins.len());
    let output = compile(&program, &builtins, args.stack_size)?;

    if args.debug {
        print!("{}", output.assembly);
    } else {
        // presence checked in main
        let path = args.output.as_ref().unwrap();
        if args.assembly {
            fs::write(path, &output.assembly)?;
        } else {
            fs::write(path, &output.image)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.output.is_none() && !args.debug {
        eprintln!("error: an output file is required unless -d is given");
        return ExitCode::from(2);
    }

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
