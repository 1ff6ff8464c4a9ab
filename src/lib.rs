//! `flc` compiles FL syntax trees into binary images for a stack-based
//! telemetry VM. The pipeline is linear: the symbol-table builder walks
//! the tree once, the emitter walks it again producing a textual assembly
//! stream, and the two-pass assembler resolves addresses and encodes the
//! final image.

use log::debug;

/// Typed syntax tree of the FL source.
pub mod ast;
/// Two-pass assembler from the assembly stream to the byte image.
pub mod assembler;
/// Loads builtin-function declarations into signatures.
pub mod builtins;
/// The VM operations and image write helpers.
pub mod bytecode;
/// Emits the textual assembly stream from the tree.
pub mod emitter;
/// Compilation error kinds.
pub mod error;
/// Symbols, scopes, and the symbol-table builder.
pub mod symtab;
/// Periodic telemetry tables and their compiler.
pub mod tables;

pub use error::CompileError;

use emitter::Emitter;
use symtab::{FunctionSignatures, ProgramSymbols, GLOBAL_SCOPE};

/// Bytes reserved at the base of the VM address space for the runtime
/// stack.
pub const DEFAULT_STACK_SIZE: i32 = 150;

/// Both renditions of a compiled program: the human-readable assembly
/// text (with its `TABLES` preamble) and the binary image.
#[derive(Clone, Debug, PartialEq)]
pub struct CompileOutput {
    pub assembly: String,
    pub image: Vec<u8>,
}

/// Compiles a program against the given builtin signatures.
///
/// The compiler is a pure function of its inputs; label counters are
/// created fresh here, so compiling the same tree twice yields
/// byte-identical output.
pub fn compile(
    program: &ast::Program,
    builtins: &FunctionSignatures,
    stack_size: i32,
) -> Result<CompileOutput, CompileError> {
    let ProgramSymbols {
        mut symbols,
        mut functions,
        tables,
    } = symtab::build_symbol_table(program, builtins)?;
    debug!("symbol table built, {} tables", tables.len());

    let mut stream = format!("${GLOBAL_SCOPE}\n");
    stream.push_str(&symbols.declarations(GLOBAL_SCOPE));
    let mut emitter = Emitter::new(&symbols, &functions);
    emitter.emit_program(program)?;
    stream.push_str(&emitter.finish());
    stream.push_str("NOP\n");

    let image = assembler::assemble(&stream, &mut symbols, &mut functions, &tables, stack_size)?;
    debug!("image size {} bytes", image.len());

    let mut assembly = format!("TABLES {}\n", tables.len());
    for table in &tables {
        assembly.push_str(&table.to_string());
    }
    assembly.push_str(&stream);

    Ok(CompileOutput { assembly, image })
}
