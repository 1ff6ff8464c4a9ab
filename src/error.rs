use thiserror::Error;

use crate::symtab::SymbolKind;

/// Fatal compilation errors. The pipeline aborts at the first occurrence;
/// the driver prints the message and exits non-zero.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("symbol '{0}' is not defined")]
    SymbolUndefined(String),

    #[error("function with name '{0}' redefined")]
    FunctionRedefined(String),

    #[error("function '{0}' is not defined")]
    UnknownCallee(String),

    #[error("variable downcasting not permitted in variable '{0}'")]
    IllegalDowncast(String),

    #[error("casting from {from} to {to} not permitted")]
    IllegalCast { from: SymbolKind, to: SymbolKind },

    #[error("'{name}' in {scope} is not an array")]
    NotAnArray { name: String, scope: String },

    #[error("malformed table '{table}': {reason}")]
    MalformedTable { table: String, reason: String },

    #[error("malformed builtin declaration: {0}")]
    MalformedBuiltin(String),

    #[error("value will overflow: {0}")]
    Overflow(String),

    #[error("not a number: {0}")]
    NotANumber(String),

    #[error("unrecognised construct: {0}")]
    UnrecognizedNode(String),

    #[error("unknown opcode '{0}'")]
    UnknownOpcode(String),

    #[error("function '{0}' cannot return an array")]
    ArrayReturnUnsupported(String),

    #[error("function '{function}' should return a value of type {expected}")]
    ReturnTypeMismatch {
        function: String,
        expected: SymbolKind,
    },

    #[error("call to '{function}' with {given} arguments, expected {expected}")]
    ArityMismatch {
        function: String,
        given: usize,
        expected: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
