//! Symbols, scopes, and the symbol-table builder.

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use log::debug;

use crate::ast;
use crate::error::CompileError;
use crate::tables::{compile_table, Table};

/// The scope every compilation unit starts in. Functions introduce one
/// additional scope each, named after the function.
pub const GLOBAL_SCOPE: &str = "_global_";

/// First synthetic address handed to builtin functions. Anything at or
/// above this is VM-provided and never rebased.
pub const BUILTIN_ADDRESS_BASE: i32 = 65536;

/// The three storable scalar kinds, ordered by implicit-promotion rank:
/// `Char < Int < Float`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ScalarType {
    Char = 0,
    Int = 1,
    Float = 2,
}

impl ScalarType {
    /// Storage size in bytes.
    pub fn size(self) -> u32 {
        match self {
            ScalarType::Char => 1,
            ScalarType::Int | ScalarType::Float => 4,
        }
    }
}

/// What a symbol names. Arrays carry their element type structurally
/// rather than through tag arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Unknown,
    Scalar(ScalarType),
    Array(ScalarType),
    Function,
    Void,
    Label,
}

impl SymbolKind {
    pub fn is_array(self) -> bool {
        matches!(self, SymbolKind::Array(_))
    }

    pub fn scalar(self) -> Option<ScalarType> {
        match self {
            SymbolKind::Scalar(t) => Some(t),
            _ => None,
        }
    }

    pub fn element(self) -> Option<ScalarType> {
        match self {
            SymbolKind::Array(t) => Some(t),
            _ => None,
        }
    }

    /// Position in the promotion lattice. Reproduces the tag order of the
    /// VM's type numbering so that mixed factor lists promote identically:
    /// `Unknown < Char < Int < Float < CharArr < IntArr < FloatArr`.
    pub fn lattice_rank(self) -> u8 {
        match self {
            SymbolKind::Unknown => 0,
            SymbolKind::Scalar(t) => 1 + t as u8,
            SymbolKind::Array(t) => 4 + t as u8,
            SymbolKind::Function => 7,
            SymbolKind::Void => 8,
            SymbolKind::Label => 9,
        }
    }
}

impl Display for SymbolKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            SymbolKind::Unknown => "unknown",
            SymbolKind::Scalar(ScalarType::Char) => "char",
            SymbolKind::Scalar(ScalarType::Int) => "int",
            SymbolKind::Scalar(ScalarType::Float) => "float",
            SymbolKind::Array(ScalarType::Char) => "char[]",
            SymbolKind::Array(ScalarType::Int) => "int[]",
            SymbolKind::Array(ScalarType::Float) => "float[]",
            SymbolKind::Function => "function",
            SymbolKind::Void => "void",
            SymbolKind::Label => "label",
        };
        write!(f, "{name}")
    }
}

/// A named storage location, function, or label.
///
/// `address` is a scope-relative offset after symbol-table construction;
/// the assembler rebases `_global_` entries to absolute VM addresses.
#[derive(Clone, Copy, Debug)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub byte_size: u32,
    pub is_argument: bool,
    pub address: i32,
}

impl Symbol {
    pub fn new(kind: SymbolKind, byte_size: u32, is_argument: bool) -> Symbol {
        // Scalars derive their size from the type alone.
        let byte_size = if kind.is_array() { byte_size } else { 0 };
        Symbol {
            kind,
            byte_size,
            is_argument,
            address: 0,
        }
    }

    pub fn of_kind(kind: SymbolKind) -> Symbol {
        Symbol::new(kind, 0, false)
    }

    pub fn scalar(t: ScalarType) -> Symbol {
        Symbol::of_kind(SymbolKind::Scalar(t))
    }

    pub fn array(t: ScalarType, byte_size: u32) -> Symbol {
        Symbol::new(SymbolKind::Array(t), byte_size, false)
    }

    pub fn label(address: i32) -> Symbol {
        Symbol {
            kind: SymbolKind::Label,
            byte_size: 0,
            is_argument: false,
            address,
        }
    }

    /// Total storage footprint in bytes.
    pub fn byte_len(&self) -> u32 {
        match self.kind {
            SymbolKind::Scalar(t) => t.size(),
            SymbolKind::Array(_) => self.byte_size,
            _ => 0,
        }
    }

    /// Width of a single `LOAD`/`STORE`/`POP` transfer for this symbol:
    /// 1 for char data, 4 otherwise. Address pushes are always 4 bytes.
    pub fn data_width(&self) -> u32 {
        match self.kind {
            SymbolKind::Scalar(ScalarType::Char) | SymbolKind::Array(ScalarType::Char) => 1,
            _ => 4,
        }
    }
}

impl PartialEq for Symbol {
    /// Type equality with one relaxation: an array of unknown length (an
    /// array parameter) matches any array of the same element type.
    fn eq(&self, other: &Symbol) -> bool {
        if self.kind != other.kind {
            return false;
        }
        if self.kind.is_array() && (self.byte_size == 0 || other.byte_size == 0) {
            return true;
        }
        self.byte_size == other.byte_size
    }
}

/// An ordered function parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub symbol: Symbol,
}

/// Declared shape of a callable, builtin or user-defined.
#[derive(Clone, Debug)]
pub struct FunctionSignature {
    pub ret: Symbol,
    pub address: i32,
    pub params: Vec<Parameter>,
}

impl FunctionSignature {
    pub fn new(ret: Symbol) -> FunctionSignature {
        FunctionSignature {
            ret,
            address: 0,
            params: Vec::new(),
        }
    }

    pub fn arg_type(&self, name: &str) -> Option<&Symbol> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.symbol)
    }
}

pub type FunctionSignatures = HashMap<String, FunctionSignature>;

#[derive(Clone, Debug, Default)]
struct Scope {
    symbols: HashMap<String, Symbol>,
    /// Declaration order, for the `%`/`*` lines of the assembly stream.
    order: Vec<String>,
    /// Next free offset for allocated storage.
    cursor: i32,
}

impl Scope {
    fn insert(&mut self, name: &str, symbol: Symbol) {
        if !self.symbols.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.symbols.insert(name.to_string(), symbol);
    }
}

/// Two-level name table: scope name to symbols. `_global_` always exists.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    scopes: HashMap<String, Scope>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        let mut scopes = HashMap::new();
        scopes.insert(GLOBAL_SCOPE.to_string(), Scope::default());
        SymbolTable { scopes }
    }

    pub fn add_scope(&mut self, name: &str) {
        self.scopes.entry(name.to_string()).or_default();
    }

    /// Inserts without assigning storage (labels, arguments).
    pub fn insert(&mut self, scope: &str, name: &str, symbol: Symbol) {
        self.scopes
            .entry(scope.to_string())
            .or_default()
            .insert(name, symbol);
    }

    /// Inserts at the scope's allocation cursor and advances it by the
    /// symbol's byte length.
    pub fn allocate(&mut self, scope: &str, name: &str, mut symbol: Symbol) {
        let entry = self.scopes.entry(scope.to_string()).or_default();
        symbol.address = entry.cursor;
        entry.cursor += symbol.byte_len() as i32;
        entry.insert(name, symbol);
    }

    /// Looks a name up in `scope`, falling back to `_global_`.
    pub fn lookup(&self, scope: &str, name: &str) -> Option<&Symbol> {
        self.scopes
            .get(scope)
            .and_then(|s| s.symbols.get(name))
            .or_else(|| {
                self.scopes
                    .get(GLOBAL_SCOPE)
                    .and_then(|s| s.symbols.get(name))
            })
    }

    /// `lookup` that fails compilation when the name is missing.
    pub fn resolve(&self, scope: &str, name: &str) -> Result<&Symbol, CompileError> {
        self.lookup(scope, name)
            .ok_or_else(|| CompileError::SymbolUndefined(name.to_string()))
    }

    /// Registers a code label in `_global_`.
    pub fn insert_label(&mut self, name: &str, address: i32) {
        self.insert(GLOBAL_SCOPE, name, Symbol::label(address));
    }

    /// Shifts `_global_` entries to their final VM addresses: code labels
    /// land after the stack region, data globals after the program text.
    /// Builtin labels keep their synthetic addresses, and function-local
    /// symbols keep their frame-relative offsets.
    pub fn rebase_globals(&mut self, stack_size: i32, program_length: i32) {
        if let Some(scope) = self.scopes.get_mut(GLOBAL_SCOPE) {
            for symbol in scope.symbols.values_mut() {
                if symbol.kind == SymbolKind::Label {
                    if symbol.address < BUILTIN_ADDRESS_BASE {
                        symbol.address += stack_size;
                    }
                } else {
                    symbol.address += stack_size + program_length;
                }
            }
        }
    }

    /// The `%name,size` / `*name,size` declaration lines for a scope, in
    /// declaration order. Labels are not storage and are skipped.
    pub fn declarations(&self, scope: &str) -> String {
        let mut out = String::new();
        let Some(entry) = self.scopes.get(scope) else {
            return out;
        };
        for name in &entry.order {
            let symbol = &entry.symbols[name];
            if symbol.kind == SymbolKind::Label {
                continue;
            }
            out.push(if symbol.is_argument { '*' } else { '%' });
            out.push_str(name);
            out.push(',');
            out.push_str(&symbol.byte_len().to_string());
            out.push('\n');
        }
        out
    }
}

impl Default for SymbolTable {
    fn default() -> SymbolTable {
        SymbolTable::new()
    }
}

/// Maps a source type keyword to its storable scalar, or `None` for
/// `void`.
pub fn scalar_of(name: ast::TypeName) -> Option<ScalarType> {
    match name {
        ast::TypeName::Char => Some(ScalarType::Char),
        ast::TypeName::Short | ast::TypeName::Int | ast::TypeName::Long => Some(ScalarType::Int),
        ast::TypeName::Float => Some(ScalarType::Float),
        ast::TypeName::Void => None,
    }
}

/// Everything the symbol-table walk produces.
#[derive(Clone, Debug)]
pub struct ProgramSymbols {
    pub symbols: SymbolTable,
    pub functions: FunctionSignatures,
    pub tables: Vec<Table>,
}

fn variable_symbol(
    type_name: ast::TypeName,
    name: &str,
    array_len: Option<u32>,
    is_argument: bool,
) -> Result<Symbol, CompileError> {
    let scalar = scalar_of(type_name)
        .ok_or_else(|| CompileError::UnrecognizedNode(format!("'void' variable '{name}'")))?;
    let symbol = match array_len {
        Some(n) => Symbol::new(
            SymbolKind::Array(scalar),
            n * scalar.size(),
            is_argument,
        ),
        None => Symbol::new(SymbolKind::Scalar(scalar), 0, is_argument),
    };
    Ok(symbol)
}

fn return_symbol(def: &ast::FuncDef) -> Result<Symbol, CompileError> {
    if def.ret_array_len.is_some() {
        return Err(CompileError::ArrayReturnUnsupported(def.name.clone()));
    }
    match scalar_of(def.ret_type) {
        Some(t) => Ok(Symbol::scalar(t)),
        None => Ok(Symbol::of_kind(SymbolKind::Void)),
    }
}

/// Walks the tree once, producing the scoped symbol table, the function
/// signatures (builtins included), and the table descriptors. Storage
/// offsets are assigned in document order from a per-scope allocator.
pub fn build_symbol_table(
    program: &ast::Program,
    builtins: &FunctionSignatures,
) -> Result<ProgramSymbols, CompileError> {
    let mut symbols = SymbolTable::new();
    let mut functions = builtins.clone();
    let mut tables = Vec::new();

    for (name, signature) in builtins {
        symbols.insert_label(name, signature.address);
    }

    // Pre-order worklist; children are pushed right-to-left so a LIFO pop
    // preserves document order.
    let mut stack: Vec<(String, &ast::Stmt)> = Vec::new();
    for stmt in program.stmts.iter().rev() {
        stack.push((GLOBAL_SCOPE.to_string(), stmt));
    }

    while let Some((scope, stmt)) = stack.pop() {
        match stmt {
            ast::Stmt::VarDef(def) => {
                let symbol = variable_symbol(def.type_name, &def.name, def.array_len, false)?;
                symbols.allocate(&scope, &def.name, symbol);
            }

            ast::Stmt::FuncDef(def) => {
                if functions.contains_key(&def.name) {
                    return Err(CompileError::FunctionRedefined(def.name.clone()));
                }
                let mut signature = FunctionSignature::new(return_symbol(def)?);
                symbols.add_scope(&def.name);
                for param in &def.params {
                    let symbol =
                        variable_symbol(param.type_name, &param.name, param.array_len, false)?;
                    signature.params.push(Parameter {
                        name: param.name.clone(),
                        symbol,
                    });
                    let mut local = symbol;
                    local.is_argument = true;
                    symbols.insert(&def.name, &param.name, local);
                }
                functions.insert(def.name.clone(), signature);
                for stmt in def.body.iter().rev() {
                    stack.push((def.name.clone(), stmt));
                }
            }

            ast::Stmt::TableDef(def) => {
                let (table, columns) = compile_table(def)?;
                debug!("table '{}' with {} columns", table.name, columns.len());
                tables.push(table);
                for (name, symbol) in columns {
                    symbols.allocate(GLOBAL_SCOPE, &name, symbol);
                }
            }

            ast::Stmt::If(s) => {
                for stmt in s.body.iter().rev() {
                    stack.push((scope.clone(), stmt));
                }
            }
            ast::Stmt::While(s) => {
                for stmt in s.body.iter().rev() {
                    stack.push((scope.clone(), stmt));
                }
            }
            ast::Stmt::For(s) => {
                for stmt in s.body.iter().rev() {
                    stack.push((scope.clone(), stmt));
                }
            }

            ast::Stmt::Assign(_)
            | ast::Stmt::AugAssign(_)
            | ast::Stmt::Expr(_)
            | ast::Stmt::Return(_) => {}
        }
    }

    Ok(ProgramSymbols {
        symbols,
        functions,
        tables,
    })
}
