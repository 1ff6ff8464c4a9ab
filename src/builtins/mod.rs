//! Loader for the builtin-function declarations file.
//!
//! The file is a flat list of C-style prototypes, one per line:
//!
//! ```text
//! // VM services
//! void delay(int ms);
//! float avg(float* samples, int n);
//! ```
//!
//! Each declaration becomes a `FunctionSignature` with a synthetic
//! address, assigned sequentially from 65536 in file order. A `*` after a
//! parameter type marks a pointer, which the compiler treats as an
//! unsized array argument of that element type.

use std::fs;
use std::path::Path;

use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while, take_while1};
use nom::character::complete::{char, space0, space1};
use nom::combinator::{all_consuming, map, opt, recognize, value};
use nom::multi::separated_list0;
use nom::sequence::{delimited, pair, tuple};
use nom::IResult;

use crate::ast::TypeName;
use crate::error::CompileError;
use crate::symtab::{
    scalar_of, FunctionSignature, FunctionSignatures, Parameter, Symbol, SymbolKind,
    BUILTIN_ADDRESS_BASE,
};

/// Parse subject type used by all parsing functions.
pub type PInput<'a> = &'a str;

/// Alias for nom's `IResult` over `PInput`.
pub type PResult<'a, O> = IResult<PInput<'a>, O>;

#[derive(Clone, Debug, PartialEq)]
struct ProtoParam {
    type_name: TypeName,
    pointer: bool,
    name: String,
}

#[derive(Clone, Debug, PartialEq)]
struct Prototype {
    ret: TypeName,
    name: String,
    params: Vec<ProtoParam>,
}

fn type_word(input: PInput) -> PResult<TypeName> {
    alt((
        value(TypeName::Void, tag_no_case("void")),
        value(TypeName::Char, tag_no_case("char")),
        value(TypeName::Short, tag_no_case("short")),
        value(TypeName::Int, tag_no_case("int")),
        value(TypeName::Long, tag_no_case("long")),
        value(TypeName::Float, tag_no_case("float")),
    ))(input)
}

fn identifier(input: PInput) -> PResult<&str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// Parses `TYPE [*] NAME` with the `*` floating freely between spaces.
fn parameter(input: PInput) -> PResult<ProtoParam> {
    map(
        tuple((type_word, space0, opt(char('*')), space0, identifier)),
        |(type_name, _, pointer, _, name)| ProtoParam {
            type_name,
            pointer: pointer.is_some(),
            name: name.to_string(),
        },
    )(input)
}

/// Parses `RET NAME(PARAM, …);`
fn prototype(input: PInput) -> PResult<Prototype> {
    map(
        tuple((
            space0,
            type_word,
            space1,
            identifier,
            space0,
            delimited(
                char('('),
                separated_list0(char(','), delimited(space0, parameter, space0)),
                char(')'),
            ),
            space0,
            char(';'),
            space0,
        )),
        |(_, ret, _, name, _, params, _, _, _)| Prototype {
            ret,
            name: name.to_string(),
            params,
        },
    )(input)
}

fn return_symbol(ret: TypeName) -> Symbol {
    match scalar_of(ret) {
        Some(t) => Symbol::scalar(t),
        None => Symbol::of_kind(SymbolKind::Void),
    }
}

fn parameter_symbol(param: &ProtoParam, line: &str) -> Result<Symbol, CompileError> {
    let scalar = scalar_of(param.type_name)
        .ok_or_else(|| CompileError::MalformedBuiltin(line.to_string()))?;
    let kind = if param.pointer {
        SymbolKind::Array(scalar)
    } else {
        SymbolKind::Scalar(scalar)
    };
    Ok(Symbol::new(kind, 0, true))
}

/// Parses the declarations text into a signature map. Blank lines and
/// `//`/`#` comment lines are skipped; anything else must be a prototype.
pub fn parse_builtin_functions(text: &str) -> Result<FunctionSignatures, CompileError> {
    let mut signatures = FunctionSignatures::new();
    let mut next_address = BUILTIN_ADDRESS_BASE;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
            continue;
        }
        let proto = match all_consuming(prototype)(line) {
            Ok((_, proto)) => proto,
            Err(_) => return Err(CompileError::MalformedBuiltin(line.to_string())),
        };

        let mut signature = FunctionSignature::new(return_symbol(proto.ret));
        signature.address = next_address;
        next_address += 1;
        for param in &proto.params {
            signature.params.push(Parameter {
                name: param.name.clone(),
                symbol: parameter_symbol(param, line)?,
            });
        }
        signatures.insert(proto.name, signature);
    }

    Ok(signatures)
}

/// Loads signatures from a declarations file. `None` means compiling
/// without builtins, which is legal and yields an empty map.
pub fn load_builtin_functions(path: Option<&Path>) -> Result<FunctionSignatures, CompileError> {
    match path {
        None => Ok(FunctionSignatures::new()),
        Some(path) => parse_builtin_functions(&fs::read_to_string(path)?),
    }
}
