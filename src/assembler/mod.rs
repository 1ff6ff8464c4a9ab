//! Two-pass assembler: sizes the instruction stream to resolve label and
//! function addresses, then encodes opcodes and operands into the final
//! byte image.
//!
//! The image layout is `u8` table count, the serialized table
//! descriptors, the `i32` stack-region size, then the instruction bytes.
//! All multi-byte values are little-endian.

use log::debug;

use crate::bytecode::ops::Opcode;
use crate::bytecode::util::WriteImageExt;
use crate::error::CompileError;
use crate::symtab::{FunctionSignatures, SymbolTable, BUILTIN_ADDRESS_BASE, GLOBAL_SCOPE};
use crate::tables::Table;

/// Operand text of a line with a fixed-width mnemonic prefix.
fn operand(line: &str, prefix_len: usize) -> &str {
    line.get(prefix_len..).unwrap_or("")
}

/// Encodes one operand token to exactly `size` bytes, little-endian.
///
/// `#name` resolves through `scope` (falling back to `_global_`) and
/// `@name` through `_global_`; both are 4-byte addresses. `'c'` is the
/// character code. A digit string is an unsigned integer and must fit the
/// slot. Anything else must parse as a float and is encoded IEEE-754.
pub fn compile_value(
    token: &str,
    scope: &str,
    symbols: &SymbolTable,
    size: usize,
) -> Result<Vec<u8>, CompileError> {
    let mut raw: Vec<u8> = Vec::with_capacity(size);

    if let Some(name) = token.strip_prefix('#') {
        let symbol = symbols.resolve(scope, name)?;
        raw.put_i32(symbol.address);
    } else if let Some(name) = token.strip_prefix('@') {
        let symbol = symbols.resolve(GLOBAL_SCOPE, name)?;
        raw.put_i32(symbol.address);
    } else if let Some(rest) = token.strip_prefix('\'') {
        let c = rest
            .chars()
            .next()
            .ok_or_else(|| CompileError::NotANumber(token.to_string()))?;
        let code = u32::from(c);
        if code > 0xff {
            return Err(CompileError::NotANumber(token.to_string()));
        }
        raw.put_u8(code as u8);
    } else if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        let value: u64 = token
            .parse()
            .map_err(|_| CompileError::Overflow(token.to_string()))?;
        if value >= 1u64 << (8 * size) {
            return Err(CompileError::Overflow(token.to_string()));
        }
        raw.extend_from_slice(&value.to_le_bytes()[..size]);
    } else {
        if size != 4 {
            return Err(CompileError::NotANumber(token.to_string()));
        }
        let value: f32 = token
            .parse()
            .map_err(|_| CompileError::NotANumber(token.to_string()))?;
        raw.put_f32(value);
    }

    if raw.len() > size {
        return Err(CompileError::Overflow(token.to_string()));
    }
    raw.resize(size, 0);
    Ok(raw)
}

/// Assembles the textual stream into the byte image.
///
/// Pass 1 walks the stream accumulating instruction sizes: `@label` lines
/// record the current offset, and a `$scope` line for a function assigns
/// its entry address and registers it as a `_global_` label. Addresses
/// are then rebased (code after the stack region, globals after the
/// code). Pass 2 emits the header and the encoded instructions.
pub fn assemble(
    assembly: &str,
    symbols: &mut SymbolTable,
    functions: &mut FunctionSignatures,
    tables: &[Table],
    stack_size: i32,
) -> Result<Vec<u8>, CompileError> {
    let mut program_length: i32 = 0;

    for line in assembly.lines() {
        if line.is_empty() {
            continue;
        }
        if let Some(label) = line.strip_prefix('@') {
            symbols.insert_label(label, program_length);
        } else if let Some(scope) = line.strip_prefix('$') {
            if scope != GLOBAL_SCOPE {
                let signature = functions
                    .get_mut(scope)
                    .ok_or_else(|| CompileError::SymbolUndefined(scope.to_string()))?;
                signature.address = program_length;
                symbols.insert_label(scope, program_length);
            }
        } else if line.starts_with('%') || line.starts_with('*') {
            // declarations are already in the symbol table
        } else if line.starts_with("LITERAL4_ARRAY") {
            program_length += 5 + 4 * operand(line, 15).split(',').count() as i32;
        } else if line.starts_with("LITERAL1_ARRAY") {
            program_length += 5 + operand(line, 15).split(',').count() as i32;
        } else if line.starts_with("LITERAL4") {
            program_length += 5;
        } else if line.starts_with("LITERAL1") {
            program_length += 2;
        } else {
            program_length += 1;
        }
    }

    symbols.rebase_globals(stack_size, program_length);
    for signature in functions.values_mut() {
        if signature.address < BUILTIN_ADDRESS_BASE {
            signature.address += stack_size;
        }
    }
    debug!("program length {program_length}, stack size {stack_size}");

    let mut out: Vec<u8> = Vec::new();
    out.put_u8(tables.len() as u8);
    for table in tables {
        table.serialize_into(&mut out);
    }
    out.put_i32(stack_size);
    let header_len = out.len();

    let mut scope = GLOBAL_SCOPE;
    for line in assembly.lines() {
        if line.is_empty()
            || line.starts_with('@')
            || line.starts_with('%')
            || line.starts_with('*')
        {
            continue;
        }
        if let Some(name) = line.strip_prefix('$') {
            scope = name;
        } else if line.starts_with("LITERAL4_ARRAY") {
            out.put_u8(Opcode::Literal4Array.into());
            let values: Vec<&str> = operand(line, 15).split(',').collect();
            out.put_i32(values.len() as i32);
            for value in values {
                let bytes = compile_value(value, scope, symbols, 4)?;
                out.extend_from_slice(&bytes);
            }
        } else if line.starts_with("LITERAL1_ARRAY") {
            out.put_u8(Opcode::Literal1Array.into());
            let values: Vec<&str> = operand(line, 15).split(',').collect();
            out.put_i32(values.len() as i32);
            for value in values {
                let bytes = compile_value(value, scope, symbols, 1)?;
                out.extend_from_slice(&bytes);
            }
        } else if line.starts_with("LITERAL4") {
            out.put_u8(Opcode::Literal4.into());
            let bytes = compile_value(operand(line, 9), scope, symbols, 4)?;
            out.extend_from_slice(&bytes);
        } else if line.starts_with("LITERAL1") {
            out.put_u8(Opcode::Literal1.into());
            let bytes = compile_value(operand(line, 9), scope, symbols, 1)?;
            out.extend_from_slice(&bytes);
        } else {
            let opcode = Opcode::from_mnemonic(line)
                .ok_or_else(|| CompileError::UnknownOpcode(line.to_string()))?;
            out.put_u8(opcode.into());
        }
    }

    debug_assert_eq!(out.len() - header_len, program_length as usize);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtab::{FunctionSignature, ScalarType, Symbol, SymbolKind};

    fn empty_state() -> (SymbolTable, FunctionSignatures) {
        (SymbolTable::new(), FunctionSignatures::new())
    }

    #[test]
    fn global_scalar_lands_after_the_program() {
        let (mut symbols, mut functions) = empty_state();
        symbols.allocate(GLOBAL_SCOPE, "x", Symbol::scalar(ScalarType::Int));

        let image = assemble(
            "$_global_\n%x,4\nLITERAL4 #x\nLOAD4\nNOP\n",
            &mut symbols,
            &mut functions,
            &[],
            150,
        )
        .unwrap();

        // header: count + stack size
        assert_eq!(&image[..5], [0x00, 0x96, 0x00, 0x00, 0x00]);
        // x sits at stack_size + program_length = 150 + 7 = 157
        assert_eq!(&image[5..], [0x01, 157, 0x00, 0x00, 0x00, 0x05, 0x7f]);
        assert_eq!(symbols.lookup(GLOBAL_SCOPE, "x").unwrap().address, 157)
    }

    #[test]
    fn labels_resolve_to_rebased_offsets() {
        let (mut symbols, mut functions) = empty_state();
        let image = assemble(
            "@top\nNOP\nLITERAL4 @top\nJMP\n",
            &mut symbols,
            &mut functions,
            &[],
            150,
        )
        .unwrap();
        // @top is offset 0, rebased to 150
        assert_eq!(
            image[5..],
            [0x7f, 0x01, 0x96, 0x00, 0x00, 0x00, 61][..]
        )
    }

    #[test]
    fn function_scope_line_assigns_its_address() {
        let (mut symbols, mut functions) = empty_state();
        functions.insert(
            "f".to_string(),
            FunctionSignature::new(Symbol::of_kind(SymbolKind::Void)),
        );

        assemble(
            "LITERAL4 @func_end_f\nJMP\n$f\nRETURN\n@func_end_f\n$_global_\nNOP\n",
            &mut symbols,
            &mut functions,
            &[],
            150,
        )
        .unwrap();

        // entry follows the 6-byte jump-over prologue, rebased by the stack
        assert_eq!(functions["f"].address, 156);
        assert_eq!(symbols.lookup(GLOBAL_SCOPE, "f").unwrap().address, 156)
    }

    #[test]
    fn locals_keep_frame_relative_offsets() {
        let (mut symbols, mut functions) = empty_state();
        functions.insert(
            "f".to_string(),
            FunctionSignature::new(Symbol::of_kind(SymbolKind::Void)),
        );
        symbols.add_scope("f");
        symbols.allocate("f", "tmp", Symbol::scalar(ScalarType::Int));

        let image = assemble(
            "$f\nLITERAL4 #tmp\nLOAD4\nRETURN\n$_global_\nNOP\n",
            &mut symbols,
            &mut functions,
            &[],
            150,
        )
        .unwrap();
        // frame-relative 0, untouched by the rebase
        assert_eq!(image[5..10], [0x01, 0x00, 0x00, 0x00, 0x00][..])
    }

    #[test]
    fn byte_arrays_encode_count_then_elements() {
        let (mut symbols, mut functions) = empty_state();
        let image = assemble(
            "LITERAL1_ARRAY 1,2,3\n",
            &mut symbols,
            &mut functions,
            &[],
            150,
        )
        .unwrap();
        assert_eq!(
            image[5..],
            [0x02, 0x03, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03][..]
        )
    }

    #[test]
    fn sizing_matches_encoding() {
        let (mut symbols, mut functions) = empty_state();
        let assembly = "@l\nLITERAL4 @l\nLITERAL1 7\nLITERAL4_ARRAY 1,2\nLITERAL1_ARRAY 9\nADD\nNOP\n";
        let image = assemble(assembly, &mut symbols, &mut functions, &[], 150).unwrap();
        // 5 + 2 + (5 + 8) + (5 + 1) + 1 + 1 instruction bytes after the
        // 5-byte header
        assert_eq!(image.len(), 5 + 28)
    }

    #[test]
    fn one_byte_overflow() {
        let (mut symbols, mut functions) = empty_state();
        let err = assemble("LITERAL1 300\n", &mut symbols, &mut functions, &[], 150).unwrap_err();
        assert!(matches!(err, CompileError::Overflow(v) if v == "300"))
    }

    #[test]
    fn boundary_values() {
        let symbols = SymbolTable::new();
        assert!(matches!(
            compile_value("256", GLOBAL_SCOPE, &symbols, 1),
            Err(CompileError::Overflow(_))
        ));
        assert_eq!(
            compile_value("255", GLOBAL_SCOPE, &symbols, 1).unwrap(),
            [0xff]
        );
        assert_eq!(
            compile_value("65537", GLOBAL_SCOPE, &symbols, 4).unwrap(),
            [0x01, 0x00, 0x01, 0x00]
        )
    }

    #[test]
    fn char_operands_zero_pad() {
        let symbols = SymbolTable::new();
        assert_eq!(
            compile_value("'A'", GLOBAL_SCOPE, &symbols, 4).unwrap(),
            [0x41, 0x00, 0x00, 0x00]
        )
    }

    #[test]
    fn floats_encode_ieee_754() {
        let symbols = SymbolTable::new();
        assert_eq!(
            compile_value("1.0", GLOBAL_SCOPE, &symbols, 4).unwrap(),
            [0x00, 0x00, 0x80, 0x3f]
        );
        // negative integers miss the digit path and encode as floats
        assert_eq!(
            compile_value("-2.0", GLOBAL_SCOPE, &symbols, 4).unwrap(),
            [0x00, 0x00, 0x00, 0xc0]
        )
    }

    #[test]
    fn address_operands_must_be_four_bytes_wide() {
        let mut symbols = SymbolTable::new();
        symbols.allocate(GLOBAL_SCOPE, "x", Symbol::scalar(ScalarType::Int));
        assert!(matches!(
            compile_value("#x", GLOBAL_SCOPE, &symbols, 1),
            Err(CompileError::Overflow(_))
        ))
    }

    #[test]
    fn garbage_operand_is_not_a_number() {
        let symbols = SymbolTable::new();
        assert!(matches!(
            compile_value("\"hi\"", GLOBAL_SCOPE, &symbols, 1),
            Err(CompileError::NotANumber(_))
        ))
    }

    #[test]
    fn unresolved_label_fails() {
        let (mut symbols, mut functions) = empty_state();
        let err = assemble("LITERAL4 @missing\n", &mut symbols, &mut functions, &[], 150)
            .unwrap_err();
        assert!(matches!(err, CompileError::SymbolUndefined(_)))
    }

    #[test]
    fn unknown_mnemonic_fails() {
        let (mut symbols, mut functions) = empty_state();
        let err = assemble("FMOD\n", &mut symbols, &mut functions, &[], 150).unwrap_err();
        assert!(matches!(err, CompileError::UnknownOpcode(op) if op == "FMOD"))
    }
}
