//! Periodic telemetry tables: descriptors, serialization, and the
//! `tabledef` compiler.

use std::fmt::{Display, Formatter, Result as FmtResult};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::ast;
use crate::bytecode::util::WriteImageExt;
use crate::error::CompileError;
use crate::symtab::{ScalarType, Symbol};

/// Names in a serialized descriptor occupy exactly this many bytes.
pub const NAME_BYTES: usize = 16;

/// Columns beyond this count are dropped during serialization.
pub const MAX_COLUMNS: usize = 16;

/// On-wire column format tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum TableFormat {
    Invalid = 0,
    Uint8 = 1,
    Int8 = 2,
    Uint16 = 3,
    Int16 = 4,
    Uint32 = 5,
    Int32 = 6,
    Float = 7,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataColumn {
    pub name: String,
    pub format: TableFormat,
}

/// A periodic sample table. The VM materializes one storage buffer per
/// table; the source addresses it through the column globals.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub name: String,
    /// Unit-encoded sampling interval: seconds map to 1..=60, minutes to
    /// 61..=119, hours to 119..=142.
    pub period: u8,
    pub columns: Vec<DataColumn>,
}

fn serialize_name(name: &str) -> [u8; NAME_BYTES] {
    let mut out = [0u8; NAME_BYTES];
    let raw = name.as_bytes();
    let len = raw.len().min(NAME_BYTES);
    out[..len].copy_from_slice(&raw[..len]);
    out
}

impl Table {
    /// Appends the descriptor in its on-wire form: 16-byte name, period
    /// byte, then per-column format byte + 16-byte name, and a single
    /// zero terminator when fewer than 16 columns are present.
    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&serialize_name(&self.name));
        out.put_u8(self.period);
        for column in self.columns.iter().take(MAX_COLUMNS) {
            out.put_u8(column.format.into());
            out.extend_from_slice(&serialize_name(&column.name));
        }
        if self.columns.len() < MAX_COLUMNS {
            out.put_u8(0);
        }
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "TABLE {}", self.name)?;
        writeln!(f, "PERIOD {}", self.period)?;
        writeln!(f, "COLUMNS {}", self.columns.len())?;
        for column in &self.columns {
            let type_name = match column.format {
                TableFormat::Int32 => "INT",
                TableFormat::Float => "FLOAT",
                _ => "",
            };
            writeln!(f, "{}:{}", type_name, column.name)?;
        }
        writeln!(f, "ENDTABLE")
    }
}

fn malformed(table: &str, reason: impl Into<String>) -> CompileError {
    CompileError::MalformedTable {
        table: table.to_string(),
        reason: reason.into(),
    }
}

fn encode_period(table: &str, period: ast::Period) -> Result<u8, CompileError> {
    if period.value == 0 {
        return Err(malformed(table, "invalid time value"));
    }
    let encoded = match period.unit {
        ast::TimeUnit::Seconds => {
            if period.value > 60 {
                return Err(malformed(table, "invalid time value"));
            }
            period.value
        }
        ast::TimeUnit::Minutes => {
            if period.value > 60 {
                return Err(malformed(table, "invalid time value"));
            }
            period.value + 59
        }
        ast::TimeUnit::Hours => {
            if period.value > 24 {
                return Err(malformed(table, "invalid time value"));
            }
            period.value + 118
        }
    };
    Ok(encoded as u8)
}

/// Compiles a `tabledef` into its descriptor plus one backing global per
/// column, in column order. The caller owns address assignment.
pub fn compile_table(
    def: &ast::TableDef,
) -> Result<(Table, Vec<(String, Symbol)>), CompileError> {
    let period = encode_period(&def.name, def.period)?;

    let mut columns = Vec::with_capacity(def.columns.len());
    let mut backing = Vec::with_capacity(def.columns.len());
    for column in &def.columns {
        let (format, symbol) = match column.type_name {
            ast::TypeName::Int => (TableFormat::Int32, Symbol::scalar(ScalarType::Int)),
            ast::TypeName::Float => (TableFormat::Float, Symbol::scalar(ScalarType::Float)),
            other => {
                return Err(malformed(
                    &def.name,
                    format!("column '{}' has unsupported type {other:?}", column.name),
                ));
            }
        };
        columns.push(DataColumn {
            name: column.name.clone(),
            format,
        });
        backing.push((column.name.clone(), symbol));
    }

    let table = Table {
        name: def.name.clone(),
        period,
        columns,
    };
    Ok((table, backing))
}
