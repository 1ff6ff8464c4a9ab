//! Typed syntax tree of the FL source language.
//!
//! The compiler never tokenizes FL text; the front end hands it a
//! fully-built `Program`. One variant exists per grammar nonterminal, and
//! every node derives serde so a tree can cross the process boundary as
//! JSON (this is the format the `flc` binary reads).

use serde::{Deserialize, Serialize};

/// Source-level type keywords. `Short` and `Long` are width hints only;
/// both compile as `int`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeName {
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

impl Program {
    pub fn new() -> Program {
        Program { stmts: Vec::new() }
    }

    pub fn with_stmts(stmts: Vec<Stmt>) -> Program {
        Program { stmts }
    }
}

impl Default for Program {
    fn default() -> Program {
        Program::new()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    VarDef(VarDef),
    FuncDef(FuncDef),
    TableDef(TableDef),
    Assign(Assign),
    AugAssign(AugAssign),
    Expr(Expr),
    Return(Return),
    If(If),
    While(While),
    For(For),
}

/// `int x` or `float samples[32]`. Also used for function parameters,
/// where `array_len = None` on an array parameter means "unsized".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarDef {
    pub type_name: TypeName,
    pub name: String,
    #[serde(default)]
    pub array_len: Option<u32>,
}

impl VarDef {
    pub fn new(type_name: TypeName, name: &str) -> VarDef {
        VarDef {
            type_name,
            name: name.to_string(),
            array_len: None,
        }
    }

    pub fn array(type_name: TypeName, name: &str, len: u32) -> VarDef {
        VarDef {
            type_name,
            name: name.to_string(),
            array_len: Some(len),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuncDef {
    pub ret_type: TypeName,
    /// Array length annotation on the return type. Declaring one is
    /// rejected during symbol-table construction.
    #[serde(default)]
    pub ret_array_len: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub params: Vec<VarDef>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub period: Period,
    pub columns: Vec<ColumnDef>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub value: u32,
    pub unit: TimeUnit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub type_name: TypeName,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Var(Var),
    Call(Call),
    Arith(ArithExpr),
    Comparison(Comparison),
    Number(Number),
    Str(String),
    True,
    False,
}

/// A variable reference, optionally subscripted: `v` or `v[expr]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Var {
    pub name: String,
    #[serde(default)]
    pub index: Option<Box<Expr>>,
}

impl Var {
    pub fn new(name: &str) -> Var {
        Var {
            name: name.to_string(),
            index: None,
        }
    }

    pub fn indexed(name: &str, index: Expr) -> Var {
        Var {
            name: name.to_string(),
            index: Some(Box::new(index)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Expr>,
}

impl Call {
    pub fn new(name: &str, args: Vec<Expr>) -> Call {
        Call {
            name: name.to_string(),
            args,
        }
    }
}

/// A flat left-associative operator chain `f0 op0 f1 op1 f2 …`. Covers
/// both the additive and multiplicative nonterminals; precedence is the
/// front end's concern.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArithExpr {
    pub first: Box<Expr>,
    pub rest: Vec<(ArithOp, Expr)>,
}

impl ArithExpr {
    pub fn new(first: Expr, rest: Vec<(ArithOp, Expr)>) -> ArithExpr {
        ArithExpr {
            first: Box::new(first),
            rest,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub lhs: Box<Expr>,
    pub op: CompOp,
    pub rhs: Box<Expr>,
}

impl Comparison {
    pub fn new(lhs: Expr, op: CompOp, rhs: Expr) -> Comparison {
        Comparison {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "!=")]
    Ne,
}

/// Numeric literal. Decimal tokens arrive as `Int`, floating tokens as
/// `Float`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assign {
    pub target: Var,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AugAssign {
    pub target: Var,
    pub op: AugOp,
    pub value: Expr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AugOp {
    #[serde(rename = "+=")]
    Add,
    #[serde(rename = "-=")]
    Sub,
    #[serde(rename = "*=")]
    Mul,
    #[serde(rename = "/=")]
    Div,
    #[serde(rename = "%=")]
    Mod,
    #[serde(rename = "&=")]
    BitAnd,
    #[serde(rename = "|=")]
    BitOr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Return {
    #[serde(default)]
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct If {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct While {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

/// `for v in range(N): …` — the only loop-over-range form the language
/// has. The bound must be an integer literal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct For {
    pub var: Var,
    pub bound: Expr,
    pub body: Vec<Stmt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_program() {
        let p = Program::new();
        assert_eq!(p.stmts.len(), 0)
    }

    #[test]
    fn build_assignment() {
        let a = Stmt::Assign(Assign {
            target: Var::new("x"),
            value: Expr::Number(Number::Int(3)),
        });
        let p = Program::with_stmts(vec![a]);
        assert_eq!(p.stmts.len(), 1)
    }

    #[test]
    fn json_round_trip() {
        let p = Program::with_stmts(vec![
            Stmt::VarDef(VarDef::new(TypeName::Int, "x")),
            Stmt::If(If {
                cond: Expr::Comparison(Comparison::new(
                    Expr::Var(Var::new("x")),
                    CompOp::Lt,
                    Expr::Number(Number::Int(3)),
                )),
                body: vec![Stmt::Assign(Assign {
                    target: Var::new("x"),
                    value: Expr::Number(Number::Float(0.5)),
                })],
            }),
        ]);

        let text = serde_json::to_string(&p).unwrap();
        let back: Program = serde_json::from_str(&text).unwrap();
        assert_eq!(back, p)
    }

    #[test]
    fn numbers_deserialize_by_shape() {
        let n: Number = serde_json::from_str("3").unwrap();
        assert_eq!(n, Number::Int(3));

        let n: Number = serde_json::from_str("3.5").unwrap();
        assert_eq!(n, Number::Float(3.5))
    }

    #[test]
    fn operator_tokens_round_trip() {
        let op: AugOp = serde_json::from_str("\"%=\"").unwrap();
        assert_eq!(op, AugOp::Mod);

        let op: CompOp = serde_json::from_str("\"!=\"").unwrap();
        assert_eq!(op, CompOp::Ne)
    }
}
