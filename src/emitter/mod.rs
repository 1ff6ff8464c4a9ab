//! Code emitter: walks the syntax tree and produces the newline-separated
//! textual assembly stream the assembler consumes.
//!
//! Reserved line prefixes: `$` scope marker, `%` local declaration, `*`
//! argument declaration, `@` label definition. Every other line is an
//! instruction.

use crate::ast::{self, Expr};
use crate::error::CompileError;
use crate::symtab::{
    FunctionSignatures, ScalarType, Symbol, SymbolKind, SymbolTable, GLOBAL_SCOPE,
};

/// Calls lowered to a single VM opcode instead of `CALL`.
const INTRINSICS: [&str; 3] = ["waitNextMeasure", "delay", "saveTable"];

/// Per-construct label ordinals. A fresh set is used for every
/// compilation, so compiling the same tree twice yields identical output.
#[derive(Debug, Default)]
pub struct Counters {
    ifs: u32,
    whiles: u32,
    fors: u32,
}

impl Counters {
    fn next_if(&mut self) -> u32 {
        self.ifs += 1;
        self.ifs
    }

    fn next_while(&mut self) -> u32 {
        self.whiles += 1;
        self.whiles
    }

    fn next_for(&mut self) -> u32 {
        self.fors += 1;
        self.fors
    }
}

pub struct Emitter<'a> {
    symbols: &'a SymbolTable,
    functions: &'a FunctionSignatures,
    counters: Counters,
    out: String,
}

impl<'a> Emitter<'a> {
    pub fn new(symbols: &'a SymbolTable, functions: &'a FunctionSignatures) -> Emitter<'a> {
        Emitter {
            symbols,
            functions,
            counters: Counters::default(),
            out: String::new(),
        }
    }

    /// Emits every statement of the program in the global scope.
    pub fn emit_program(&mut self, program: &ast::Program) -> Result<(), CompileError> {
        for stmt in &program.stmts {
            self.stmt(stmt, GLOBAL_SCOPE)?;
        }
        Ok(())
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn stmt(&mut self, stmt: &ast::Stmt, scope: &str) -> Result<(), CompileError> {
        match stmt {
            // Declarations were handled by the symbol-table walk.
            ast::Stmt::VarDef(_) | ast::Stmt::TableDef(_) => Ok(()),

            ast::Stmt::Expr(expr) => {
                self.expr(expr, scope, false)?;
                // An expression statement leaves its value behind;
                // discard it.
                let t = self.value_type(expr, scope)?;
                match t.kind {
                    SymbolKind::Scalar(ScalarType::Int) | SymbolKind::Scalar(ScalarType::Float) => {
                        self.line("POP4")
                    }
                    SymbolKind::Scalar(ScalarType::Char) => self.line("POP1"),
                    _ => {}
                }
                Ok(())
            }

            ast::Stmt::Assign(assign) => {
                let dst = self.var_type(&assign.target, scope)?;
                let src = self.value_type(&assign.value, scope)?;
                if dst.kind.lattice_rank() < src.kind.lattice_rank() {
                    return Err(CompileError::IllegalDowncast(assign.target.name.clone()));
                }
                let load = !matches!(assign.value, Expr::Call(_));
                self.expr(&assign.value, scope, load)?;
                self.cast(&src, &dst)?;
                self.var(&assign.target, scope, false)
            }

            ast::Stmt::AugAssign(assign) => {
                let dst = self.var_type(&assign.target, scope)?;
                let src = self.value_type(&assign.value, scope)?;
                self.expr(&assign.value, scope, true)?;
                self.cast(&src, &dst)?;
                self.var(&assign.target, scope, true)?;
                let op = match assign.op {
                    ast::AugOp::Add => "ADD",
                    ast::AugOp::Sub => "SUB",
                    ast::AugOp::Mul => "MUL",
                    ast::AugOp::Div => "DIV",
                    ast::AugOp::Mod => "MOD",
                    ast::AugOp::BitAnd => "BIT_AND",
                    ast::AugOp::BitOr => "BIT_OR",
                };
                if dst.kind == SymbolKind::Scalar(ScalarType::Float) {
                    self.line(&format!("F{op}"));
                } else {
                    self.line(op);
                }
                self.var(&assign.target, scope, false)
            }

            ast::Stmt::Return(ret) => {
                let signature = self.functions.get(scope).ok_or_else(|| {
                    CompileError::UnrecognizedNode("'return' outside of a function".to_string())
                })?;
                let expected = signature.ret;
                if let Some(value) = &ret.value {
                    let t = self.value_type(value, scope)?;
                    self.expr(value, scope, true)?;
                    if t.kind != expected.kind {
                        return Err(CompileError::ReturnTypeMismatch {
                            function: scope.to_string(),
                            expected: expected.kind,
                        });
                    }
                }
                self.line("RETURN");
                Ok(())
            }

            ast::Stmt::FuncDef(def) => {
                self.line(&format!("LITERAL4 @func_end_{}", def.name));
                self.line("JMP");
                self.line(&format!("${}", def.name));
                let declarations = self.symbols.declarations(&def.name);
                self.out.push_str(&declarations);
                for stmt in &def.body {
                    self.stmt(stmt, &def.name)?;
                }
                if !matches!(def.body.last(), Some(ast::Stmt::Return(_))) {
                    self.line("RETURN");
                }
                self.line(&format!("@func_end_{}", def.name));
                self.line(&format!("${GLOBAL_SCOPE}"));
                Ok(())
            }

            ast::Stmt::If(stmt) => {
                let k = self.counters.next_if();
                self.line(&format!("LITERAL4 @if_stmt_{k}"));
                self.expr(&stmt.cond, scope, true)?;
                self.line("NOT");
                self.line("JMP_IF");
                for stmt in &stmt.body {
                    self.stmt(stmt, scope)?;
                }
                self.line(&format!("@if_stmt_{k}"));
                self.line("");
                Ok(())
            }

            ast::Stmt::While(stmt) => {
                let k = self.counters.next_while();
                self.line(&format!("@while_comp_{k}"));
                self.line(&format!("LITERAL4 @while_end_{k}"));
                self.expr(&stmt.cond, scope, true)?;
                self.line("NOT");
                self.line("JMP_IF");
                for stmt in &stmt.body {
                    self.stmt(stmt, scope)?;
                }
                self.line(&format!("LITERAL4 @while_comp_{k}"));
                self.line("JMP");
                self.line(&format!("@while_end_{k}"));
                Ok(())
            }

            ast::Stmt::For(stmt) => {
                let k = self.counters.next_for();
                let bound = match &stmt.bound {
                    Expr::Number(ast::Number::Int(n)) => *n,
                    _ => {
                        return Err(CompileError::UnrecognizedNode(
                            "'for' range bound must be an integer literal".to_string(),
                        ))
                    }
                };
                self.line("LITERAL4 0");
                self.var(&stmt.var, scope, false)?;
                self.line(&format!("@for_start_{k}"));
                for stmt in &stmt.body {
                    self.stmt(stmt, scope)?;
                }
                self.var(&stmt.var, scope, true)?;
                self.line("INC_S");
                self.var(&stmt.var, scope, false)?;
                self.line(&format!("LITERAL4 @for_start_{k}"));
                self.var(&stmt.var, scope, true)?;
                self.line(&format!("LITERAL4 {bound}"));
                self.line("LESS");
                self.line("JMP_IF");
                Ok(())
            }
        }
    }

    /// Emits an expression in value context.
    fn expr(&mut self, expr: &Expr, scope: &str, load: bool) -> Result<(), CompileError> {
        match expr {
            Expr::Arith(arith) => self.arith(arith, scope),
            Expr::Comparison(cmp) => self.comparison(cmp, scope),
            Expr::Call(call) => self.call(call, scope),
            _ => self.val(expr, scope, load),
        }
    }

    /// Emits a plain value: literals and variable loads/stores. Compound
    /// expressions are not values.
    fn val(&mut self, expr: &Expr, scope: &str, load: bool) -> Result<(), CompileError> {
        match expr {
            Expr::Number(ast::Number::Int(n)) => self.line(&format!("LITERAL4 {n}")),
            Expr::Number(ast::Number::Float(x)) => self.line(&format!("LITERAL4 {x:?}")),
            Expr::Var(var) => return self.var(var, scope, load),
            Expr::Str(s) => self.line(&format!("LITERAL1_ARRAY \"{s}\"")),
            Expr::True => self.line("LITERAL1 1"),
            Expr::False => self.line("LITERAL1 0"),
            Expr::Call(_) | Expr::Arith(_) | Expr::Comparison(_) => {
                return Err(CompileError::UnrecognizedNode(
                    "compound expression in value position".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Emits the load or store sequence for a variable reference.
    /// Address pushes are always 4 bytes wide; the transfer width is 1
    /// for char data and 4 otherwise.
    fn var(&mut self, var: &ast::Var, scope: &str, load: bool) -> Result<(), CompileError> {
        let symbol = *self.symbols.resolve(scope, &var.name)?;
        let width = symbol.data_width();
        let op = if load { "LOAD" } else { "STORE" };

        if let Some(index) = &var.index {
            let element = symbol.kind.element().ok_or_else(|| CompileError::NotAnArray {
                name: var.name.clone(),
                scope: scope.to_string(),
            })?;
            self.line(&format!("LITERAL4 #{}", var.name));
            self.val(index, scope, true)?;
            self.line(&format!("LITERAL4 {}", element.size()));
            self.line("MUL");
            self.line(&format!("{op}{width}"));
        } else if !symbol.kind.is_array() {
            self.line(&format!("LITERAL4 #{}", var.name));
            self.line(&format!("{op}{width}"));
        } else if load {
            // Whole-array loads push the length first.
            self.line(&format!("LITERAL4 {}", symbol.byte_size));
            self.line(&format!("LITERAL4 #{}", var.name));
            self.line(&format!("LOAD{width}_ARRAY"));
        } else {
            self.line(&format!("LITERAL4 #{}", var.name));
            self.line(&format!("STORE{width}_ARRAY"));
        }
        Ok(())
    }

    fn arith(&mut self, arith: &ast::ArithExpr, scope: &str) -> Result<(), CompileError> {
        let mut factor_types = vec![self.value_type(&arith.first, scope)?];
        for (_, factor) in &arith.rest {
            factor_types.push(self.value_type(factor, scope)?);
        }
        let mut dst = Symbol::of_kind(SymbolKind::Unknown);
        for t in &factor_types {
            if dst.kind.lattice_rank() < t.kind.lattice_rank() {
                dst = *t;
            }
        }

        self.expr(&arith.first, scope, true)?;
        self.cast(&factor_types[0], &dst)?;
        for (i, (op, factor)) in arith.rest.iter().enumerate() {
            self.expr(factor, scope, true)?;
            self.cast(&factor_types[i + 1], &dst)?;
            let name = match op {
                ast::ArithOp::Add => "ADD",
                ast::ArithOp::Sub => "SUB",
                ast::ArithOp::Mul => "MUL",
                ast::ArithOp::Div => "DIV",
            };
            if dst.kind == SymbolKind::Scalar(ScalarType::Float) {
                self.line(&format!("F{name}"));
            } else {
                self.line(name);
            }
        }
        Ok(())
    }

    fn comparison(&mut self, cmp: &ast::Comparison, scope: &str) -> Result<(), CompileError> {
        let lhs_t = self.value_type(&cmp.lhs, scope)?;
        let rhs_t = self.value_type(&cmp.rhs, scope)?;
        let dst = if lhs_t.kind.lattice_rank() >= rhs_t.kind.lattice_rank() {
            lhs_t
        } else {
            rhs_t
        };

        self.val(&cmp.lhs, scope, true)?;
        self.expr(&cmp.rhs, scope, true)?;

        let float_ops = match dst.kind {
            SymbolKind::Scalar(ScalarType::Int) => false,
            SymbolKind::Scalar(ScalarType::Float) => true,
            other => {
                return Err(CompileError::UnrecognizedNode(format!(
                    "comparison of {other} operands"
                )))
            }
        };
        let name = match cmp.op {
            ast::CompOp::Eq | ast::CompOp::Ne => {
                if float_ops {
                    "FEQUALS"
                } else {
                    "EQUALS"
                }
            }
            ast::CompOp::Lt => {
                if float_ops {
                    "FLESS"
                } else {
                    "LESS"
                }
            }
            ast::CompOp::Gt => {
                if float_ops {
                    "FGREATER"
                } else {
                    "GREATER"
                }
            }
        };
        self.line(name);
        if cmp.op == ast::CompOp::Ne {
            self.line("NOT");
        }
        Ok(())
    }

    fn call(&mut self, call: &ast::Call, scope: &str) -> Result<(), CompileError> {
        match call.name.as_str() {
            "waitNextMeasure" => {
                self.line("WAIT_TABLE");
                return Ok(());
            }
            "delay" => {
                let arg = call.args.first().ok_or_else(|| {
                    CompileError::UnrecognizedNode("'delay' without an argument".to_string())
                })?;
                self.val(arg, scope, true)?;
                self.line("DELAY");
                return Ok(());
            }
            "saveTable" => {
                self.line("SAVE_TABLE");
                return Ok(());
            }
            _ => {}
        }

        let signature = self
            .functions
            .get(&call.name)
            .ok_or_else(|| CompileError::UnknownCallee(call.name.clone()))?;
        if call.args.len() != signature.params.len() {
            return Err(CompileError::ArityMismatch {
                function: call.name.clone(),
                given: call.args.len(),
                expected: signature.params.len(),
            });
        }
        let params: Vec<Symbol> = signature.params.iter().map(|p| p.symbol).collect();

        // Arguments go onto the stack in reverse source order, each cast
        // to its declared parameter type.
        for (arg, param) in call.args.iter().zip(params.iter()).rev() {
            let arg_t = self.value_type(arg, scope)?;
            self.val(arg, scope, true)?;
            self.cast(&arg_t, param)?;
        }
        self.line(&format!("LITERAL4 #{}", call.name));
        self.line("CALL");
        Ok(())
    }

    /// Static type of an expression.
    pub fn value_type(&self, expr: &Expr, scope: &str) -> Result<Symbol, CompileError> {
        match expr {
            Expr::Var(var) => self.var_type(var, scope),

            Expr::Call(call) => match self.functions.get(&call.name) {
                Some(signature) => Ok(signature.ret),
                None if INTRINSICS.contains(&call.name.as_str()) => {
                    Ok(Symbol::of_kind(SymbolKind::Void))
                }
                None => Err(CompileError::UnknownCallee(call.name.clone())),
            },

            Expr::Arith(arith) => {
                let mut kind = SymbolKind::Unknown;
                let mut consider = |t: Symbol| {
                    if kind.lattice_rank() < t.kind.lattice_rank() {
                        kind = t.kind;
                    }
                };
                consider(self.value_type(&arith.first, scope)?);
                for (_, factor) in &arith.rest {
                    consider(self.value_type(factor, scope)?);
                }
                Ok(Symbol::of_kind(kind))
            }

            Expr::Comparison(_) => Ok(Symbol::scalar(ScalarType::Char)),

            Expr::Number(ast::Number::Int(_)) => Ok(Symbol::scalar(ScalarType::Int)),
            Expr::Number(ast::Number::Float(_)) => Ok(Symbol::scalar(ScalarType::Float)),

            Expr::Str(s) => Ok(Symbol::new(
                SymbolKind::Array(ScalarType::Char),
                s.len() as u32 + 1,
                false,
            )),

            Expr::True | Expr::False => Err(CompileError::UnrecognizedNode(
                "boolean literal in a typed context".to_string(),
            )),
        }
    }

    fn var_type(&self, var: &ast::Var, scope: &str) -> Result<Symbol, CompileError> {
        let symbol = self.symbols.resolve(scope, &var.name)?;
        if var.index.is_some() {
            let element = symbol.kind.element().ok_or_else(|| CompileError::NotAnArray {
                name: var.name.clone(),
                scope: scope.to_string(),
            })?;
            return Ok(Symbol::scalar(element));
        }
        Ok(*symbol)
    }

    /// Emits the promotion-only cast sequence from `src` to `dst`.
    /// Identical types emit nothing; downward casts are illegal.
    fn cast(&mut self, src: &Symbol, dst: &Symbol) -> Result<(), CompileError> {
        if src == dst {
            return Ok(());
        }
        match (src.kind, dst.kind) {
            (SymbolKind::Scalar(ScalarType::Char), SymbolKind::Scalar(ScalarType::Int)) => {
                self.line("CHAR2INT");
            }
            (SymbolKind::Scalar(ScalarType::Char), SymbolKind::Scalar(ScalarType::Float)) => {
                self.line("CHAR2INT");
                self.line("INT2FLOAT");
            }
            (SymbolKind::Scalar(ScalarType::Int), SymbolKind::Scalar(ScalarType::Float)) => {
                self.line("INT2FLOAT");
            }
            (from, to) => return Err(CompileError::IllegalCast { from, to }),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        ArithExpr, ArithOp, Assign, AugAssign, AugOp, Call, CompOp, Comparison, For, FuncDef, If,
        Number, Program, Return, Stmt, TypeName, Var, VarDef,
    };
    use crate::builtins::parse_builtin_functions;
    use crate::symtab::build_symbol_table;

    fn emit_with(builtins: &FunctionSignatures, stmts: Vec<Stmt>) -> Result<String, CompileError> {
        let program = Program::with_stmts(stmts);
        let built = build_symbol_table(&program, builtins)?;
        let mut emitter = Emitter::new(&built.symbols, &built.functions);
        emitter.emit_program(&program)?;
        Ok(emitter.finish())
    }

    fn emit(stmts: Vec<Stmt>) -> Result<String, CompileError> {
        emit_with(&FunctionSignatures::new(), stmts)
    }

    fn int_var(name: &str) -> Stmt {
        Stmt::VarDef(VarDef::new(TypeName::Int, name))
    }

    fn float_var(name: &str) -> Stmt {
        Stmt::VarDef(VarDef::new(TypeName::Float, name))
    }

    #[test]
    fn assignment_with_promotion() {
        let out = emit(vec![
            int_var("x"),
            float_var("y"),
            Stmt::Assign(Assign {
                target: Var::new("y"),
                value: Expr::Var(Var::new("x")),
            }),
        ])
        .unwrap();
        assert_eq!(out, "LITERAL4 #x\nLOAD4\nINT2FLOAT\nLITERAL4 #y\nSTORE4\n")
    }

    #[test]
    fn same_type_assignment_emits_no_cast() {
        let out = emit(vec![
            int_var("x"),
            int_var("y"),
            Stmt::Assign(Assign {
                target: Var::new("y"),
                value: Expr::Var(Var::new("x")),
            }),
        ])
        .unwrap();
        assert_eq!(out, "LITERAL4 #x\nLOAD4\nLITERAL4 #y\nSTORE4\n")
    }

    #[test]
    fn downcast_assignment_fails() {
        let err = emit(vec![
            int_var("x"),
            float_var("y"),
            Stmt::Assign(Assign {
                target: Var::new("x"),
                value: Expr::Var(Var::new("y")),
            }),
        ])
        .unwrap_err();
        assert!(matches!(err, CompileError::IllegalDowncast(name) if name == "x"))
    }

    #[test]
    fn char_scalars_transfer_one_byte() {
        let out = emit(vec![
            Stmt::VarDef(VarDef::new(TypeName::Char, "c")),
            Stmt::Assign(Assign {
                target: Var::new("c"),
                value: Expr::Var(Var::new("c")),
            }),
        ])
        .unwrap();
        assert_eq!(out, "LITERAL4 #c\nLOAD1\nLITERAL4 #c\nSTORE1\n")
    }

    #[test]
    fn undefined_symbol_fails() {
        let err = emit(vec![Stmt::Assign(Assign {
            target: Var::new("missing"),
            value: Expr::Number(Number::Int(1)),
        })])
        .unwrap_err();
        assert!(matches!(err, CompileError::SymbolUndefined(name) if name == "missing"))
    }

    #[test]
    fn arithmetic_promotes_to_widest_factor() {
        let out = emit(vec![
            int_var("x"),
            float_var("y"),
            float_var("z"),
            Stmt::Assign(Assign {
                target: Var::new("z"),
                value: Expr::Arith(ArithExpr::new(
                    Expr::Var(Var::new("x")),
                    vec![(ArithOp::Add, Expr::Var(Var::new("y")))],
                )),
            }),
        ])
        .unwrap();
        assert_eq!(
            out,
            "LITERAL4 #x\nLOAD4\nINT2FLOAT\nLITERAL4 #y\nLOAD4\nFADD\nLITERAL4 #z\nSTORE4\n"
        )
    }

    #[test]
    fn integer_arithmetic_keeps_plain_ops() {
        let out = emit(vec![
            int_var("x"),
            int_var("z"),
            Stmt::Assign(Assign {
                target: Var::new("z"),
                value: Expr::Arith(ArithExpr::new(
                    Expr::Var(Var::new("x")),
                    vec![
                        (ArithOp::Mul, Expr::Number(Number::Int(2))),
                        (ArithOp::Sub, Expr::Number(Number::Int(1))),
                    ],
                )),
            }),
        ])
        .unwrap();
        assert_eq!(
            out,
            "LITERAL4 #x\nLOAD4\nLITERAL4 2\nMUL\nLITERAL4 1\nSUB\nLITERAL4 #z\nSTORE4\n"
        )
    }

    #[test]
    fn array_subscript_load_and_store() {
        let out = emit(vec![
            Stmt::VarDef(VarDef::array(TypeName::Float, "arr", 8)),
            int_var("i"),
            Stmt::Assign(Assign {
                target: Var::indexed("arr", Expr::Var(Var::new("i"))),
                value: Expr::Number(Number::Float(1.5)),
            }),
        ])
        .unwrap();
        assert_eq!(
            out,
            "LITERAL4 1.5\nLITERAL4 #arr\nLITERAL4 #i\nLOAD4\nLITERAL4 4\nMUL\nSTORE4\n"
        )
    }

    #[test]
    fn subscripting_a_scalar_fails() {
        let err = emit(vec![
            int_var("x"),
            Stmt::Assign(Assign {
                target: Var::indexed("x", Expr::Number(Number::Int(0))),
                value: Expr::Number(Number::Int(1)),
            }),
        ])
        .unwrap_err();
        assert!(matches!(err, CompileError::NotAnArray { name, .. } if name == "x"))
    }

    #[test]
    fn string_literal_stores_into_matching_array() {
        let out = emit(vec![
            Stmt::VarDef(VarDef::array(TypeName::Char, "buf", 3)),
            Stmt::Assign(Assign {
                target: Var::new("buf"),
                value: Expr::Str("hi".to_string()),
            }),
        ])
        .unwrap();
        assert_eq!(out, "LITERAL1_ARRAY \"hi\"\nLITERAL4 #buf\nSTORE1_ARRAY\n")
    }

    #[test]
    fn whole_array_load_pushes_length_first() {
        let out = emit(vec![
            Stmt::VarDef(VarDef::array(TypeName::Char, "a", 4)),
            Stmt::VarDef(VarDef::array(TypeName::Char, "b", 4)),
            Stmt::Assign(Assign {
                target: Var::new("b"),
                value: Expr::Var(Var::new("a")),
            }),
        ])
        .unwrap();
        assert_eq!(
            out,
            "LITERAL4 4\nLITERAL4 #a\nLOAD1_ARRAY\nLITERAL4 #b\nSTORE1_ARRAY\n"
        )
    }

    #[test]
    fn boolean_in_typed_context_fails() {
        let err = emit(vec![
            int_var("x"),
            Stmt::Assign(Assign {
                target: Var::new("x"),
                value: Expr::True,
            }),
        ])
        .unwrap_err();
        assert!(matches!(err, CompileError::UnrecognizedNode(_)))
    }

    #[test]
    fn if_draws_fresh_labels() {
        let body = |value: i64| {
            Stmt::Assign(Assign {
                target: Var::new("y"),
                value: Expr::Number(Number::Int(value)),
            })
        };
        let cond = || {
            Expr::Comparison(Comparison::new(
                Expr::Var(Var::new("x")),
                CompOp::Lt,
                Expr::Number(Number::Int(3)),
            ))
        };
        let out = emit(vec![
            int_var("x"),
            int_var("y"),
            Stmt::If(If {
                cond: cond(),
                body: vec![body(0)],
            }),
            Stmt::If(If {
                cond: cond(),
                body: vec![body(1)],
            }),
        ])
        .unwrap();

        let first = "LITERAL4 @if_stmt_1\nLITERAL4 #x\nLOAD4\nLITERAL4 3\nLESS\nNOT\nJMP_IF\n\
                     LITERAL4 0\nLITERAL4 #y\nSTORE4\n@if_stmt_1\n\n";
        assert!(out.starts_with(first), "got:\n{out}");
        assert!(out.contains("@if_stmt_2\n"))
    }

    #[test]
    fn while_loop_shape() {
        let out = emit(vec![
            int_var("x"),
            Stmt::While(crate::ast::While {
                cond: Expr::Comparison(Comparison::new(
                    Expr::Var(Var::new("x")),
                    CompOp::Gt,
                    Expr::Number(Number::Int(0)),
                )),
                body: vec![Stmt::AugAssign(AugAssign {
                    target: Var::new("x"),
                    op: AugOp::Sub,
                    value: Expr::Number(Number::Int(1)),
                })],
            }),
        ])
        .unwrap();
        assert_eq!(
            out,
            "@while_comp_1\nLITERAL4 @while_end_1\nLITERAL4 #x\nLOAD4\nLITERAL4 0\nGREATER\n\
             NOT\nJMP_IF\nLITERAL4 1\nLITERAL4 #x\nLOAD4\nSUB\nLITERAL4 #x\nSTORE4\n\
             LITERAL4 @while_comp_1\nJMP\n@while_end_1\n"
        )
    }

    #[test]
    fn for_loop_counts_to_a_literal_bound() {
        let out = emit(vec![
            int_var("i"),
            int_var("y"),
            Stmt::For(For {
                var: Var::new("i"),
                bound: Expr::Number(Number::Int(10)),
                body: vec![Stmt::AugAssign(AugAssign {
                    target: Var::new("y"),
                    op: AugOp::Add,
                    value: Expr::Var(Var::new("i")),
                })],
            }),
        ])
        .unwrap();

        assert!(out.starts_with("LITERAL4 0\nLITERAL4 #i\nSTORE4\n@for_start_1\n"));
        assert!(out.ends_with(
            "LITERAL4 #i\nLOAD4\nINC_S\nLITERAL4 #i\nSTORE4\n\
             LITERAL4 @for_start_1\nLITERAL4 #i\nLOAD4\nLITERAL4 10\nLESS\nJMP_IF\n"
        ))
    }

    #[test]
    fn non_literal_for_bound_is_rejected() {
        let err = emit(vec![
            int_var("i"),
            int_var("n"),
            Stmt::For(For {
                var: Var::new("i"),
                bound: Expr::Var(Var::new("n")),
                body: vec![],
            }),
        ])
        .unwrap_err();
        assert!(matches!(err, CompileError::UnrecognizedNode(_)))
    }

    #[test]
    fn float_augmented_assignment_prefixes_every_op() {
        // %= has no float form in the instruction set; the F prefix is
        // applied regardless and the assembler rejects the result.
        let out = emit(vec![
            float_var("y"),
            Stmt::AugAssign(AugAssign {
                target: Var::new("y"),
                op: AugOp::Mod,
                value: Expr::Number(Number::Float(2.0)),
            }),
        ])
        .unwrap();
        assert!(out.contains("FMOD\n"), "got:\n{out}")
    }

    #[test]
    fn function_definition_prologue_and_auto_return() {
        let out = emit(vec![Stmt::FuncDef(FuncDef {
            ret_type: TypeName::Void,
            ret_array_len: None,
            name: "tick".to_string(),
            params: vec![VarDef::new(TypeName::Int, "n")],
            body: vec![Stmt::VarDef(VarDef::new(TypeName::Int, "tmp"))],
        })])
        .unwrap();
        assert_eq!(
            out,
            "LITERAL4 @func_end_tick\nJMP\n$tick\n*n,4\n%tmp,4\nRETURN\n@func_end_tick\n$_global_\n"
        )
    }

    #[test]
    fn explicit_trailing_return_is_not_duplicated() {
        let out = emit(vec![Stmt::FuncDef(FuncDef {
            ret_type: TypeName::Int,
            ret_array_len: None,
            name: "one".to_string(),
            params: vec![],
            body: vec![Stmt::Return(Return {
                value: Some(Expr::Number(Number::Int(1))),
            })],
        })])
        .unwrap();
        assert_eq!(
            out,
            "LITERAL4 @func_end_one\nJMP\n$one\nLITERAL4 1\nRETURN\n@func_end_one\n$_global_\n"
        )
    }

    #[test]
    fn return_type_mismatch_fails() {
        let err = emit(vec![Stmt::FuncDef(FuncDef {
            ret_type: TypeName::Int,
            ret_array_len: None,
            name: "f".to_string(),
            params: vec![],
            body: vec![Stmt::Return(Return {
                value: Some(Expr::Number(Number::Float(1.0))),
            })],
        })])
        .unwrap_err();
        assert!(matches!(err, CompileError::ReturnTypeMismatch { .. }))
    }

    #[test]
    fn call_pushes_arguments_in_reverse_with_own_casts() {
        let builtins = parse_builtin_functions("void f(int x, float y);\n").unwrap();
        let out = emit_with(
            &builtins,
            vec![
                int_var("a"),
                int_var("b"),
                Stmt::Expr(Expr::Call(Call::new(
                    "f",
                    vec![Expr::Var(Var::new("a")), Expr::Var(Var::new("b"))],
                ))),
            ],
        )
        .unwrap();
        // b is cast to f's second parameter (float), a stays int.
        assert_eq!(
            out,
            "LITERAL4 #b\nLOAD4\nINT2FLOAT\nLITERAL4 #a\nLOAD4\nLITERAL4 #f\nCALL\n"
        )
    }

    #[test]
    fn call_statement_pops_numeric_results() {
        let builtins = parse_builtin_functions("int readSensor(int channel);\n").unwrap();
        let out = emit_with(
            &builtins,
            vec![Stmt::Expr(Expr::Call(Call::new(
                "readSensor",
                vec![Expr::Number(Number::Int(2))],
            )))],
        )
        .unwrap();
        assert_eq!(out, "LITERAL4 2\nLITERAL4 #readSensor\nCALL\nPOP4\n")
    }

    #[test]
    fn intrinsics_lower_to_single_opcodes() {
        let out = emit(vec![
            Stmt::Expr(Expr::Call(Call::new("waitNextMeasure", vec![]))),
            Stmt::Expr(Expr::Call(Call::new(
                "delay",
                vec![Expr::Number(Number::Int(500))],
            ))),
            Stmt::Expr(Expr::Call(Call::new("saveTable", vec![]))),
        ])
        .unwrap();
        assert_eq!(out, "WAIT_TABLE\nLITERAL4 500\nDELAY\nSAVE_TABLE\n")
    }

    #[test]
    fn unknown_callee_fails() {
        let err = emit(vec![Stmt::Expr(Expr::Call(Call::new("nope", vec![])))]).unwrap_err();
        assert!(matches!(err, CompileError::UnknownCallee(name) if name == "nope"))
    }

    #[test]
    fn arity_mismatch_fails() {
        let builtins = parse_builtin_functions("void f(int x);\n").unwrap();
        let err = emit_with(
            &builtins,
            vec![Stmt::Expr(Expr::Call(Call::new("f", vec![])))],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::ArityMismatch { .. }))
    }

    #[test]
    fn float_comparison_uses_float_ops() {
        let out = emit(vec![
            float_var("x"),
            Stmt::If(If {
                cond: Expr::Comparison(Comparison::new(
                    Expr::Var(Var::new("x")),
                    CompOp::Ne,
                    Expr::Number(Number::Float(0.5)),
                )),
                body: vec![],
            }),
        ])
        .unwrap();
        assert!(out.contains("FEQUALS\nNOT\n"), "got:\n{out}")
    }

    #[test]
    fn char_comparison_is_rejected() {
        let err = emit(vec![
            Stmt::VarDef(VarDef::new(TypeName::Char, "a")),
            Stmt::VarDef(VarDef::new(TypeName::Char, "b")),
            Stmt::If(If {
                cond: Expr::Comparison(Comparison::new(
                    Expr::Var(Var::new("a")),
                    CompOp::Eq,
                    Expr::Var(Var::new("b")),
                )),
                body: vec![],
            }),
        ])
        .unwrap_err();
        assert!(matches!(err, CompileError::UnrecognizedNode(_)))
    }

    #[test]
    fn float_to_int_argument_cast_is_illegal() {
        let builtins = parse_builtin_functions("void f(int x);\n").unwrap();
        let err = emit_with(
            &builtins,
            vec![
                float_var("y"),
                Stmt::Expr(Expr::Call(Call::new("f", vec![Expr::Var(Var::new("y"))]))),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::IllegalCast { .. }))
    }
}
