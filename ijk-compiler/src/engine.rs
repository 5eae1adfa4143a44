//! Fused recursive-descent parser and code generator (`spec.md` §4.5). There
//! is no intermediate AST: each grammar rule emits VM instructions as it
//! recognizes its construct.

use std::io::Write;

use crate::error::{Error, Result};
use crate::stream::TokenStream;
use crate::symbol::{ClassScope, Symbol, SubroutineKind, SubroutineScope};
use crate::token::{Token, TokenKind};
use crate::vmwriter::VmWriter;

const BINARY_OPS: &str = "+-&|<>=*/";

pub(crate) struct CompilationEngine<W: Write> {
    stream: TokenStream,
    writer: VmWriter<W>,
    class: ClassScope,
    sub: Option<SubroutineScope>,
    label_counter: usize,
}

impl<W: Write> CompilationEngine<W> {
    pub(crate) fn new(tokens: Vec<Token>, out: W) -> Self {
        CompilationEngine {
            stream: TokenStream::new(tokens),
            writer: VmWriter::new(out),
            class: ClassScope::default(),
            sub: None,
            label_counter: 0,
        }
    }

    pub(crate) fn compile(mut self) -> Result<()> {
        self.compile_class()
    }

    fn compile_class(&mut self) -> Result<()> {
        self.expect_keyword("class")?;
        let name = self.identifier()?;
        self.class = ClassScope::new(name);
        self.expect_colon()?;
        self.expect_newline()?;
        self.expect_indent()?;
        loop {
            match self.peek_kind() {
                Some(TokenKind::Keyword(k)) if k == "static" || k == "field" => {
                    self.compile_class_var()?;
                }
                Some(TokenKind::Keyword(k)) if matches!(k.as_str(), "init" | "fun" | "method") => {
                    self.compile_subroutine()?;
                }
                _ => break,
            }
        }
        self.expect_dedent()?;
        Ok(())
    }

    fn compile_class_var(&mut self) -> Result<()> {
        let kind_tok = self.bump()?;
        let is_static = kind_tok.is_keyword("static");
        let type_name = self.type_name()?;
        loop {
            let name = self.identifier()?;
            if is_static {
                self.class.add_static(&name, &type_name);
            } else {
                self.class.add_field(&name, &type_name);
            }
            if self.eat_symbol(',')? {
                continue;
            }
            break;
        }
        self.expect_newline()?;
        Ok(())
    }

    fn compile_subroutine(&mut self) -> Result<()> {
        let kind_tok = self.bump()?;
        let kind = match &kind_tok.kind {
            TokenKind::Keyword(k) => SubroutineKind::from_keyword(k)
                .ok_or_else(|| self.unexpected(&kind_tok, "subroutine keyword"))?,
            _ => return Err(self.unexpected(&kind_tok, "subroutine keyword")),
        };
        let name = self.identifier()?;
        self.expect_symbol('(')?;
        let mut sub = SubroutineScope::new(name.clone(), kind, &self.class.name);
        if !self.at_symbol(')') {
            loop {
                let ty = self.type_name()?;
                let pname = self.identifier()?;
                sub.add_arg(&pname, &ty);
                if self.eat_symbol(',')? {
                    continue;
                }
                break;
            }
        }
        self.expect_symbol(')')?;
        self.expect_arrow()?;
        sub.return_type = self.type_name()?;
        self.expect_colon()?;
        self.expect_newline()?;
        self.expect_indent()?;

        while self.peek_kind().map(|k| matches!(k, TokenKind::Keyword(w) if w == "var")) == Some(true) {
            self.bump()?;
            let ty = self.type_name()?;
            loop {
                let vname = self.identifier()?;
                sub.add_var(&vname, &ty);
                if self.eat_symbol(',')? {
                    continue;
                }
                break;
            }
            self.expect_newline()?;
        }

        self.writer.write_function(&self.class.name, &name, sub.vars_count())?;
        match kind {
            SubroutineKind::Init => {
                self.writer.write_push("constant", self.class.fields_count())?;
                self.writer.write_call("Memory", "alloc", 1)?;
                self.writer.write_pop("pointer", 0)?;
            }
            SubroutineKind::Method => {
                self.writer.write_push("argument", 0)?;
                self.writer.write_pop("pointer", 0)?;
            }
            SubroutineKind::Fun => {}
        }

        self.sub = Some(sub);
        while !self.at_dedent() {
            self.compile_statement()?;
        }
        self.expect_dedent()?;
        self.sub = None;
        Ok(())
    }

    fn compile_statement(&mut self) -> Result<()> {
        match self.peek_kind() {
            Some(TokenKind::Keyword(k)) if k == "if" => self.compile_if(),
            Some(TokenKind::Keyword(k)) if k == "while" => self.compile_while(),
            Some(TokenKind::Keyword(k)) if k == "let" => self.compile_let(),
            Some(TokenKind::Keyword(k)) if k == "do" => self.compile_do(),
            Some(TokenKind::Keyword(k)) if k == "return" => self.compile_return(),
            Some(_) => {
                let t = self.bump()?;
                Err(self.unexpected(&t, "statement"))
            }
            None => Err(Error::UnexpectedEof),
        }
    }

    fn compile_if(&mut self) -> Result<()> {
        self.expect_keyword("if")?;
        self.expect_symbol('(')?;
        self.compile_expr()?;
        self.expect_symbol(')')?;
        let l_false = self.new_label();
        let l_end = self.new_label();
        self.writer.write_if_not_goto(&l_false)?;
        self.expect_colon()?;
        self.expect_newline()?;
        self.expect_indent()?;
        while !self.at_dedent() {
            self.compile_statement()?;
        }
        self.expect_dedent()?;
        self.writer.write_goto(&l_end)?;
        self.writer.write_label(&l_false)?;
        if self.peek_kind().map(|k| matches!(k, TokenKind::Keyword(w) if w == "else")) == Some(true) {
            self.bump()?;
            self.expect_colon()?;
            self.expect_newline()?;
            self.expect_indent()?;
            while !self.at_dedent() {
                self.compile_statement()?;
            }
            self.expect_dedent()?;
        }
        self.writer.write_label(&l_end)?;
        Ok(())
    }

    fn compile_while(&mut self) -> Result<()> {
        self.expect_keyword("while")?;
        let l_loop = self.new_label();
        let l_false = self.new_label();
        self.writer.write_label(&l_loop)?;
        self.expect_symbol('(')?;
        self.compile_expr()?;
        self.expect_symbol(')')?;
        self.writer.write_if_not_goto(&l_false)?;
        self.expect_colon()?;
        self.expect_newline()?;
        self.expect_indent()?;
        while !self.at_dedent() {
            self.compile_statement()?;
        }
        self.expect_dedent()?;
        self.writer.write_goto(&l_loop)?;
        self.writer.write_label(&l_false)?;
        Ok(())
    }

    fn compile_let(&mut self) -> Result<()> {
        self.expect_keyword("let")?;
        let tok = self.identifier_tok()?;
        let name = tok.identifier().unwrap().to_string();
        if self.eat_symbol('[')? {
            self.compile_expr()?;
            self.expect_symbol(']')?;
            let sym = self.resolve(&tok, &name)?;
            self.writer.write_push_symbol(sym.kind, sym.id)?;
            self.writer.write("add")?;
            self.expect_symbol('=')?;
            self.compile_expr()?;
            self.expect_newline()?;
            self.writer.write_pop("temp", 0)?;
            self.writer.write_pop("pointer", 1)?;
            self.writer.write_push("temp", 0)?;
            self.writer.write_pop("that", 0)?;
        } else {
            self.expect_symbol('=')?;
            self.compile_expr()?;
            self.expect_newline()?;
            let sym = self.resolve(&tok, &name)?;
            self.writer.write_pop_symbol(sym.kind, sym.id)?;
        }
        Ok(())
    }

    fn compile_do(&mut self) -> Result<()> {
        self.expect_keyword("do")?;
        self.compile_term()?;
        self.expect_newline()?;
        self.writer.write_pop("temp", 0)?;
        Ok(())
    }

    fn compile_return(&mut self) -> Result<()> {
        self.expect_keyword("return")?;
        if self.peek_kind().map(|k| matches!(k, TokenKind::Newline)) == Some(true) {
            self.writer.write_push("constant", 0)?;
        } else {
            self.compile_expr()?;
        }
        self.expect_newline()?;
        self.writer.write_return()?;
        Ok(())
    }

    /// Strictly left-to-right, no precedence: every operator is emitted the
    /// moment it's seen, in source order.
    fn compile_expr(&mut self) -> Result<()> {
        self.compile_term()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Symbol(c)) if BINARY_OPS.contains(*c) => *c,
                _ => break,
            };
            self.bump()?;
            self.compile_term()?;
            match op {
                '+' => self.writer.write("add")?,
                '-' => self.writer.write("sub")?,
                '&' => self.writer.write("and")?,
                '|' => self.writer.write("or")?,
                '<' => self.writer.write("lt")?,
                '>' => self.writer.write("gt")?,
                '=' => self.writer.write("eq")?,
                '*' => self.writer.write_call("Math", "multiply", 2)?,
                '/' => self.writer.write_call("Math", "divide", 2)?,
                _ => unreachable!(),
            }
        }
        Ok(())
    }

    fn compile_term(&mut self) -> Result<()> {
        let t = self.bump()?;
        match &t.kind {
            TokenKind::IntegerConstant(n) => self.writer.write_int(*n)?,
            TokenKind::StringConstant(s) => self.writer.write_string(s)?,
            TokenKind::Keyword(k) if k == "self" => self.writer.write_push("pointer", 0)?,
            TokenKind::Keyword(k) if k == "true" => {
                self.writer.write_push("constant", 0)?;
                self.writer.write("not")?;
            }
            TokenKind::Keyword(k) if k == "false" || k == "none" => {
                self.writer.write_push("constant", 0)?;
            }
            TokenKind::Symbol('-') => {
                self.compile_term()?;
                self.writer.write("neg")?;
            }
            TokenKind::Symbol('!') => {
                self.compile_term()?;
                self.writer.write("not")?;
            }
            TokenKind::Symbol('(') => {
                self.compile_expr()?;
                self.expect_symbol(')')?;
            }
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.compile_identifier_term(&t, name)?;
            }
            _ => return Err(self.unexpected(&t, "term")),
        }
        Ok(())
    }

    fn compile_identifier_term(&mut self, tok: &Token, name: String) -> Result<()> {
        match self.peek_kind() {
            Some(TokenKind::Symbol('[')) => {
                self.bump()?;
                self.compile_expr()?;
                self.expect_symbol(']')?;
                let sym = self.resolve(tok, &name)?;
                self.writer.write_push_symbol(sym.kind, sym.id)?;
                self.writer.write("add")?;
                self.writer.write_pop("pointer", 1)?;
                self.writer.write_push("that", 0)?;
            }
            Some(TokenKind::Symbol('.')) => {
                self.bump()?;
                let method = self.identifier()?;
                self.expect_symbol('(')?;
                if let Ok(sym) = self.resolve(tok, &name) {
                    self.writer.write_push_symbol(sym.kind, sym.id)?;
                    let n = self.compile_args()?;
                    self.writer.write_call(&sym.type_name, &method, n + 1)?;
                } else {
                    let n = self.compile_args()?;
                    self.writer.write_call(&name, &method, n)?;
                }
            }
            Some(TokenKind::Symbol('(')) => {
                self.bump()?;
                self.writer.write_push("pointer", 0)?;
                let n = self.compile_args()?;
                self.writer.write_call(&self.class.name, &name, n + 1)?;
            }
            _ => {
                let sym = self.resolve(tok, &name)?;
                self.writer.write_push_symbol(sym.kind, sym.id)?;
            }
        }
        Ok(())
    }

    /// Parses a `(` already-consumed argument list, pushing each argument in
    /// order, and consumes the closing `)`.
    fn compile_args(&mut self) -> Result<usize> {
        let mut n = 0;
        if !self.at_symbol(')') {
            loop {
                self.compile_expr()?;
                n += 1;
                if self.eat_symbol(',')? {
                    continue;
                }
                break;
            }
        }
        self.expect_symbol(')')?;
        Ok(n)
    }

    fn resolve(&self, tok: &Token, name: &str) -> Result<Symbol> {
        let found = match &self.sub {
            Some(sub) => sub.resolve(&self.class, name),
            None => self.class.resolve(name),
        };
        found.cloned().ok_or_else(|| Error::UnresolvedSymbol {
            line: tok.line,
            column: tok.column,
            name: name.to_string(),
        })
    }

    fn new_label(&mut self) -> String {
        let label = format!("L{}", self.label_counter);
        self.label_counter += 1;
        log::debug!("allocated label {label}");
        label
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.stream.peek().map(|t| &t.kind)
    }

    fn at_symbol(&self, c: char) -> bool {
        matches!(self.stream.peek(), Some(t) if t.is_symbol(c))
    }

    fn at_dedent(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Dedent))
    }

    fn eat_symbol(&mut self, c: char) -> Result<bool> {
        if self.at_symbol(c) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn bump(&mut self) -> Result<Token> {
        self.stream.advance().ok_or(Error::UnexpectedEof)
    }

    fn unexpected(&self, t: &Token, expected: &str) -> Error {
        Error::UnexpectedToken {
            line: t.line,
            column: t.column,
            expected: expected.to_string(),
            found: t.kind.to_string(),
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<Token> {
        let t = self.bump()?;
        if t.is_keyword(kw) {
            Ok(t)
        } else {
            Err(self.unexpected(&t, &format!("'{kw}'")))
        }
    }

    fn expect_symbol(&mut self, c: char) -> Result<Token> {
        let t = self.bump()?;
        if t.is_symbol(c) {
            Ok(t)
        } else {
            Err(self.unexpected(&t, &format!("'{c}'")))
        }
    }

    fn expect_arrow(&mut self) -> Result<Token> {
        let t = self.bump()?;
        if matches!(t.kind, TokenKind::Arrow) {
            Ok(t)
        } else {
            Err(self.unexpected(&t, "'->'"))
        }
    }

    fn expect_colon(&mut self) -> Result<Token> {
        let t = self.bump()?;
        if matches!(t.kind, TokenKind::Colon) {
            Ok(t)
        } else {
            Err(self.unexpected(&t, "':'"))
        }
    }

    fn expect_newline(&mut self) -> Result<Token> {
        let t = self.bump()?;
        if matches!(t.kind, TokenKind::Newline) {
            Ok(t)
        } else {
            Err(self.unexpected(&t, "newline"))
        }
    }

    fn expect_indent(&mut self) -> Result<Token> {
        let t = self.bump()?;
        if matches!(t.kind, TokenKind::Indent) {
            Ok(t)
        } else {
            Err(self.unexpected(&t, "indented block"))
        }
    }

    fn expect_dedent(&mut self) -> Result<Token> {
        let t = self.bump()?;
        if matches!(t.kind, TokenKind::Dedent) {
            Ok(t)
        } else {
            Err(self.unexpected(&t, "end of block"))
        }
    }

    fn identifier_tok(&mut self) -> Result<Token> {
        let t = self.bump()?;
        match t.kind {
            TokenKind::Identifier(_) => Ok(t),
            _ => Err(self.unexpected(&t, "identifier")),
        }
    }

    fn identifier(&mut self) -> Result<String> {
        let t = self.identifier_tok()?;
        match t.kind {
            TokenKind::Identifier(s) => Ok(s),
            _ => unreachable!(),
        }
    }

    fn type_name(&mut self) -> Result<String> {
        let t = self.bump()?;
        match t.kind {
            TokenKind::Keyword(k) => Ok(k),
            TokenKind::Identifier(i) => Ok(i),
            _ => Err(self.unexpected(&t, "type")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indent;
    use crate::lexer;

    fn compile(src: &str) -> String {
        let raw = lexer::tokenize(src).unwrap().0;
        let tokens = indent::filter(raw).unwrap();
        let mut out = Vec::new();
        CompilationEngine::new(tokens, &mut out).compile().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn method_returning_nothing() {
        let vm = compile("class A:\n  method f() -> void:\n    return\n");
        assert_eq!(
            vm,
            "function A.f 0\n\
             push argument 0\n\
             pop pointer 0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn constructor_with_two_fields() {
        let vm = compile(
            "class P:\n  field num x\n  field num y\n  init new() -> P:\n    return self\n",
        );
        assert_eq!(
            vm,
            "function P.new 0\n\
             push constant 2\n\
             call Memory.alloc 1\n\
             pop pointer 0\n\
             push pointer 0\n\
             return\n"
        );
    }

    #[test]
    fn while_loop_with_decrement() {
        let vm = compile(
            "class C:\n  fun f(num n) -> void:\n    while (n):\n      let n = n-1\n    return\n",
        );
        assert!(vm.contains("label L0\n"));
        assert!(vm.contains("label L1\n"));
        assert!(vm.contains("if-goto L1\n"));
        assert!(vm.contains("goto L0\n"));
        assert!(vm.contains("pop argument 0\n"));
    }

    #[test]
    fn array_write_emits_eight_instructions() {
        let vm = compile(
            "class C:\n  field num a\n  fun f(num i, num v) -> void:\n    let a[i] = v\n    return\n",
        );
        assert!(vm.contains(
            "push argument 0\n\
             push this 0\n\
             add\n\
             push argument 1\n\
             pop temp 0\n\
             pop pointer 1\n\
             push temp 0\n\
             pop that 0\n"
        ));
    }

    #[test]
    fn qualified_call_on_object_variable() {
        let vm = compile(
            "class C:\n  fun f(Point p) -> void:\n    do p.move(1, 2)\n    return\n",
        );
        assert!(vm.contains(
            "push argument 0\n\
             push constant 1\n\
             push constant 2\n\
             call Point.move 3\n\
             pop temp 0\n"
        ));
    }

    #[test]
    fn static_call_is_not_treated_as_a_method() {
        let vm = compile("class C:\n  fun f(num x) -> void:\n    do Math.abs(x)\n    return\n");
        assert!(vm.contains(
            "push argument 0\n\
             call Math.abs 1\n\
             pop temp 0\n"
        ));
    }

    #[test]
    fn implicit_self_call_inside_a_method() {
        let vm = compile(
            "class C:\n  method outer() -> void:\n    do inner()\n    return\n  method inner() -> void:\n    return\n",
        );
        assert!(vm.contains("push pointer 0\ncall C.inner 1\n"));
    }

    #[test]
    fn if_else_allocates_two_labels_and_joins_at_end() {
        let vm = compile(
            "class C:\n  fun f(bool b) -> void:\n    if (b):\n      return\n    else:\n      return\n",
        );
        assert!(vm.contains("not\nif-goto L0\n"));
        assert!(vm.contains("goto L1\n"));
        assert!(vm.contains("label L0\n"));
        assert!(vm.contains("label L1\n"));
    }

    #[test]
    fn unresolved_identifier_is_reported() {
        let raw =
            lexer::tokenize("class C:\n  fun f() -> num:\n    return y\n").unwrap().0;
        let tokens = indent::filter(raw).unwrap();
        let mut out = Vec::new();
        let err = CompilationEngine::new(tokens, &mut out).compile().unwrap_err();
        assert!(matches!(err, Error::UnresolvedSymbol { ref name, .. } if name == "y"));
    }

    #[test]
    fn true_literal_pushes_all_ones() {
        let vm = compile(
            "class C:\n  fun f() -> bool:\n    return true\n",
        );
        assert!(vm.contains("push constant 0\nnot\nreturn\n"));
    }
}
