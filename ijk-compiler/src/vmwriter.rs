//! Emits line-oriented stack-VM assembly text (`spec.md` §5).

use std::io::{self, Write};

use crate::symbol::SymbolKind;

pub(crate) struct VmWriter<W: Write> {
    out: W,
}

impl<W: Write> VmWriter<W> {
    pub(crate) fn new(out: W) -> Self {
        VmWriter { out }
    }

    pub(crate) fn write_push(&mut self, segment: &str, index: usize) -> io::Result<()> {
        writeln!(self.out, "push {segment} {index}")
    }

    pub(crate) fn write_pop(&mut self, segment: &str, index: usize) -> io::Result<()> {
        writeln!(self.out, "pop {segment} {index}")
    }

    pub(crate) fn write_push_symbol(&mut self, kind: SymbolKind, id: usize) -> io::Result<()> {
        self.write_push(kind.segment(), id)
    }

    pub(crate) fn write_pop_symbol(&mut self, kind: SymbolKind, id: usize) -> io::Result<()> {
        self.write_pop(kind.segment(), id)
    }

    pub(crate) fn write_int(&mut self, value: i64) -> io::Result<()> {
        self.write_push("constant", value as usize)
    }

    /// Builds a `String` object at runtime, one `appendChar` call per byte of
    /// the literal (the lexeme's surrounding quotes are stripped first).
    pub(crate) fn write_string(&mut self, lexeme: &str) -> io::Result<()> {
        let inner = lexeme
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(lexeme);
        self.write_push("constant", inner.chars().count())?;
        self.write_call("String", "new", 1)?;
        for ch in inner.chars() {
            self.write_push("constant", ch as usize)?;
            self.write_call("String", "appendChar", 2)?;
        }
        Ok(())
    }

    pub(crate) fn write_function(&mut self, class: &str, name: &str, nvars: usize) -> io::Result<()> {
        writeln!(self.out, "function {class}.{name} {nvars}")
    }

    pub(crate) fn write_call(&mut self, class: &str, name: &str, nargs: usize) -> io::Result<()> {
        writeln!(self.out, "call {class}.{name} {nargs}")
    }

    pub(crate) fn write_return(&mut self) -> io::Result<()> {
        writeln!(self.out, "return")
    }

    pub(crate) fn write_label(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "label {label}")
    }

    pub(crate) fn write_goto(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "goto {label}")
    }

    /// Negates the top-of-stack condition then branches, the usual
    /// `while`/`if` idiom: jump away when the condition is *false*.
    pub(crate) fn write_if_not_goto(&mut self, label: &str) -> io::Result<()> {
        self.write("not")?;
        writeln!(self.out, "if-goto {label}")
    }

    /// Raw opcode line: `add`, `sub`, `neg`, `eq`, `gt`, `lt`, `and`, `or`, `not`.
    pub(crate) fn write(&mut self, opcode: &str) -> io::Result<()> {
        writeln!(self.out, "{opcode}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(f: impl FnOnce(&mut VmWriter<&mut Vec<u8>>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        let mut w = VmWriter::new(&mut buf);
        f(&mut w).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn push_pop_and_arithmetic() {
        let text = rendered(|w| {
            w.write_push("constant", 7)?;
            w.write_push("local", 0)?;
            w.write("add")?;
            w.write_pop("local", 0)
        });
        assert_eq!(text, "push constant 7\npush local 0\nadd\npop local 0\n");
    }

    #[test]
    fn function_call_return() {
        let text = rendered(|w| {
            w.write_function("Main", "run", 2)?;
            w.write_call("Main", "helper", 1)?;
            w.write_return()
        });
        assert_eq!(
            text,
            "function Main.run 2\ncall Main.helper 1\nreturn\n"
        );
    }

    #[test]
    fn string_literal_builds_char_by_char() {
        let text = rendered(|w| w.write_string("\"hi\""));
        assert_eq!(
            text,
            "push constant 2\n\
             call String.new 1\n\
             push constant 104\n\
             call String.appendChar 2\n\
             push constant 105\n\
             call String.appendChar 2\n"
        );
    }

    #[test]
    fn if_not_goto_negates_then_branches() {
        let text = rendered(|w| w.write_if_not_goto("L0"));
        assert_eq!(text, "not\nif-goto L0\n");
    }
}
