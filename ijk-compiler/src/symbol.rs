//! Class- and subroutine-scoped symbol tables (`spec.md` §3, §4.4).

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Static,
    Field,
    Arg,
    Var,
}

impl SymbolKind {
    /// Maps a symbol kind to the VM memory segment used for `push`/`pop`.
    pub fn segment(self) -> &'static str {
        match self {
            SymbolKind::Static => "static",
            SymbolKind::Field => "this",
            SymbolKind::Arg => "argument",
            SymbolKind::Var => "local",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub type_name: String,
    pub id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubroutineKind {
    Init,
    Fun,
    Method,
}

impl SubroutineKind {
    pub fn from_keyword(kw: &str) -> Option<Self> {
        match kw {
            "init" => Some(SubroutineKind::Init),
            "fun" => Some(SubroutineKind::Fun),
            "method" => Some(SubroutineKind::Method),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ClassScope {
    pub name: String,
    symbols: HashMap<String, Symbol>,
    statics_count: usize,
    fields_count: usize,
}

impl ClassScope {
    pub fn new(name: impl Into<String>) -> Self {
        ClassScope {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_static(&mut self, name: &str, type_name: &str) {
        let id = self.statics_count;
        self.statics_count += 1;
        self.symbols.insert(
            name.to_string(),
            Symbol {
                kind: SymbolKind::Static,
                type_name: type_name.to_string(),
                id,
            },
        );
    }

    pub fn add_field(&mut self, name: &str, type_name: &str) {
        let id = self.fields_count;
        self.fields_count += 1;
        self.symbols.insert(
            name.to_string(),
            Symbol {
                kind: SymbolKind::Field,
                type_name: type_name.to_string(),
                id,
            },
        );
    }

    pub fn fields_count(&self) -> usize {
        self.fields_count
    }

    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }
}

#[derive(Debug)]
pub struct SubroutineScope {
    pub name: String,
    pub kind: SubroutineKind,
    pub return_type: String,
    symbols: HashMap<String, Symbol>,
    args_count: usize,
    vars_count: usize,
}

impl SubroutineScope {
    pub fn new(name: impl Into<String>, kind: SubroutineKind, class_name: &str) -> Self {
        let mut scope = SubroutineScope {
            name: name.into(),
            kind,
            return_type: String::new(),
            symbols: HashMap::new(),
            args_count: 0,
            vars_count: 0,
        };
        if kind == SubroutineKind::Method {
            scope.add_arg("self", class_name);
        }
        scope
    }

    pub fn add_arg(&mut self, name: &str, type_name: &str) {
        let id = self.args_count;
        self.args_count += 1;
        self.symbols.insert(
            name.to_string(),
            Symbol {
                kind: SymbolKind::Arg,
                type_name: type_name.to_string(),
                id,
            },
        );
    }

    pub fn add_var(&mut self, name: &str, type_name: &str) {
        let id = self.vars_count;
        self.vars_count += 1;
        self.symbols.insert(
            name.to_string(),
            Symbol {
                kind: SymbolKind::Var,
                type_name: type_name.to_string(),
                id,
            },
        );
    }

    pub fn vars_count(&self) -> usize {
        self.vars_count
    }

    /// Subroutine scope shadows the owning class scope.
    pub fn resolve<'a>(&'a self, class: &'a ClassScope, name: &str) -> Option<&'a Symbol> {
        self.symbols.get(name).or_else(|| class.resolve(name))
    }

    pub fn resolve_local(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_and_statics_get_independent_counters() {
        let mut class = ClassScope::new("Point");
        class.add_field("x", "num");
        class.add_field("y", "num");
        class.add_static("count", "num");

        assert_eq!(class.resolve("x").unwrap().id, 0);
        assert_eq!(class.resolve("y").unwrap().id, 1);
        assert_eq!(class.resolve("count").unwrap().id, 0);
        assert_eq!(class.fields_count(), 2);
    }

    #[test]
    fn method_gets_implicit_self_as_arg_zero() {
        let sub = SubroutineScope::new("move", SubroutineKind::Method, "Point");
        let s = sub.resolve_local("self").unwrap();
        assert_eq!(s.kind, SymbolKind::Arg);
        assert_eq!(s.id, 0);
        assert_eq!(s.type_name, "Point");
    }

    #[test]
    fn subroutine_scope_shadows_class_scope() {
        let mut class = ClassScope::new("Point");
        class.add_field("x", "num");

        let mut sub = SubroutineScope::new("f", SubroutineKind::Fun, "Point");
        sub.add_var("x", "char");

        let resolved = sub.resolve(&class, "x").unwrap();
        assert_eq!(resolved.kind, SymbolKind::Var);
        assert_eq!(resolved.type_name, "char");
    }

    #[test]
    fn segment_mapping_matches_spec() {
        assert_eq!(SymbolKind::Static.segment(), "static");
        assert_eq!(SymbolKind::Field.segment(), "this");
        assert_eq!(SymbolKind::Arg.segment(), "argument");
        assert_eq!(SymbolKind::Var.segment(), "local");
    }
}
