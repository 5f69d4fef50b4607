// toy-vm - Bytecode compiler and virtual machine for the Toy programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Compile-time symbol resolution.
//!
//! A `SymbolTable` maps names to `{scope, index}` descriptors. Tables nest:
//! each function body being compiled encloses the table of its surrounding
//! scope. Resolving a name that turns out to live in an enclosing function
//! promotes it to a free variable of the current table, which is how
//! closures know what to capture.

use std::collections::HashMap;

/// Where a resolved name lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    /// Top-level binding, stored in the globals array.
    Global,
    /// Binding inside a function body, stored on the stack above the frame's
    /// base pointer.
    Local,
    /// One of the fixed host builtins.
    Builtin,
    /// Captured from an enclosing function; read from the running closure.
    Free,
    /// The name of the function currently being compiled; resolves to the
    /// running closure itself.
    Function,
}

/// A resolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One lexical scope's worth of name bindings.
#[derive(Debug, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    /// Count of Global/Local definitions; doubles as the next index.
    pub num_definitions: usize,
    /// Originals captured from the enclosing scope, in first-use order. The
    /// compiler replays this list to emit capture loads before `OpClosure`.
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Create an outermost (global) table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table enclosed by `outer`, with a fresh definition counter.
    pub fn enclose(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    /// Take back the enclosing table, consuming this one.
    pub fn into_outer(self) -> Option<SymbolTable> {
        self.outer.map(|boxed| *boxed)
    }

    /// Define `name` in this table. The scope is Global for the outermost
    /// table and Local otherwise; redefinition shadows (last write wins).
    pub fn define(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: if self.outer.is_none() {
                SymbolScope::Global
            } else {
                SymbolScope::Local
            },
            index: self.num_definitions,
        };
        self.num_definitions += 1;
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Define a builtin at a fixed index. Does not touch the definition
    /// counter.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Define the name of the function whose body this table belongs to,
    /// so that the body can refer to itself without a binding.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Resolve `name`, looking outward through enclosing tables.
    ///
    /// A hit in an enclosing table with Local or Free scope is promoted: the
    /// original symbol is appended to `free_symbols` and a shadowing Free
    /// symbol is stored here, so later resolutions are direct. Global and
    /// Builtin hits pass through unchanged.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let outer = self.outer.as_mut()?;
        let symbol = outer.resolve(name)?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            _ => Some(self.define_free(symbol)),
        }
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len(),
        };
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }
}
