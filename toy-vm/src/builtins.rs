// toy-vm - Bytecode compiler and virtual machine for the Toy programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Host-provided builtin functions.
//!
//! The table order is part of the bytecode contract: `OpGetBuiltin` operands
//! are indices into `BUILTINS`, and the compiler pre-defines the names at
//! the same indices. Builtins report misuse by returning an in-band
//! `Value::Error` rather than aborting the VM; `None` means the builtin
//! produced nothing and the VM pushes null.

use std::rc::Rc;

use crate::value::Value;

/// Signature of a builtin: borrow the arguments, optionally produce a value.
pub type BuiltinFn = fn(&[Value]) -> Option<Value>;

/// A named host function.
#[derive(Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// All builtins, in index order.
pub static BUILTINS: [Builtin; 6] = [
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "puts",
        func: builtin_puts,
    },
    Builtin {
        name: "first",
        func: builtin_first,
    },
    Builtin {
        name: "last",
        func: builtin_last,
    },
    Builtin {
        name: "rest",
        func: builtin_rest,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
];

/// Look up a builtin by name.
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

fn new_error(message: String) -> Option<Value> {
    Some(Value::Error(Rc::from(message)))
}

fn wrong_arity(expected: usize, actual: usize) -> Option<Value> {
    new_error(format!(
        "wrong number of arguments, expected {}, actual {}",
        expected, actual
    ))
}

fn builtin_len(args: &[Value]) -> Option<Value> {
    if args.len() != 1 {
        return wrong_arity(1, args.len());
    }
    match &args[0] {
        Value::Array(elements) => Some(Value::Integer(elements.len() as i64)),
        Value::Str(s) => Some(Value::Integer(s.len() as i64)),
        other => new_error(format!(
            "argument type to `len` not supported, actual {}",
            other.type_name()
        )),
    }
}

fn builtin_puts(args: &[Value]) -> Option<Value> {
    for arg in args {
        println!("{}", arg);
    }
    None
}

fn builtin_first(args: &[Value]) -> Option<Value> {
    if args.len() != 1 {
        return wrong_arity(1, args.len());
    }
    match &args[0] {
        Value::Array(elements) => elements.front().cloned(),
        other => new_error(format!(
            "argument type to `first` must be ARRAY, actual {}",
            other.type_name()
        )),
    }
}

fn builtin_last(args: &[Value]) -> Option<Value> {
    if args.len() != 1 {
        return wrong_arity(1, args.len());
    }
    match &args[0] {
        Value::Array(elements) => elements.back().cloned(),
        other => new_error(format!(
            "argument type to `last` must be ARRAY, actual {}",
            other.type_name()
        )),
    }
}

fn builtin_rest(args: &[Value]) -> Option<Value> {
    if args.len() != 1 {
        return wrong_arity(1, args.len());
    }
    match &args[0] {
        Value::Array(elements) => {
            if elements.is_empty() {
                return None;
            }
            let mut rest = (**elements).clone();
            rest.pop_front();
            Some(Value::Array(Rc::new(rest)))
        }
        other => new_error(format!(
            "argument type to `rest` must be ARRAY, actual {}",
            other.type_name()
        )),
    }
}

fn builtin_push(args: &[Value]) -> Option<Value> {
    if args.len() != 2 {
        return wrong_arity(2, args.len());
    }
    match &args[0] {
        Value::Array(elements) => {
            let mut pushed = (**elements).clone();
            pushed.push_back(args[1].clone());
            Some(Value::Array(Rc::new(pushed)))
        }
        other => new_error(format!(
            "argument type to `push` must be ARRAY, actual {}",
            other.type_name()
        )),
    }
}
