// toy-vm - Bytecode compiler and virtual machine for the Toy programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime value types for Toy.
//!
//! `Value` is the central enum representing all runtime values. Heap-backed
//! variants are `Rc`-wrapped: cloning a value is cheap, closures can outlive
//! the call that created them, and identity comparison is pointer identity.
//! All values are immutable once constructed, so plain reference counting
//! reclaims everything (no cycles are constructible).

use std::fmt;
use std::rc::Rc;

use im::{OrdMap, Vector};

use crate::builtins::Builtin;

/// The canonical `true` value.
pub const TRUE: Value = Value::Boolean(true);
/// The canonical `false` value.
pub const FALSE: Value = Value::Boolean(false);
/// The canonical null value.
pub const NULL: Value = Value::Null;

/// A compiled function body: instructions plus the frame shape it needs.
///
/// Not directly callable; the VM only ever runs it wrapped in a `Closure`.
#[derive(Debug)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// The callable runtime object: a compiled function together with the
/// values it captured from enclosing scopes at creation time.
#[derive(Debug)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

/// A Toy runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Null,
    Str(Rc<str>),
    Array(Rc<Vector<Value>>),
    Hash(Rc<OrdMap<HashKey, HashPair>>),
    Function(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(&'static Builtin),
    Error(Rc<str>),
}

impl Value {
    /// The type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::Null => "NULL",
            Value::Str(_) => "STRING",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::Function(_) => "COMPILED_FUNCTION",
            Value::Closure(_) => "CLOSURE",
            Value::Builtin(_) => "BUILTIN",
            Value::Error(_) => "ERROR",
        }
    }

    /// Hash key for this value, or `None` if the type is not hashable.
    /// Only integers, booleans, and strings may be hash keys.
    pub fn hash_key(&self) -> Option<HashKey> {
        let key = match self {
            Value::Integer(n) => HashKey {
                kind: HashKeyKind::Integer,
                value: *n as u64,
            },
            Value::Boolean(b) => HashKey {
                kind: HashKeyKind::Boolean,
                value: u64::from(*b),
            },
            Value::Str(s) => HashKey {
                kind: HashKeyKind::Str,
                value: fnv1a_64(s.as_bytes()),
            },
            _ => return None,
        };
        Some(key)
    }

    /// Identity comparison: the equality the VM falls back to when at least
    /// one operand is not an integer. Booleans and null are singletons, so
    /// identity and value coincide; everything heap-backed compares by
    /// pointer. Distinct-but-equal strings therefore compare unequal.
    pub fn same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Inspection: how a value prints in the REPL and through `puts`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(elements) => {
                let parts: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Hash(pairs) => {
                let parts: Vec<String> = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Function(function) => {
                write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(function))
            }
            Value::Closure(closure) => write!(f, "Closure[{:p}]", Rc::as_ptr(closure)),
            Value::Builtin(_) => write!(f, "builtin function"),
            Value::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}

/// What kind of value a hash key was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashKeyKind {
    Integer,
    Boolean,
    Str,
}

/// A hash key: the originating type plus a 64-bit payload. For integers the
/// payload is the value itself, for booleans 0 or 1, and for strings the
/// FNV-1a hash of the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashKey {
    pub kind: HashKeyKind,
    pub value: u64,
}

/// A hash entry. The original key object is kept alongside the value so
/// inspection can print it.
#[derive(Debug, Clone)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

/// 64-bit FNV-1a.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
