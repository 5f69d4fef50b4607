// toy-vm - Bytecode compiler and virtual machine for the Toy programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime error type for VM execution.

use std::fmt;

/// Fatal error during VM execution. Aborts the run; builtins report their
/// failures in-band as `Value::Error` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The operand stack or the frame stack overflowed its fixed arena.
    StackOverflow,
    /// `OpCall` on a value that is neither a closure nor a builtin.
    CallingNonFunction,
    /// Closure called with the wrong number of arguments.
    WrongNumberOfArguments { expected: usize, actual: usize },
    /// Binary operation on a type pairing with no defined behaviour.
    UnsupportedBinaryTypes {
        left: &'static str,
        right: &'static str,
    },
    /// Arithmetic opcode not defined on integers (never emitted by this
    /// compiler, but the bytecode is not trusted).
    UnknownIntegerOperator(u8),
    /// String operation other than concatenation.
    UnknownStringOperator(u8),
    /// Comparison opcode not defined for the operand types.
    UnknownOperator {
        opcode: u8,
        left: &'static str,
        right: &'static str,
    },
    /// `OpMinus` on a non-integer.
    UnsupportedNegation(&'static str),
    /// A hash key of an unhashable type.
    UnusableHashKey(&'static str),
    /// `OpIndex` on a value that is neither an array nor a hash.
    IndexNotSupported(&'static str),
    /// A byte that decodes to no opcode.
    UnknownOpcode(u8),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::StackOverflow => write!(f, "stack overflow"),
            RuntimeError::CallingNonFunction => write!(f, "calling non-function"),
            RuntimeError::WrongNumberOfArguments { expected, actual } => write!(
                f,
                "wrong number of arguments, expected {}, actual {}",
                expected, actual
            ),
            RuntimeError::UnsupportedBinaryTypes { left, right } => {
                write!(f, "unsupported types for binary operation: {} {}", left, right)
            }
            RuntimeError::UnknownIntegerOperator(opcode) => {
                write!(f, "unknown integer operator: {}", opcode)
            }
            RuntimeError::UnknownStringOperator(opcode) => {
                write!(f, "unknown string operator: {}", opcode)
            }
            RuntimeError::UnknownOperator {
                opcode,
                left,
                right,
            } => write!(f, "unknown operator: {} ({} {})", opcode, left, right),
            RuntimeError::UnsupportedNegation(type_name) => {
                write!(f, "unsupported type for negation: {}", type_name)
            }
            RuntimeError::UnusableHashKey(type_name) => {
                write!(f, "unusable as hash key: {}", type_name)
            }
            RuntimeError::IndexNotSupported(type_name) => {
                write!(f, "index operator not supported: {}", type_name)
            }
            RuntimeError::UnknownOpcode(byte) => write!(f, "opcode {} undefined", byte),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for VM operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
