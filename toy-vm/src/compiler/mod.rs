// toy-vm - Bytecode compiler and virtual machine for the Toy programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler: walks the AST and emits instructions.
//!
//! Each function literal is compiled in its own compilation scope; the
//! finished body becomes a `CompiledFunction` constant and the enclosing
//! scope receives an `OpClosure` that wraps it with its captured values.
//! The scope keeps the opcode and position of its two most recent emissions,
//! which is exactly the look-back needed to strip a trailing `OpPop` (if
//! expressions yield values) and to rewrite the last `OpPop` of a body into
//! an implicit `OpReturnValue`.

pub mod symbols;

use std::fmt;
use std::rc::Rc;

use toy_parser::ast::{
    BlockStatement, Expression, InfixOperator, PrefixOperator, Program, Statement,
};

use crate::builtins;
use crate::opcode::{self, Opcode};
use crate::value::{CompiledFunction, Value};

use symbols::{SymbolScope, SymbolTable};

/// Error during compilation. The first error aborts the compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A name that no scope defines.
    UndefinedVariable(String),
    /// An operator the instruction set has no encoding for.
    UnknownOperator(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UndefinedVariable(name) => write!(f, "undefined variable {}", name),
            CompileError::UnknownOperator(op) => write!(f, "unknown operator {}", op),
        }
    }
}

impl std::error::Error for CompileError {}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

/// The compiler's output: the top-level instruction stream and the constant
/// pool it references.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    pub instructions: Vec<u8>,
    pub constants: Vec<Value>,
}

/// The opcode and byte position of an emitted instruction.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// One function body under construction.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Vec<u8>,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

/// The bytecode compiler.
pub struct Compiler {
    constants: Vec<Value>,
    symbols: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    /// Create a compiler with an empty constant pool and a fresh symbol
    /// table pre-populated with the builtins at their fixed indices.
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        for (index, builtin) in builtins::BUILTINS.iter().enumerate() {
            symbols.define_builtin(index, builtin.name);
        }
        Self::new_with_state(symbols, Vec::new())
    }

    /// Create a compiler that continues from existing state. The REPL uses
    /// this to keep the symbol table and constant pool across inputs.
    pub fn new_with_state(symbols: SymbolTable, constants: Vec<Value>) -> Self {
        Self {
            constants,
            symbols,
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Compile a program into the current scope.
    pub fn compile(&mut self, program: &Program) -> Result<()> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    /// The finished bytecode: the main scope's instructions plus the pool.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scopes[0].instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    /// Give back the symbol table and constant pool for the next
    /// `new_with_state`.
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbols, self.constants)
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Expression(expression) => {
                self.compile_expression(expression)?;
                self.emit(Opcode::Pop, &[]);
            }
            Statement::Let { name, value } => {
                // Define before compiling the value so that a function
                // literal bound here can refer to itself.
                let symbol = self.symbols.define(name);
                self.compile_expression(value)?;
                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index]),
                    _ => self.emit(Opcode::SetLocal, &[symbol.index]),
                };
            }
            Statement::Return(value) => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> Result<()> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> Result<()> {
        match expression {
            Expression::Integer(value) => {
                let index = self.add_constant(Value::Integer(*value));
                self.emit(Opcode::Constant, &[index]);
            }
            Expression::Str(value) => {
                let index = self.add_constant(Value::Str(Rc::from(value.as_str())));
                self.emit(Opcode::Constant, &[index]);
            }
            Expression::Boolean(true) => {
                self.emit(Opcode::True, &[]);
            }
            Expression::Boolean(false) => {
                self.emit(Opcode::False, &[]);
            }
            Expression::Identifier(name) => {
                let symbol = self
                    .symbols
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                self.load_symbol(&symbol);
            }
            Expression::Prefix { operator, right } => {
                self.compile_expression(right)?;
                match operator {
                    PrefixOperator::Minus => self.emit(Opcode::Minus, &[]),
                    PrefixOperator::Bang => self.emit(Opcode::Bang, &[]),
                    PrefixOperator::Plus => {
                        return Err(CompileError::UnknownOperator(operator.to_string()));
                    }
                };
            }
            Expression::Infix {
                operator,
                left,
                right,
            } => self.compile_infix(*operator, left, right)?,
            Expression::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if(condition, consequence, alternative.as_ref())?,
            Expression::Function {
                parameters,
                body,
                name,
            } => self.compile_function(parameters, body, name.as_deref())?,
            Expression::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Opcode::Call, &[arguments.len()]);
            }
            Expression::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()]);
            }
            Expression::Hash(pairs) => {
                // Sort by the keys' source rendering so emission order is
                // deterministic regardless of how the literal was written.
                let mut sorted: Vec<&(Expression, Expression)> = pairs.iter().collect();
                sorted.sort_by_key(|(key, _)| key.to_string());
                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2]);
            }
            Expression::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[]);
            }
        }
        Ok(())
    }

    fn compile_infix(
        &mut self,
        operator: InfixOperator,
        left: &Expression,
        right: &Expression,
    ) -> Result<()> {
        // There is no less-than opcode: compile `a < b` as `b > a`.
        let (operator, left, right) = if operator == InfixOperator::Lt {
            (InfixOperator::Gt, right, left)
        } else {
            (operator, left, right)
        };

        self.compile_expression(left)?;
        self.compile_expression(right)?;

        match operator {
            InfixOperator::Plus => self.emit(Opcode::Add, &[]),
            InfixOperator::Minus => self.emit(Opcode::Sub, &[]),
            InfixOperator::Asterisk => self.emit(Opcode::Mul, &[]),
            InfixOperator::Slash => self.emit(Opcode::Div, &[]),
            InfixOperator::Eq => self.emit(Opcode::Equal, &[]),
            InfixOperator::NotEq => self.emit(Opcode::NotEqual, &[]),
            InfixOperator::Gt => self.emit(Opcode::GreaterThan, &[]),
            InfixOperator::Lt | InfixOperator::And | InfixOperator::Or => {
                return Err(CompileError::UnknownOperator(operator.to_string()));
            }
        };
        Ok(())
    }

    fn compile_if(
        &mut self,
        condition: &Expression,
        consequence: &BlockStatement,
        alternative: Option<&BlockStatement>,
    ) -> Result<()> {
        self.compile_expression(condition)?;

        // Placeholder target, patched once the consequence length is known.
        let jump_not_truthy_pos = self.emit(Opcode::JumpNotTruthy, &[0]);

        self.compile_block(consequence)?;
        // The if expression itself must leave a value on the stack.
        if self.last_instruction_is(Opcode::Pop) {
            self.remove_last_pop();
        }

        let jump_pos = self.emit(Opcode::Jump, &[0]);
        let alternative_pos = self.current_instructions().len();

        match alternative {
            None => {
                self.emit(Opcode::Null, &[]);
            }
            Some(alternative) => {
                self.compile_block(alternative)?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_pop();
                }
            }
        }

        let after_alternative_pos = self.current_instructions().len();
        self.change_operand(jump_not_truthy_pos, alternative_pos);
        self.change_operand(jump_pos, after_alternative_pos);
        Ok(())
    }

    fn compile_function(
        &mut self,
        parameters: &[String],
        body: &BlockStatement,
        name: Option<&str>,
    ) -> Result<()> {
        self.enter_scope();

        if let Some(name) = name {
            self.symbols.define_function_name(name);
        }
        for parameter in parameters {
            self.symbols.define(parameter);
        }

        self.compile_block(body)?;

        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[]);
        }

        let free_symbols = self.symbols.free_symbols.clone();
        let num_locals = self.symbols.num_definitions;
        let instructions = self.leave_scope();

        // Push the captured values; OpClosure collects them off the stack.
        // The order must match free_symbols exactly.
        for symbol in &free_symbols {
            self.load_symbol(symbol);
        }

        let function = Value::Function(Rc::new(CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
        }));
        let index = self.add_constant(function);
        self.emit(Opcode::Closure, &[index, free_symbols.len()]);
        Ok(())
    }

    fn load_symbol(&mut self, symbol: &symbols::Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        };
    }

    /// Append a value to the constant pool and return its index. The pool
    /// is append-only: one entry per literal occurrence, no deduplication.
    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Emit an instruction into the current scope; returns its byte
    /// position.
    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let instruction = opcode::make(op, operands);
        let position = self.add_instruction(&instruction);
        self.set_last_instruction(op, position);
        position
    }

    fn add_instruction(&mut self, instruction: &[u8]) -> usize {
        let scope = self.scope_mut();
        let position = scope.instructions.len();
        scope.instructions.extend_from_slice(instruction);
        position
    }

    fn set_last_instruction(&mut self, opcode: Opcode, position: usize) {
        let scope = self.scope_mut();
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, op: Opcode) -> bool {
        self.scope()
            .last_instruction
            .is_some_and(|last| last.opcode == op)
    }

    /// Drop the trailing instruction (always an `OpPop`) and restore the
    /// previous-instruction record. Cannot be called twice in a row: the
    /// record only reaches back two instructions.
    fn remove_last_pop(&mut self) {
        let scope = self.scope_mut();
        let last = scope.last_instruction.expect("no instruction to remove");
        scope.instructions.truncate(last.position);
        scope.last_instruction = scope.previous_instruction.take();
    }

    /// Overwrite bytes in place; the replacement must be the same length as
    /// the instruction it replaces.
    fn replace_instruction(&mut self, position: usize, instruction: &[u8]) {
        let target = &mut self.scope_mut().instructions[position..position + instruction.len()];
        target.copy_from_slice(instruction);
    }

    /// Re-encode the instruction at `position` with a new operand.
    fn change_operand(&mut self, position: usize, operand: usize) {
        let op = Opcode::try_from(self.scope().instructions[position])
            .expect("patching an unknown opcode");
        let instruction = opcode::make(op, &[operand]);
        self.replace_instruction(position, &instruction);
    }

    /// Rewrite a trailing `OpPop` into `OpReturnValue` (both one byte), the
    /// implicit return of a function body.
    fn replace_last_pop_with_return(&mut self) {
        let position = self
            .scope()
            .last_instruction
            .expect("no instruction to replace")
            .position;
        self.replace_instruction(position, &opcode::make(Opcode::ReturnValue, &[]));
        self.scope_mut().last_instruction = Some(EmittedInstruction {
            opcode: Opcode::ReturnValue,
            position,
        });
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let outer = std::mem::take(&mut self.symbols);
        self.symbols = SymbolTable::enclose(outer);
    }

    fn leave_scope(&mut self) -> Vec<u8> {
        let scope = self.scopes.pop().expect("left the main scope");
        let inner = std::mem::take(&mut self.symbols);
        self.symbols = inner.into_outer().expect("left the global symbol table");
        scope.instructions
    }

    fn current_instructions(&self) -> &[u8] {
        &self.scope().instructions
    }

    fn scope(&self) -> &CompilationScope {
        self.scopes.last().expect("no compilation scope")
    }

    fn scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("no compilation scope")
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
