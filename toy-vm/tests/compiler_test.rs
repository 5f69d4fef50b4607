// toy-vm - Compiler emission tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Tests that source fragments compile to the expected instruction streams
//! and constant pools.

use toy_parser::{Lexer, Parser};
use toy_vm::compiler::{Bytecode, CompileError, Compiler};
use toy_vm::opcode::{self, Opcode, make};
use toy_vm::value::Value;

fn compile(input: &str) -> Bytecode {
    let mut parser = Parser::new(Lexer::new(input));
    let program = parser.parse_program();
    assert_eq!(
        parser.errors(),
        &[] as &[String],
        "parse errors for input: {}",
        input
    );
    let mut compiler = Compiler::new();
    compiler
        .compile(&program)
        .unwrap_or_else(|e| panic!("compile error for input {}: {}", input, e));
    compiler.bytecode()
}

fn compile_error(input: &str) -> CompileError {
    let mut parser = Parser::new(Lexer::new(input));
    let program = parser.parse_program();
    assert_eq!(parser.errors(), &[] as &[String]);
    let mut compiler = Compiler::new();
    compiler
        .compile(&program)
        .expect_err(&format!("expected compile error for input: {}", input))
}

/// Compare instruction streams through the disassembler so failures show
/// readable listings.
fn assert_instructions(actual: &[u8], expected: &[Vec<u8>], input: &str) {
    let expected: Vec<u8> = expected.concat();
    assert_eq!(
        opcode::disassemble(actual),
        opcode::disassemble(&expected),
        "wrong instructions for input: {}",
        input
    );
}

fn assert_integer_constants(constants: &[Value], expected: &[i64]) {
    assert_eq!(constants.len(), expected.len());
    for (constant, want) in constants.iter().zip(expected) {
        match constant {
            Value::Integer(n) => assert_eq!(n, want),
            other => panic!("expected integer constant, got {:?}", other),
        }
    }
}

/// The instructions of the function constant at `index`.
fn function_instructions(constants: &[Value], index: usize) -> &[u8] {
    match &constants[index] {
        Value::Function(function) => &function.instructions,
        other => panic!("constant {} is not a function: {:?}", index, other),
    }
}

#[test]
fn integer_arithmetic() {
    let cases: &[(&str, &[i64], Vec<Vec<u8>>)] = &[
        (
            "1 + 2",
            &[1, 2],
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Add, &[]),
                make(Opcode::Pop, &[]),
            ],
        ),
        (
            "1; 2",
            &[1, 2],
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Pop, &[]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Pop, &[]),
            ],
        ),
        (
            "1 - 2",
            &[1, 2],
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Sub, &[]),
                make(Opcode::Pop, &[]),
            ],
        ),
        (
            "1 * 2",
            &[1, 2],
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Mul, &[]),
                make(Opcode::Pop, &[]),
            ],
        ),
        (
            "2 / 1",
            &[2, 1],
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Div, &[]),
                make(Opcode::Pop, &[]),
            ],
        ),
        (
            "-1",
            &[1],
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Minus, &[]),
                make(Opcode::Pop, &[]),
            ],
        ),
    ];
    for (input, constants, instructions) in cases {
        let bytecode = compile(input);
        assert_instructions(&bytecode.instructions, instructions, input);
        assert_integer_constants(&bytecode.constants, constants);
    }
}

#[test]
fn boolean_expressions() {
    let cases: &[(&str, &[i64], Vec<Vec<u8>>)] = &[
        (
            "true",
            &[],
            vec![make(Opcode::True, &[]), make(Opcode::Pop, &[])],
        ),
        (
            "1 > 2",
            &[1, 2],
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::GreaterThan, &[]),
                make(Opcode::Pop, &[]),
            ],
        ),
        // `<` compiles as `>` with the operands swapped: 2 enters the pool
        // first.
        (
            "1 < 2",
            &[2, 1],
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::GreaterThan, &[]),
                make(Opcode::Pop, &[]),
            ],
        ),
        (
            "1 == 2",
            &[1, 2],
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Equal, &[]),
                make(Opcode::Pop, &[]),
            ],
        ),
        (
            "true != false",
            &[],
            vec![
                make(Opcode::True, &[]),
                make(Opcode::False, &[]),
                make(Opcode::NotEqual, &[]),
                make(Opcode::Pop, &[]),
            ],
        ),
        (
            "!true",
            &[],
            vec![
                make(Opcode::True, &[]),
                make(Opcode::Bang, &[]),
                make(Opcode::Pop, &[]),
            ],
        ),
    ];
    for (input, constants, instructions) in cases {
        let bytecode = compile(input);
        assert_instructions(&bytecode.instructions, instructions, input);
        assert_integer_constants(&bytecode.constants, constants);
    }
}

#[test]
fn conditionals() {
    let bytecode = compile("if (true) { 10 }; 3333;");
    assert_instructions(
        &bytecode.instructions,
        &[
            // 0000
            make(Opcode::True, &[]),
            // 0001
            make(Opcode::JumpNotTruthy, &[10]),
            // 0004
            make(Opcode::Constant, &[0]),
            // 0007
            make(Opcode::Jump, &[11]),
            // 0010
            make(Opcode::Null, &[]),
            // 0011
            make(Opcode::Pop, &[]),
            // 0012
            make(Opcode::Constant, &[1]),
            // 0015
            make(Opcode::Pop, &[]),
        ],
        "if (true) { 10 }; 3333;",
    );
    assert_integer_constants(&bytecode.constants, &[10, 3333]);

    let bytecode = compile("if (true) { 10 } else { 20 }; 3333;");
    assert_instructions(
        &bytecode.instructions,
        &[
            // 0000
            make(Opcode::True, &[]),
            // 0001
            make(Opcode::JumpNotTruthy, &[10]),
            // 0004
            make(Opcode::Constant, &[0]),
            // 0007
            make(Opcode::Jump, &[13]),
            // 0010
            make(Opcode::Constant, &[1]),
            // 0013
            make(Opcode::Pop, &[]),
            // 0014
            make(Opcode::Constant, &[2]),
            // 0017
            make(Opcode::Pop, &[]),
        ],
        "if (true) { 10 } else { 20 }; 3333;",
    );
    assert_integer_constants(&bytecode.constants, &[10, 20, 3333]);
}

#[test]
fn global_let_statements() {
    let bytecode = compile("let one = 1; let two = 2;");
    assert_instructions(
        &bytecode.instructions,
        &[
            make(Opcode::Constant, &[0]),
            make(Opcode::SetGlobal, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::SetGlobal, &[1]),
        ],
        "let one = 1; let two = 2;",
    );

    let bytecode = compile("let one = 1; one;");
    assert_instructions(
        &bytecode.instructions,
        &[
            make(Opcode::Constant, &[0]),
            make(Opcode::SetGlobal, &[0]),
            make(Opcode::GetGlobal, &[0]),
            make(Opcode::Pop, &[]),
        ],
        "let one = 1; one;",
    );
}

#[test]
fn string_expressions() {
    let bytecode = compile(r#""toy" + "lang""#);
    assert_instructions(
        &bytecode.instructions,
        &[
            make(Opcode::Constant, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Add, &[]),
            make(Opcode::Pop, &[]),
        ],
        "string concat",
    );
    match (&bytecode.constants[0], &bytecode.constants[1]) {
        (Value::Str(a), Value::Str(b)) => {
            assert_eq!(&**a, "toy");
            assert_eq!(&**b, "lang");
        }
        other => panic!("expected string constants, got {:?}", other),
    }
}

#[test]
fn array_literals() {
    let bytecode = compile("[]");
    assert_instructions(
        &bytecode.instructions,
        &[make(Opcode::Array, &[0]), make(Opcode::Pop, &[])],
        "[]",
    );

    let bytecode = compile("[1 + 2, 3 - 4, 5 * 6]");
    assert_instructions(
        &bytecode.instructions,
        &[
            make(Opcode::Constant, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Add, &[]),
            make(Opcode::Constant, &[2]),
            make(Opcode::Constant, &[3]),
            make(Opcode::Sub, &[]),
            make(Opcode::Constant, &[4]),
            make(Opcode::Constant, &[5]),
            make(Opcode::Mul, &[]),
            make(Opcode::Array, &[3]),
            make(Opcode::Pop, &[]),
        ],
        "[1 + 2, 3 - 4, 5 * 6]",
    );
}

#[test]
fn hash_literals() {
    let bytecode = compile("{}");
    assert_instructions(
        &bytecode.instructions,
        &[make(Opcode::Hash, &[0]), make(Opcode::Pop, &[])],
        "{}",
    );

    // The OpHash operand counts keys and values together.
    let bytecode = compile("{1: 2, 3: 4, 5: 6}");
    assert_instructions(
        &bytecode.instructions,
        &[
            make(Opcode::Constant, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Constant, &[2]),
            make(Opcode::Constant, &[3]),
            make(Opcode::Constant, &[4]),
            make(Opcode::Constant, &[5]),
            make(Opcode::Hash, &[6]),
            make(Opcode::Pop, &[]),
        ],
        "{1: 2, 3: 4, 5: 6}",
    );
    assert_integer_constants(&bytecode.constants, &[1, 2, 3, 4, 5, 6]);
}

#[test]
fn hash_keys_are_sorted_by_rendering() {
    // Written back to front; compiled front to back.
    let bytecode = compile("{3: 4, 1: 2}");
    assert_integer_constants(&bytecode.constants, &[1, 2, 3, 4]);
}

#[test]
fn index_expressions() {
    let bytecode = compile("[1, 2, 3][1 + 1]");
    assert_instructions(
        &bytecode.instructions,
        &[
            make(Opcode::Constant, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Constant, &[2]),
            make(Opcode::Array, &[3]),
            make(Opcode::Constant, &[3]),
            make(Opcode::Constant, &[4]),
            make(Opcode::Add, &[]),
            make(Opcode::Index, &[]),
            make(Opcode::Pop, &[]),
        ],
        "[1, 2, 3][1 + 1]",
    );
}

#[test]
fn functions() {
    let bytecode = compile("fn() { return 5 + 10 }");
    assert_instructions(
        &bytecode.instructions,
        &[make(Opcode::Closure, &[2, 0]), make(Opcode::Pop, &[])],
        "fn() { return 5 + 10 }",
    );
    assert_instructions(
        function_instructions(&bytecode.constants, 2),
        &[
            make(Opcode::Constant, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Add, &[]),
            make(Opcode::ReturnValue, &[]),
        ],
        "function body",
    );

    // The implicit form compiles identically.
    let bytecode = compile("fn() { 5 + 10 }");
    assert_instructions(
        function_instructions(&bytecode.constants, 2),
        &[
            make(Opcode::Constant, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Add, &[]),
            make(Opcode::ReturnValue, &[]),
        ],
        "implicit return body",
    );
}

#[test]
fn functions_without_return_value() {
    let bytecode = compile("fn() { }");
    assert_instructions(
        function_instructions(&bytecode.constants, 0),
        &[make(Opcode::Return, &[])],
        "empty body",
    );

    let bytecode = compile("fn() { let a = 1; }");
    assert_instructions(
        function_instructions(&bytecode.constants, 1),
        &[
            make(Opcode::Constant, &[0]),
            make(Opcode::SetLocal, &[0]),
            make(Opcode::Return, &[]),
        ],
        "let-ending body",
    );
}

#[test]
fn function_calls() {
    let bytecode = compile("fn() { 24 }();");
    assert_instructions(
        &bytecode.instructions,
        &[
            make(Opcode::Closure, &[1, 0]),
            make(Opcode::Call, &[0]),
            make(Opcode::Pop, &[]),
        ],
        "fn() { 24 }();",
    );

    let bytecode = compile("let oneArg = fn(a) { a; }; oneArg(24);");
    assert_instructions(
        &bytecode.instructions,
        &[
            make(Opcode::Closure, &[0, 0]),
            make(Opcode::SetGlobal, &[0]),
            make(Opcode::GetGlobal, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Call, &[1]),
            make(Opcode::Pop, &[]),
        ],
        "one argument call",
    );
    assert_instructions(
        function_instructions(&bytecode.constants, 0),
        &[make(Opcode::GetLocal, &[0]), make(Opcode::ReturnValue, &[])],
        "parameter body",
    );

    let bytecode = compile("let manyArg = fn(a, b, c) { c }; manyArg(24, 25, 26);");
    assert_instructions(
        &bytecode.instructions,
        &[
            make(Opcode::Closure, &[0, 0]),
            make(Opcode::SetGlobal, &[0]),
            make(Opcode::GetGlobal, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Constant, &[2]),
            make(Opcode::Constant, &[3]),
            make(Opcode::Call, &[3]),
            make(Opcode::Pop, &[]),
        ],
        "three argument call",
    );
}

#[test]
fn let_statement_scopes() {
    let bytecode = compile("let num = 55; fn() { num }");
    assert_instructions(
        &bytecode.instructions,
        &[
            make(Opcode::Constant, &[0]),
            make(Opcode::SetGlobal, &[0]),
            make(Opcode::Closure, &[1, 0]),
            make(Opcode::Pop, &[]),
        ],
        "global read from function",
    );
    assert_instructions(
        function_instructions(&bytecode.constants, 1),
        &[make(Opcode::GetGlobal, &[0]), make(Opcode::ReturnValue, &[])],
        "global read body",
    );

    let bytecode = compile("fn() { let a = 55; let b = 77; a + b }");
    assert_instructions(
        function_instructions(&bytecode.constants, 2),
        &[
            make(Opcode::Constant, &[0]),
            make(Opcode::SetLocal, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::SetLocal, &[1]),
            make(Opcode::GetLocal, &[0]),
            make(Opcode::GetLocal, &[1]),
            make(Opcode::Add, &[]),
            make(Opcode::ReturnValue, &[]),
        ],
        "two locals body",
    );
    match &bytecode.constants[2] {
        Value::Function(function) => {
            assert_eq!(function.num_locals, 2);
            assert_eq!(function.num_parameters, 0);
        }
        other => panic!("expected function constant, got {:?}", other),
    }
}

#[test]
fn builtins_compile_to_fixed_indices() {
    let bytecode = compile("len([]); push([], 1);");
    assert_instructions(
        &bytecode.instructions,
        &[
            make(Opcode::GetBuiltin, &[0]),
            make(Opcode::Array, &[0]),
            make(Opcode::Call, &[1]),
            make(Opcode::Pop, &[]),
            make(Opcode::GetBuiltin, &[5]),
            make(Opcode::Array, &[0]),
            make(Opcode::Constant, &[0]),
            make(Opcode::Call, &[2]),
            make(Opcode::Pop, &[]),
        ],
        "len and push",
    );

    let bytecode = compile("fn() { len([]) }");
    assert_instructions(
        function_instructions(&bytecode.constants, 0),
        &[
            make(Opcode::GetBuiltin, &[0]),
            make(Opcode::Array, &[0]),
            make(Opcode::Call, &[1]),
            make(Opcode::ReturnValue, &[]),
        ],
        "builtin inside function",
    );
}

#[test]
fn closures() {
    let bytecode = compile("fn(a) { fn(b) { a + b } }");
    assert_instructions(
        function_instructions(&bytecode.constants, 0),
        &[
            make(Opcode::GetFree, &[0]),
            make(Opcode::GetLocal, &[0]),
            make(Opcode::Add, &[]),
            make(Opcode::ReturnValue, &[]),
        ],
        "inner closure body",
    );
    assert_instructions(
        function_instructions(&bytecode.constants, 1),
        &[
            make(Opcode::GetLocal, &[0]),
            make(Opcode::Closure, &[0, 1]),
            make(Opcode::ReturnValue, &[]),
        ],
        "outer body",
    );
    assert_instructions(
        &bytecode.instructions,
        &[make(Opcode::Closure, &[1, 0]), make(Opcode::Pop, &[])],
        "main",
    );
}

#[test]
fn nested_closures_capture_transitively() {
    let bytecode = compile("fn(a) { fn(b) { fn(c) { a + b + c } } }");
    assert_instructions(
        function_instructions(&bytecode.constants, 0),
        &[
            make(Opcode::GetFree, &[0]),
            make(Opcode::GetFree, &[1]),
            make(Opcode::Add, &[]),
            make(Opcode::GetLocal, &[0]),
            make(Opcode::Add, &[]),
            make(Opcode::ReturnValue, &[]),
        ],
        "innermost body",
    );
    assert_instructions(
        function_instructions(&bytecode.constants, 1),
        &[
            make(Opcode::GetFree, &[0]),
            make(Opcode::GetLocal, &[0]),
            make(Opcode::Closure, &[0, 2]),
            make(Opcode::ReturnValue, &[]),
        ],
        "middle body",
    );
    assert_instructions(
        function_instructions(&bytecode.constants, 2),
        &[
            make(Opcode::GetLocal, &[0]),
            make(Opcode::Closure, &[1, 1]),
            make(Opcode::ReturnValue, &[]),
        ],
        "outer body",
    );
}

#[test]
fn recursive_functions_use_current_closure() {
    let bytecode = compile("let countDown = fn(x) { countDown(x - 1); }; countDown(1);");
    assert_instructions(
        function_instructions(&bytecode.constants, 1),
        &[
            make(Opcode::CurrentClosure, &[]),
            make(Opcode::GetLocal, &[0]),
            make(Opcode::Constant, &[0]),
            make(Opcode::Sub, &[]),
            make(Opcode::Call, &[1]),
            make(Opcode::ReturnValue, &[]),
        ],
        "recursive body",
    );
    assert_instructions(
        &bytecode.instructions,
        &[
            make(Opcode::Closure, &[1, 0]),
            make(Opcode::SetGlobal, &[0]),
            make(Opcode::GetGlobal, &[0]),
            make(Opcode::Constant, &[2]),
            make(Opcode::Call, &[1]),
            make(Opcode::Pop, &[]),
        ],
        "recursive main",
    );
}

#[test]
fn constants_are_not_deduplicated() {
    let bytecode = compile("1 + 1 + 1");
    assert_integer_constants(&bytecode.constants, &[1, 1, 1]);
}

#[test]
fn undefined_variable() {
    assert_eq!(
        compile_error("foobar"),
        CompileError::UndefinedVariable("foobar".to_string())
    );
    assert_eq!(compile_error("foobar").to_string(), "undefined variable foobar");
}

#[test]
fn logical_operators_are_not_implemented() {
    assert_eq!(
        compile_error("true && false").to_string(),
        "unknown operator &&"
    );
    assert_eq!(
        compile_error("true || false").to_string(),
        "unknown operator ||"
    );
}

#[test]
fn prefix_plus_is_not_implemented() {
    assert_eq!(compile_error("+5").to_string(), "unknown operator +");
}

#[test]
fn compiler_state_carries_over() {
    // Two compiles that share a symbol table and constant pool, as the REPL
    // drives them: the pool grows monotonically and the second input can
    // see the first one's binding.
    let mut parser = Parser::new(Lexer::new("let a = 1;"));
    let program = parser.parse_program();
    let mut compiler = Compiler::new();
    compiler.compile(&program).unwrap();
    let first = compiler.bytecode();
    let (symbols, constants) = compiler.into_state();
    assert_eq!(first.constants.len(), 1);

    let mut parser = Parser::new(Lexer::new("a + 2;"));
    let program = parser.parse_program();
    let mut compiler = Compiler::new_with_state(symbols, constants);
    compiler.compile(&program).unwrap();
    let second = compiler.bytecode();
    assert_eq!(second.constants.len(), 2);
    assert_instructions(
        &second.instructions,
        &[
            make(Opcode::GetGlobal, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Add, &[]),
            make(Opcode::Pop, &[]),
        ],
        "second REPL input",
    );
}
