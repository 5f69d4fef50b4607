// toy - A small dynamically typed scripting language, compiled and run on a bytecode VM
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::env;
use std::fs;
use std::io::{self, Write};

use toy_parser::{Lexer, Parser};
use toy_vm::compiler::Compiler;
use toy_vm::value::Value;
use toy_vm::vm::{GLOBALS_SIZE, VM};
use toy_vm::{SymbolTable, builtins, opcode};

fn main() {
    let args: Vec<String> = env::args().collect();

    match args.len() {
        1 => run_repl(),
        2 if args[1] == "--version" || args[1] == "-v" => println!("Toy v0.1.0"),
        2 => run_file(&args[1]),
        3 if args[2] == "-s" => print_assembly(&args[1]),
        _ => print_usage(),
    }
}

fn print_usage() {
    println!(
        r#"Toy VM interpreter
Usage:

1. Launch REPL mode
$ toy

2. Compile and execute toy lang script source code file
$ toy path_to_script_file

3. Compile and print the assembly text
$ toy path_to_script_file -s"#
    );
}

/// Compile a source file, or report why it cannot be compiled.
fn compile_file(file_path: &str) -> Option<toy_vm::Bytecode> {
    let source = match fs::read_to_string(file_path) {
        Ok(source) => source,
        Err(e) => {
            println!("Read file error: {}", e);
            return None;
        }
    };

    let mut parser = Parser::new(Lexer::new(&source));
    let program = parser.parse_program();
    if !parser.errors().is_empty() {
        println!("Parser errors:");
        for message in parser.errors() {
            println!("\t{}", message);
        }
        return None;
    }

    let mut compiler = Compiler::new();
    if let Err(e) = compiler.compile(&program) {
        println!("Compilation failed: {}", e);
        return None;
    }
    Some(compiler.bytecode())
}

/// Compile and execute a script file, printing the final value.
fn run_file(file_path: &str) {
    let Some(bytecode) = compile_file(file_path) else {
        return;
    };

    let mut machine = VM::new(bytecode);
    if let Err(e) = machine.run() {
        println!("Executing bytecode failed: {}", e);
        return;
    }

    println!("{}", machine.last_popped());
}

/// Compile a script file and print the disassembled top-level instructions.
fn print_assembly(file_path: &str) {
    if let Some(bytecode) = compile_file(file_path) {
        print!("{}", opcode::disassemble(&bytecode.instructions));
    }
}

/// Run the interactive REPL. The symbol table, constant pool, and globals
/// array persist across inputs, so bindings from one line are visible on
/// the next.
fn run_repl() {
    const PROMPT: &str = ">> ";

    let mut symbols = SymbolTable::new();
    for (index, builtin) in builtins::BUILTINS.iter().enumerate() {
        symbols.define_builtin(index, builtin.name);
    }
    let mut constants: Vec<Value> = Vec::new();
    let mut globals = vec![Value::Null; GLOBALS_SIZE];

    println!("Toy VM REPL");

    loop {
        print!("{}", PROMPT);
        io::stdout().flush().expect("flushing stdout failed");

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                println!();
                return;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Read error: {}", e);
                return;
            }
        }

        let mut parser = Parser::new(Lexer::new(&line));
        let program = parser.parse_program();
        if !parser.errors().is_empty() {
            println!("parser errors:");
            for message in parser.errors() {
                println!("\t{}", message);
            }
            continue;
        }

        let mut compiler = Compiler::new_with_state(symbols, constants);
        if let Err(e) = compiler.compile(&program) {
            println!("Compilation failed: {}", e);
            (symbols, constants) = compiler.into_state();
            continue;
        }
        let bytecode = compiler.bytecode();
        (symbols, constants) = compiler.into_state();

        let mut machine = VM::with_globals(bytecode, globals);
        match machine.run() {
            Ok(()) => println!("{}", machine.last_popped()),
            Err(e) => println!("Executing bytecode failed: {}", e),
        }
        globals = machine.into_globals();
    }
}
