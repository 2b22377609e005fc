use std::{cell::RefCell, rc::Rc};

pub mod analyzer;
pub mod ast;
pub mod environment;
pub mod interpreter;
pub mod parser;
pub mod tokenizer;
pub mod types;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Tokenize(#[from] tokenizer::TokenizeError),
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Analyze(#[from] analyzer::AnalyzeError),
    #[error(transparent)]
    Execution(#[from] interpreter::ExecutionError),
}

/// Lexes, parses and analyzes `source`, returning the annotated AST.
pub fn check(source: &str) -> Result<ast::Source, Error> {
    let tokens = tokenizer::tokens(source)?;
    let mut source = parser::source(&tokens)?;
    analyzer::analyze(&mut source)?;
    Ok(source)
}

/// Runs the whole pipeline, writing `print` output to `stdout` and returning
/// the result of `main`.
pub fn run(source: &str, stdout: Rc<RefCell<dyn std::io::Write>>) -> Result<i32, Error> {
    let source = check(source)?;
    let mut interpreter = interpreter::Interpreter::new(stdout);
    Ok(interpreter.interpret(&source)?)
}
