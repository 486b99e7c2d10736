pub mod ast;
#[allow(clippy::module_name_repetitions)]
pub mod error;
#[allow(clippy::indexing_slicing)]
pub mod lexer;
#[allow(clippy::wildcard_imports)]
pub mod parser;
pub mod builtins;
#[allow(clippy::wildcard_imports)]
pub mod typeck;
pub mod bytecode;
#[allow(clippy::wildcard_imports)]
pub mod compiler;
pub mod vm;

use bytecode::Instruction;
use error::PipelineError;
use vm::RunOutcome;

use crate::model::Maze;
use crate::settings::RunSettings;

/// Compile maze-agent source into a bytecode listing.
///
/// source → lex → parse → analyze → compile. The first failing stage wins.
#[tracing::instrument(skip_all, fields(len = source.len()))]
pub fn compile_source(source: &str) -> Result<Vec<Instruction>, PipelineError> {
    let tokens = lexer::lex(source)?;
    let program = parser::parse(tokens)?;
    typeck::analyze(&program)?;
    compiler::compile(&program)
}

/// Compile `source` and run it against `maze`.
#[tracing::instrument(skip_all)]
pub fn run_source(source: &str, maze: Maze, settings: &RunSettings) -> Result<RunOutcome, PipelineError> {
    let code = compile_source(source)?;
    vm::run(&code, maze, settings)
}
