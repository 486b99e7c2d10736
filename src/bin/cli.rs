use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use micromouse::dsl::builtins::BUILTINS;
use micromouse::dsl::{self, bytecode, lexer, parser, typeck, vm};
use micromouse::error::AppError;
use micromouse::model::Maze;
use micromouse::paths;
use micromouse::settings::{self, RunSettings};
use micromouse::util::read_json;

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "micromouse-cli", about = "Compile and run maze-agent programs", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// Run settings file (defaults to micromouse.json in $MICROMOUSE_CONFIG_DIR or .)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Instruction budget override
    #[arg(long, global = true)]
    max_steps: Option<u64>,

    /// Log pipeline stages to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the token stream of a source file
    Tokens { source: PathBuf },
    /// Lex, parse and analyze a source file
    Check { source: PathBuf },
    /// Print the bytecode listing of a source file
    Compile { source: PathBuf },
    /// Compile a source file and run it in a maze
    Run {
        source: PathBuf,
        #[arg(long)]
        maze: PathBuf,
    },
    /// Run a bytecode listing in a maze
    Exec {
        listing: PathBuf,
        #[arg(long)]
        maze: PathBuf,
    },
    /// List the built-in functions with their signatures
    Builtins,
    /// Show the effective run settings
    Config {
        /// Write the effective settings back to the settings file
        #[arg(long)]
        save: bool,
    },
}

// ── Output formatting ────────────────────────────────────────────

/// Either a text rendering or a JSON value, chosen by `--json`.
struct Output {
    text: String,
    json: serde_json::Value,
}

impl Output {
    fn new(text: impl Into<String>, data: &impl Serialize) -> Self {
        Self {
            text: text.into(),
            json: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }
}

fn print_output(output: &Output, raw_json: bool) {
    if raw_json {
        println!("{}", serde_json::to_string_pretty(&output.json).unwrap_or_default());
    } else {
        print!("{}", output.text);
        if !output.text.is_empty() && !output.text.ends_with('\n') {
            println!();
        }
    }
}

#[derive(Serialize)]
struct TokenRow<'a> {
    kind: lexer::TokenKind,
    lexeme: &'a str,
    line: usize,
    column: usize,
}

#[derive(Serialize)]
struct BuiltinRow {
    name: &'static str,
    signature: String,
    category: &'static str,
    description: &'static str,
    available: bool,
}

// ── Commands ─────────────────────────────────────────────────────

fn read_source(path: &Path) -> Result<String, AppError> {
    Ok(std::fs::read_to_string(path)?)
}

fn settings_file(cli: &Cli) -> PathBuf {
    cli.settings
        .clone()
        .unwrap_or_else(|| paths::settings_path(&paths::default_config_dir()))
}

fn load_run_settings(cli: &Cli) -> Result<RunSettings, AppError> {
    let path = settings_file(cli);
    let mut run_settings = settings::load_settings(&path)?;
    if let Some(max_steps) = cli.max_steps {
        run_settings.max_steps = max_steps;
        run_settings.validate()?;
    }
    Ok(run_settings)
}

fn render_outcome(outcome: &vm::RunOutcome) -> String {
    let mut text = outcome.output.clone();
    for p in &outcome.trace {
        text.push_str(&format!("({}, {}) facing ({}, {})\n", p.x, p.y, p.dir_x, p.dir_y));
    }
    text.push_str(&format!(
        "steps: {}, moves: {}, completed: {}",
        outcome.steps,
        outcome.trace.len().saturating_sub(1),
        outcome.completed
    ));
    if let Some(v) = outcome.return_value {
        text.push_str(&format!(", returned: {v}"));
    }
    text
}

fn execute(cli: &Cli) -> Result<Output, AppError> {
    match &cli.command {
        Commands::Tokens { source } => {
            let src = read_source(source)?;
            let tokens = lexer::lex(&src)?;
            let rows: Vec<TokenRow<'_>> = tokens
                .iter()
                .map(|t| TokenRow {
                    kind: t.token.kind(),
                    lexeme: t.lexeme(),
                    line: t.loc.line,
                    column: t.loc.column,
                })
                .collect();
            let text: String = rows
                .iter()
                .map(|r| format!("{}:{}\t{:?}\t{}\n", r.line, r.column, r.kind, r.lexeme))
                .collect();
            Ok(Output::new(text, &rows))
        }
        Commands::Check { source } => {
            let src = read_source(source)?;
            let program = parser::parse(lexer::lex(&src)?)?;
            typeck::analyze(&program)?;
            let summary = serde_json::json!({ "ok": true, "declarations": program.body.len() });
            Ok(Output::new(format!("{}: OK", source.display()), &summary))
        }
        Commands::Compile { source } => {
            let code = dsl::compile_source(&read_source(source)?)?;
            Ok(Output::new(bytecode::to_listing(&code), &code))
        }
        Commands::Run { source, maze } => {
            let src = read_source(source)?;
            let maze: Maze = read_json(maze)?;
            let outcome = dsl::run_source(&src, maze, &load_run_settings(cli)?)?;
            Ok(Output::new(render_outcome(&outcome), &outcome))
        }
        Commands::Exec { listing, maze } => {
            let code = bytecode::parse_listing(&read_source(listing)?)?;
            let maze: Maze = read_json(maze)?;
            let outcome = vm::run(&code, maze, &load_run_settings(cli)?)?;
            Ok(Output::new(render_outcome(&outcome), &outcome))
        }
        Commands::Builtins => {
            let rows: Vec<BuiltinRow> = BUILTINS
                .iter()
                .map(|b| BuiltinRow {
                    name: b.name,
                    signature: b.signature(),
                    category: b.category,
                    description: b.description,
                    available: b.intrinsic.is_some(),
                })
                .collect();
            let text: String = rows
                .iter()
                .map(|r| {
                    let note = if r.available { "" } else { " [analysis only]" };
                    format!("{:<10} {:<30} {}{note}\n", r.category, r.signature, r.description)
                })
                .collect();
            Ok(Output::new(text, &rows))
        }
        Commands::Config { save } => {
            let run_settings = load_run_settings(cli)?;
            let mut text = serde_json::to_string_pretty(&run_settings).unwrap_or_default();
            if *save {
                let path = settings_file(cli);
                settings::save_settings(&path, &run_settings)?;
                tracing::info!(path = %path.display(), "settings saved");
                text.push_str(&format!("\nsaved to {}", path.display()));
            }
            Ok(Output::new(text, &run_settings))
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "micromouse=debug" } else { "micromouse=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(&cli) {
        Ok(output) => print_output(&output, cli.json),
        Err(e) => {
            if cli.json {
                eprintln!("{}", serde_json::to_string_pretty(&e).unwrap_or_default());
            } else {
                eprintln!("{e}");
            }
            process::exit(1);
        }
    }
}
