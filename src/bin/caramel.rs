//! CLI runner for caramel scripts.
//!
//! Usage: caramel [options] [script.js]
//!
//! Options:
//!   -e <expr>   Evaluate <expr>, print its value, and exit
//!
//! With a file argument the file is evaluated and its completion value
//! printed. Without arguments, lines read from stdin are evaluated one
//! at a time. Logging is controlled through RUST_LOG.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use caramel::{Context, HostValue};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// CLI configuration
struct Config {
    script: Option<PathBuf>,
    expr: Option<String>,
}

fn parse_args() -> Result<Config, String> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("caramel", |s| s.as_str());

    let mut script: Option<PathBuf> = None;
    let mut expr: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        let Some(arg) = args.get(i) else {
            break;
        };
        if arg == "-e" || arg == "--eval" {
            i += 1;
            expr = Some(
                args.get(i)
                    .ok_or_else(|| "-e requires an expression".to_string())?
                    .clone(),
            );
        } else if arg.starts_with('-') {
            return Err(format!(
                "Unknown option: {} (usage: {} [-e <expr>] [script.js])",
                arg, program
            ));
        } else {
            script = Some(PathBuf::from(arg));
        }
        i += 1;
    }

    Ok(Config { script, expr })
}

fn run() -> Result<(), String> {
    let config = parse_args()?;
    let ctx = Context::new().map_err(|e| e.to_string())?;

    if let Some(expr) = config.expr {
        let value = ctx.eval(&expr).map_err(|e| e.to_string())?;
        print_value(&value);
        return Ok(());
    }

    if let Some(path) = config.script {
        let value = ctx.eval_file(&path).map_err(|e| e.to_string())?;
        print_value(&value);
        return Ok(());
    }

    repl(&ctx)
}

fn print_value(value: &HostValue) {
    if !matches!(value, HostValue::Null) {
        println!("{}", value);
    }
}

fn repl(ctx: &Context) -> Result<(), String> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush().map_err(|e| e.to_string())?;

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == ".exit" {
            return Ok(());
        }
        match ctx.eval(line) {
            Ok(value) => print_value(&value),
            Err(e) => eprintln!("{}", e),
        }
    }
}
