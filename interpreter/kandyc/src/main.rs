//! KandyScript CLI.
//!
//! - No arguments: interactive console.
//! - One argument: run the script and print a non-None final value.

mod repl;
mod tracing_setup;

use std::path::Path;

use kandy_eval::{value_repr, Evaluator, ExcClass, Value};

fn main() {
    tracing_setup::init();

    let args: Vec<String> = std::env::args().collect();
    match args.len() {
        1 => {
            let mut ev = Evaluator::new();
            repl::run(&mut ev);
        }
        2 => {
            run_file(&args[1]);
        }
        _ => {
            print_usage();
            std::process::exit(2);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: kandy [script.ks]");
    eprintln!();
    eprintln!("With no arguments, kandy opens the interactive console.");
}

fn run_file(path: &str) {
    let path = Path::new(path);
    let source = std::fs::read_to_string(path).unwrap_or_default();

    let mut ev = Evaluator::new();
    match ev.interpret_file(path) {
        Ok(Value::None) => {}
        Ok(result) => println!("{}", value_repr(&result)),
        Err(err) => {
            // Lexer/parser errors get the source line with a caret under
            // the offending column.
            if matches!(
                err.class,
                ExcClass::LexerError | ExcClass::ParserError | ExcClass::SyntaxError
            ) {
                if let Some(pos) = err.pos {
                    let report = kandy_diagnostic::render_report(
                        path.to_str(),
                        &source,
                        pos,
                        &err.to_string(),
                    );
                    eprintln!("{report}");
                    std::process::exit(1);
                }
            }
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
