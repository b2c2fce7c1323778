//! The interactive console.

use std::io::{BufRead, Write};

use kandy_eval::{value_repr, Evaluator, Value};

const PROMPT: &str = "Kandy >> ";
const SENTINEL: &str = "$end";

/// Run the prompt loop until `$end` or end of input.
pub fn run(ev: &mut Evaluator) {
    println!("\nKandyConsole\nUse {SENTINEL} to exit.\n");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{PROMPT}");
        let _ = std::io::stdout().flush();

        let Some(Ok(line)) = lines.next() else {
            break;
        };
        let program = line.trim();
        if program == SENTINEL {
            break;
        }
        if program.is_empty() {
            continue;
        }

        match ev.repl_step(program) {
            Ok(Value::None) => {}
            Ok(result) => println!("Result>> {}", value_repr(&result)),
            Err(err) => println!("Error >> {err}"),
        }
    }
    println!();
}
