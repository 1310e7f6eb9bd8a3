use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::{env, fs};

use quasigo::{Options, ReplCommand, ReplSession};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut session = ReplSession::new();

    if !args.is_empty() {
        for path in &args {
            let code = match fs::read_to_string(path) {
                Ok(code) => code,
                Err(err) => {
                    eprintln!("error reading {path}: {err}");
                    return ExitCode::FAILURE;
                }
            };
            if let Err(err) = session.execute(&code) {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    // interactive: trap evaluator panics and show a prompt
    session.toggle_options("TrapPanic Prompt");
    let stdin = io::stdin();
    let mut pending = String::new();
    loop {
        if session.options().contains(Options::SHOW_PROMPT) {
            let prompt = if pending.is_empty() { "> " } else { ". " };
            print!("{prompt}");
            let _ = io::stdout().flush();
        }
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS,
            Ok(_) => {}
            Err(err) => {
                eprintln!("error reading input: {err}");
                return ExitCode::FAILURE;
            }
        }
        if pending.is_empty() {
            match session.try_command(&line) {
                Some(ReplCommand::Quit) => return ExitCode::SUCCESS,
                Some(ReplCommand::Handled) => continue,
                None => {}
            }
        }
        pending.push_str(&line);
        if !balanced(&pending) {
            continue;
        }
        let turn = std::mem::take(&mut pending);
        if turn.trim().is_empty() {
            continue;
        }
        match session.execute(&turn) {
            Ok(value) => {
                if !value.is_void() {
                    println!("{value}");
                }
            }
            Err(err) => {
                eprintln!("{err}");
                if !session.options().contains(Options::TRAP_PANIC) {
                    return ExitCode::FAILURE;
                }
            }
        }
    }
}

/// Whether all braces, brackets and parens are closed (strings and
/// comments excluded), so multi-line inputs keep reading.
fn balanced(src: &str) -> bool {
    let mut depth: i64 = 0;
    let mut chars = src.chars().peekable();
    let mut in_string: Option<char> = None;
    let mut in_line_comment = false;
    let mut prev = ' ';
    while let Some(c) = chars.next() {
        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
            }
            prev = c;
            continue;
        }
        if let Some(quote) = in_string {
            if c == '\\' && quote == '"' {
                chars.next();
            } else if c == quote {
                in_string = None;
            }
            prev = c;
            continue;
        }
        match c {
            // `~'` and `~\`` are quotation sigils, not string openers
            '"' | '`' | '\'' if prev != '~' => in_string = Some(c),
            '/' if chars.peek() == Some(&'/') => in_line_comment = true,
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            _ => {}
        }
        prev = c;
    }
    depth <= 0
}
