#![doc = include_str!("../../../README.md")]

mod arith;
mod ast;
mod ast_walk;
mod builtins;
mod call;
mod channel;
mod env;
mod error;
mod expr;
mod for_range;
mod imports;
mod io;
mod lexer;
mod literal;
mod macroexpand;
mod options;
mod parser;
mod printer;
mod quasiquote;
mod repl;
mod stmt;
mod switch;
mod switch_type;
mod token;
mod types;
mod value;

pub use crate::{
    ast::{Expr, Node, Stmt},
    ast_walk::unwrap_trivial,
    env::{Env, Shared},
    error::{ErrorKind, EvalError, ReplError, Unwind},
    io::{CollectSink, NullSink, OutputSink, StdSink},
    lexer::{Lexeme, Lexer},
    options::Options,
    parser::{make_quote, parse},
    repl::{ReplCommand, ReplSession},
    token::{Pos, Token},
    types::{Kind, Type, TypeDesc},
    value::{value_to_type, Value, Values},
};
