//! Error and control-flow signalling for the evaluator.
//!
//! Statement and expression evaluation return `Flow<T>`: the `Err`
//! channel carries both non-local control transfers (`break`, `continue`,
//! `return`, `goto`, interpreted panics) and evaluator faults. Each
//! control construct intercepts the variants addressed to it and lets the
//! rest travel outward; faults cross every interpreted frame and are
//! mapped to a diagnostic at the REPL top level.

use std::fmt;
use std::rc::Rc;

use strum::Display;

use crate::token::Pos;
use crate::value::{Value, Values};

/// The category of an evaluator fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    /// Parser failures; abort the current REPL turn.
    Syntax,
    /// Undefined identifier, missing package symbol, missing field/method.
    Resolution,
    /// Non-assignable conversion, wrong arity, unsupported operand kind.
    Type,
    /// Index out of range, nil dereference, division by zero, failed
    /// assertion.
    Domain,
    /// Macro-expansion failures.
    Macro,
    /// Failures escaping from imported host functions.
    Host,
}

/// An evaluator fault: category, message, and best-known position.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub kind: ErrorKind,
    pub msg: String,
    pub pos: Pos,
}

impl EvalError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            pos: Pos::NONE,
        }
    }

    pub fn at(mut self, pos: Pos) -> Self {
        if self.pos.is_none() {
            self.pos = pos;
        }
        self
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, msg)
    }

    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resolution, msg)
    }

    pub fn type_(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, msg)
    }

    pub fn domain(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Domain, msg)
    }

    pub fn macro_(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Macro, msg)
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Host, msg)
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pos.is_none() {
            write!(f, "{} error: {}", self.kind, self.msg)
        } else {
            write!(f, "{} error at {}: {}", self.kind, self.pos, self.msg)
        }
    }
}

impl std::error::Error for EvalError {}

/// A non-local exit travelling outward through evaluation.
#[derive(Debug, Clone)]
pub enum Unwind {
    Break(Option<Rc<str>>),
    Continue(Option<Rc<str>>),
    Return(Values),
    Goto(Rc<str>),
    /// An interpreted `panic(v)`: recoverable by interpreted `recover()`
    /// inside a deferred call of the panicking frame.
    Panic(Value),
    /// An evaluator fault: crosses all interpreted frames to the REPL.
    Fault(EvalError),
}

impl Unwind {
    /// Human-readable description of a signal that escaped the construct
    /// that should have consumed it.
    pub fn escape_fault(self) -> EvalError {
        match self {
            Self::Break(label) => EvalError::domain(format!(
                "break{} outside for/switch/select",
                label.map(|l| format!(" {l}")).unwrap_or_default()
            )),
            Self::Continue(label) => EvalError::domain(format!(
                "continue{} outside for",
                label.map(|l| format!(" {l}")).unwrap_or_default()
            )),
            Self::Return(_) => EvalError::domain("return outside function"),
            Self::Goto(label) => EvalError::resolution(format!("label {label} not defined")),
            Self::Panic(value) => EvalError::domain(format!("panic: {value}")),
            Self::Fault(err) => err,
        }
    }
}

impl From<EvalError> for Unwind {
    fn from(err: EvalError) -> Self {
        Self::Fault(err)
    }
}

/// Evaluation result: a value or an outward-travelling signal.
pub type Flow<T> = Result<T, Unwind>;

/// A diagnostic surfaced to the REPL user for one failed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplError {
    pub message: String,
}

impl ReplError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ReplError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ReplError {}

impl From<EvalError> for ReplError {
    fn from(err: EvalError) -> Self {
        Self::new(err.to_string())
    }
}
