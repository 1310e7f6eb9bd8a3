//! Persistent REPL session support.
//!
//! `ReplSession` keeps interpreter state across `execute()` calls so
//! interactive snippets share bindings, types, macros and imports. Each
//! call runs one turn of the pipeline: *parse → macro-expand fixed point
//! → eval*, against the live environment.

use std::rc::Rc;
use std::time::Instant;

use crate::ast::Node;
use crate::env::{CallFrame, Env, Shared};
use crate::error::{ReplError, Unwind};
use crate::io::{OutputSink, StdSink};
use crate::options::Options;
use crate::parser::parse;
use crate::stmt::void;
use crate::value::{ExprOut, Value};

/// Outcome of a `:`-prefixed session command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    /// The command was handled; keep reading input.
    Handled,
    /// The user asked to leave the session.
    Quit,
}

pub struct ReplSession {
    root: Rc<Env>,
    /// Global line number of the next turn's first line; keeps positions
    /// (and `iota`) distinct across turns.
    next_line: u32,
    /// Toplevel declaration/statement sources accumulated when the
    /// `Declarations`/`Statements` options are set.
    collected: Vec<String>,
}

impl Default for ReplSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplSession {
    /// A session printing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(StdSink))
    }

    /// A session writing `print` output and diagnostics to `output`.
    pub fn with_output(output: Box<dyn OutputSink>) -> Self {
        let shared = Shared::new(output);
        let root = Env::new_root(shared, "repl");
        crate::builtins::install(&root);
        Self {
            root,
            next_line: 1,
            collected: vec![],
        }
    }

    pub fn options(&self) -> Options {
        self.root.shared.options.get()
    }

    /// Toggles option flags by (a unique prefix of) name.
    pub fn toggle_options(&self, names: &str) {
        self.root.shared.toggle_options(Options::parse_toggle(names));
    }

    /// The root environment frame (for host embedding and tests).
    pub fn root(&self) -> &Rc<Env> {
        &self.root
    }

    /// Declaration/statement sources accumulated by the
    /// `Declarations`/`Statements` options.
    pub fn collected(&self) -> &[String] {
        &self.collected
    }

    /// Recognizes and runs a `:`-prefixed session command.
    pub fn try_command(&mut self, line: &str) -> Option<ReplCommand> {
        let line = line.trim();
        if !line.starts_with(':') {
            return None;
        }
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        match word {
            ":quit" | ":q" => Some(ReplCommand::Quit),
            ":help" | ":h" => {
                let mut flags = String::new();
                for name in Options::names() {
                    flags.push(' ');
                    flags.push_str(name);
                }
                self.root.shared.write_line(":help                 show this help");
                self.root.shared.write_line(":options <names...>   toggle option flags by name or unique prefix");
                self.root.shared.write_line(":quit                 leave the session");
                self.root.shared.write_line(&format!("option flags:{flags}"));
                Some(ReplCommand::Handled)
            }
            _ if ":options".starts_with(word) && word.len() >= 2 => {
                self.toggle_options(rest);
                self.root
                    .shared
                    .write_line(&format!("// options: {}", self.options()));
                Some(ReplCommand::Handled)
            }
            other => {
                self.root.shared.write_line(&format!("// unknown command {other}, try :help"));
                Some(ReplCommand::Handled)
            }
        }
    }

    /// Runs one REPL turn and returns its final value.
    ///
    /// On error the diagnostic is returned, any interpreted call frames
    /// pushed by the failed turn are discarded, and the environment is
    /// back at frame 0; toplevel bindings made before the failure
    /// survive.
    pub fn execute(&mut self, src: &str) -> Result<Value, ReplError> {
        let started = Instant::now();
        let first_line = self.next_line;
        self.next_line += src.lines().count().max(1) as u32;

        let nodes = parse(src, first_line).map_err(|e| {
            self.root.shared.call_stack.borrow_mut().frames.clear();
            ReplError::from(e)
        })?;
        if self.options().contains(Options::SHOW_PARSE) {
            for node in &nodes {
                self.root.shared.write_line(&format!("// parse: {node}"));
            }
        }
        self.collect_sources(&nodes);

        // a synthetic frame gives toplevel defer/recover a home
        let frame_idx = {
            let mut stack = self.root.shared.call_stack.borrow_mut();
            stack.frames.push(CallFrame::named("toplevel"));
            stack.frames.len() - 1
        };
        let mut completed = None;
        let mut escape = None;
        match self.run_turn(nodes) {
            Ok(out) => completed = Some(out),
            Err(Unwind::Panic(value)) => {
                let mut stack = self.root.shared.call_stack.borrow_mut();
                let frame = &mut stack.frames[frame_idx];
                frame.panic = Some(value);
                frame.panicking = true;
            }
            Err(other) => escape = Some(other),
        }
        // deferred calls run on every exit path, and may recover a panic
        let defer_escape = crate::call::run_frame_defers(&self.root, frame_idx).err();
        let shared = &self.root.shared;
        let leftover_panic = {
            let mut stack = shared.call_stack.borrow_mut();
            let panic = stack.frames.last_mut().and_then(|frame| {
                if frame.panicking {
                    frame.panic.take()
                } else {
                    None
                }
            });
            stack.frames.clear();
            panic
        };

        let result = if let Some(unwind) = escape {
            Err(unwind_to_error(unwind))
        } else if let Some(unwind) = defer_escape {
            Err(unwind_to_error(unwind))
        } else if let Some(value) = leftover_panic {
            Err(ReplError::new(format!("panic: {value}")))
        } else {
            Ok(completed.map_or(Value::Void, |(value, _)| value))
        };
        if let Ok(value) = &result {
            if self.options().contains(Options::SHOW_EVAL) && !value.is_void() {
                shared.write_line(&format!("// eval: {value}"));
            }
        }
        if self.options().contains(Options::SHOW_TIME) {
            shared.write_line(&format!("// time: {:?}", started.elapsed()));
        }
        result
    }

    /// Evaluates the turn's toplevel nodes in order. Leading
    /// declarations are evaluated first (so macros defined in this turn
    /// are visible), then the remaining nodes are expanded as one
    /// statement sequence, which is what lets a macro consume its
    /// following siblings.
    fn run_turn(&self, nodes: Vec<Node>) -> Result<ExprOut, Unwind> {
        let mut last = void();
        let mut i = 0;
        while i < nodes.len() {
            if matches!(nodes[i], Node::Decl(_) | Node::File(_)) {
                let (node, _) = self.root.macro_expand_codewalk(nodes[i].clone())?;
                last = self.root.eval_node(&node)?;
                i += 1;
                continue;
            }
            // the rest of the turn expands as one sequence, even when it
            // is a single node: a lone macro name is still a macro call
            let rest = Node::NodeSlice(nodes[i..].to_vec());
            let (expanded, any) = self.root.macro_expand_codewalk(rest)?;
            if self.options().contains(Options::SHOW_MACRO_EXPAND) && any {
                self.root.shared.write_line(&format!("// macroexpand: {expanded}"));
            }
            last = self.root.eval_node(&expanded)?;
            break;
        }
        Ok(last)
    }

    fn collect_sources(&mut self, nodes: &[Node]) {
        let opts = self.options();
        for node in nodes {
            let is_decl = matches!(node, Node::Decl(_));
            if is_decl && opts.contains(Options::COLLECT_DECLARATIONS) {
                self.collected.push(node.to_string());
            } else if !is_decl && opts.contains(Options::COLLECT_STATEMENTS) {
                self.collected.push(node.to_string());
            }
        }
    }
}

fn unwind_to_error(unwind: Unwind) -> ReplError {
    match unwind {
        Unwind::Panic(value) => ReplError::new(format!("panic: {value}")),
        Unwind::Fault(e) => ReplError::from(e),
        other => ReplError::from(other.escape_fault()),
    }
}
