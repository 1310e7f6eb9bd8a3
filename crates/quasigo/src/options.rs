//! The session options flag-set.
//!
//! Flags are toggled by name (XOR), with unique-prefix matching so that
//! `:o Mac` toggles `MacroExpand`. The `?`-prefixed names are diagnostic
//! traces.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Options: u32 {
        /// Recover evaluator panics at the REPL instead of propagating.
        const TRAP_PANIC = 1 << 0;
        const SHOW_PROMPT = 1 << 1;
        const SHOW_EVAL = 1 << 2;
        const SHOW_PARSE = 1 << 3;
        const SHOW_MACRO_EXPAND = 1 << 4;
        const SHOW_TIME = 1 << 5;
        const DEBUG_MACRO_EXPAND = 1 << 6;
        const DEBUG_QUASIQUOTE = 1 << 7;
        const DEBUG_CALL_STACK = 1 << 8;
        const DEBUG_PANIC_RECOVER = 1 << 9;
        /// Accumulate toplevel declarations across REPL turns.
        const COLLECT_DECLARATIONS = 1 << 10;
        /// Accumulate toplevel statements across REPL turns.
        const COLLECT_STATEMENTS = 1 << 11;
    }
}

const OPTION_NAMES: &[(Options, &str)] = &[
    (Options::TRAP_PANIC, "TrapPanic"),
    (Options::SHOW_PROMPT, "Prompt"),
    (Options::SHOW_EVAL, "Eval"),
    (Options::SHOW_PARSE, "Parse"),
    (Options::SHOW_MACRO_EXPAND, "MacroExpand"),
    (Options::SHOW_TIME, "Time"),
    (Options::DEBUG_MACRO_EXPAND, "?MacroExpand"),
    (Options::DEBUG_QUASIQUOTE, "?Quasiquote"),
    (Options::DEBUG_CALL_STACK, "?CallStack"),
    (Options::DEBUG_PANIC_RECOVER, "?PanicRecover"),
    (Options::COLLECT_DECLARATIONS, "Declarations"),
    (Options::COLLECT_STATEMENTS, "Statements"),
];

impl Options {
    /// Parses a whitespace-separated list of flag names into a toggle
    /// mask. Each name toggles (XOR) its flag; a name that is not an
    /// exact match toggles the flag it is a unique prefix of, and is
    /// ignored otherwise.
    pub fn parse_toggle(input: &str) -> Self {
        let mut toggle = Self::empty();
        for word in input.split_whitespace() {
            if let Some(&(flag, _)) = OPTION_NAMES.iter().find(|(_, name)| *name == word) {
                toggle ^= flag;
                continue;
            }
            let mut matches = OPTION_NAMES.iter().filter(|(_, name)| name.starts_with(word));
            if let (Some(&(flag, _)), None) = (matches.next(), matches.next()) {
                toggle ^= flag;
            }
        }
        toggle
    }

    /// All known flag names, in display order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        OPTION_NAMES.iter().map(|(_, name)| *name)
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in OPTION_NAMES {
            if self.contains(*flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_names_toggle() {
        let opts = Options::parse_toggle("TrapPanic Eval");
        assert_eq!(opts, Options::TRAP_PANIC | Options::SHOW_EVAL);
    }

    #[test]
    fn repeated_name_toggles_off() {
        let opts = Options::parse_toggle("Eval Eval");
        assert!(opts.is_empty());
    }

    #[test]
    fn unique_prefix_matches() {
        assert_eq!(Options::parse_toggle("Trap"), Options::TRAP_PANIC);
        assert_eq!(Options::parse_toggle("?Quasi"), Options::DEBUG_QUASIQUOTE);
    }

    #[test]
    fn ambiguous_prefix_is_ignored()  {
        // "P" could be Prompt or Parse
        assert!(Options::parse_toggle("P").is_empty());
    }

    #[test]
    fn display_lists_set_flags() {
        let opts = Options::TRAP_PANIC | Options::SHOW_PARSE;
        assert_eq!(opts.to_string(), "TrapPanic Parse");
    }
}
