//! # blockpress-script
//!
//! A small sandboxed interpreter for the executable code blocks of an
//! article. It understands a practical JavaScript subset: declarations,
//! control flow, closures, arrays, objects, template literals, exceptions
//! and the everyday parts of `Math`, `JSON`, strings and arrays.
//!
//! Scripts have no capabilities. There is no DOM, no timers, no I/O; names
//! like `document` or `fetch` are simply undefined. Every evaluation gets
//! its own [`Console`] sink and its own globals, and is bounded by
//! [`Limits`].
//!
//! ```
//! use blockpress_script::{Limits, Outcome, evaluate};
//!
//! let report = evaluate("console.log('hi'); 6 * 7", &Limits::default());
//! assert_eq!(report.outcome, Outcome::Completed);
//! assert_eq!(report.entries[0].message, "hi");
//! assert_eq!(report.value.as_deref(), Some("42"));
//! ```

pub mod ast;
pub mod builtins;
pub mod console;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod value;

pub use console::{Console, Level, LogEntry};
pub use error::ScriptError;
pub use interp::{Limits, MAX_CALL_DEPTH};

use interp::{Interpreter, Interrupt};
use value::Value;

/// Stack for the evaluation thread. Deeply recursive scripts need far more
/// than a default test or UI thread provides.
const EVAL_STACK_SIZE: usize = 64 * 1024 * 1024;

/// How an evaluation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// A syntax error, an uncaught throw or an exceeded limit. The cause is
    /// the last error entry.
    Failed,
}

/// Everything one run of a script produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub entries: Vec<LogEntry>,
    /// Inspected completion value; `None` when it was `undefined`.
    pub value: Option<String>,
    pub outcome: Outcome,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Completed
    }

    /// The error entry describing why the run failed.
    pub fn failure(&self) -> Option<&LogEntry> {
        match self.outcome {
            Outcome::Completed => None,
            Outcome::Failed => self.entries.iter().rev().find(|e| e.level == Level::Error),
        }
    }
}

/// Parse and run `source`, capturing console output and the completion value.
///
/// Never panics and never returns an error: every failure becomes an
/// [`Outcome::Failed`] report with an error entry. The work happens on a
/// scoped thread with a large stack, joined before this returns.
pub fn evaluate(source: &str, limits: &Limits) -> ExecutionReport {
    let spawned = std::thread::scope(|scope| {
        let handle = std::thread::Builder::new()
            .name("blockpress-script".to_string())
            .stack_size(EVAL_STACK_SIZE)
            .spawn_scoped(scope, || evaluate_on_current_thread(source, limits));
        match handle {
            Ok(handle) => Some(handle.join()),
            Err(err) => {
                log::warn!("could not spawn evaluation thread, running inline: {err}");
                None
            }
        }
    });

    match spawned {
        Some(Ok(report)) => report,
        Some(Err(_)) => {
            log::error!("script evaluation panicked");
            ExecutionReport {
                entries: vec![LogEntry::new(Level::Error, "InternalError: evaluation aborted")],
                value: None,
                outcome: Outcome::Failed,
            }
        }
        None => evaluate_on_current_thread(source, limits),
    }
}

fn evaluate_on_current_thread(source: &str, limits: &Limits) -> ExecutionReport {
    let mut console = Console::new(limits.max_log_entries);

    let result = match parser::parse(source) {
        Ok(program) => Interpreter::new(&mut console, limits).run(&program),
        Err(err) => Err(Interrupt::Abort(err)),
    };

    let (value, outcome) = match result {
        Ok(Value::Undefined) => (None, Outcome::Completed),
        Ok(value) => {
            let shown = value.inspect();
            value::release(value);
            (Some(shown), Outcome::Completed)
        }
        Err(interrupt) => {
            console.report_failure(failure_message(source, interrupt));
            (None, Outcome::Failed)
        }
    };

    let entries = console.finish();
    log::debug!(
        "evaluated {} bytes of script: {:?}, {} console entries",
        source.len(),
        outcome,
        entries.len()
    );
    ExecutionReport {
        entries,
        value,
        outcome,
    }
}

fn failure_message(source: &str, interrupt: Interrupt) -> String {
    match interrupt {
        Interrupt::Throw(Value::Object(obj)) if obj.borrow().error.is_some() => {
            value::error_summary(&obj.borrow())
        }
        Interrupt::Throw(other) => format!("Uncaught {}", other.inspect()),
        Interrupt::Abort(err @ ScriptError::Syntax { offset, .. }) => {
            let line = source[..offset.min(source.len())].matches('\n').count() + 1;
            format!("{err} (line {line})")
        }
        Interrupt::Abort(err) => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn undefined_completion_has_no_value() {
        let report = evaluate("let x = 1", &Limits::default());
        assert_eq!(report.value, None);
        assert!(report.is_success());
    }

    #[test]
    fn thrown_primitives_are_reported_as_uncaught() {
        let report = evaluate("throw 'oops'", &Limits::default());
        assert_eq!(report.failure().map(|e| e.message.as_str()), Some("Uncaught \"oops\""));
    }

    #[test]
    fn syntax_errors_carry_a_line_number() {
        let report = evaluate("let a = 1\nlet = 2", &Limits::default());
        assert_eq!(
            report.failure().map(|e| e.message.as_str()),
            Some("SyntaxError: Unexpected token '=' (line 2)")
        );
    }
}
