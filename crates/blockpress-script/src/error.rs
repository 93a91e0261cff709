use std::time::Duration;

/// Failures that stop a script before or outside normal control flow.
///
/// Values thrown by the script itself are not `ScriptError`s: they travel as
/// script values and can be caught by `try`. These variants cannot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("SyntaxError: {message}")]
    Syntax { message: String, offset: usize },

    #[error("RangeError: execution exceeded the step limit of {0}")]
    StepLimit(u64),

    #[error("RangeError: Maximum call stack size exceeded (limit {0})")]
    CallDepth(usize),

    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("RangeError: execution allocated more than {0} bytes")]
    MemoryLimit(usize),
}

impl ScriptError {
    pub fn syntax(message: impl Into<String>, offset: usize) -> Self {
        ScriptError::Syntax {
            message: message.into(),
            offset,
        }
    }
}
