use std::fmt;

/// The four diagnostic channels a script can write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Log,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Log => "log",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured line of diagnostic output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Output sink for a single evaluation.
///
/// The interpreter receives the sink by `&mut` and writes every `console.*`
/// call into it; nothing process-wide is touched. Once `capacity` entries
/// are held, further output is counted but not kept.
#[derive(Debug)]
pub struct Console {
    entries: Vec<LogEntry>,
    capacity: usize,
    dropped: usize,
}

impl Console {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Record script output, subject to the capacity bound.
    pub fn record(&mut self, level: Level, message: impl Into<String>) {
        if self.entries.len() < self.capacity {
            self.entries.push(LogEntry::new(level, message));
        } else {
            self.dropped += 1;
        }
    }

    /// Record the failure that ended the evaluation. Never dropped.
    pub fn report_failure(&mut self, message: impl Into<String>) {
        self.entries.push(LogEntry::new(Level::Error, message));
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn finish(mut self) -> Vec<LogEntry> {
        if self.dropped > 0 {
            self.entries.push(LogEntry::new(
                Level::Warn,
                format!("{} further console entries omitted", self.dropped),
            ));
        }
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_until_capacity_then_counts() {
        let mut console = Console::new(2);
        console.record(Level::Log, "a");
        console.record(Level::Info, "b");
        console.record(Level::Log, "c");
        console.record(Level::Log, "d");

        assert_eq!(
            console.finish(),
            vec![
                LogEntry::new(Level::Log, "a"),
                LogEntry::new(Level::Info, "b"),
                LogEntry::new(Level::Warn, "2 further console entries omitted"),
            ]
        );
    }

    #[test]
    fn failure_is_kept_past_capacity() {
        let mut console = Console::new(0);
        console.record(Level::Log, "dropped");
        console.report_failure("Error: boom");

        let entries = console.finish();
        assert_eq!(entries[0], LogEntry::new(Level::Error, "Error: boom"));
    }
}
