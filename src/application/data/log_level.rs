use clap::ValueEnum;

/// Verbosity selected on the command line. `Trace` adds per-event chatter
/// from the watcher and the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Option<tracing::Level> {
        let level = match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Silent => return None,
        };
        Some(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_disables_tracing() {
        assert_eq!(LogLevel::Silent.to_tracing_level(), None);
    }

    #[test]
    fn default_level_is_info() {
        assert_eq!(LogLevel::default().to_tracing_level(), Some(tracing::Level::INFO));
    }
}
