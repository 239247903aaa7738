//! A single log record.

use crate::log_level::LogLevel;
use chrono::Local;

#[derive(Debug, Clone)]
pub(crate) struct LogMessage {
    pub timestamp: String,
    pub level: LogLevel,
    pub component: Option<String>,
    pub message: String,
}

impl LogMessage {
    pub fn new(level: LogLevel, component: Option<String>, message: String) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            level,
            component,
            message,
        }
    }

    /// `[timestamp] LEVEL [component]: message` without the trailing newline.
    pub fn format(&self) -> String {
        match self.component {
            Some(ref component) => format!(
                "[{}] {} [{}]: {}",
                self.timestamp, self.level, component, self.message
            ),
            None => format!("[{}] {}: {}", self.timestamp, self.level, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_with_component() {
        let msg = LogMessage::new(
            LogLevel::Warn,
            Some("SCTP".to_string()),
            "no route".to_string(),
        );
        let line = msg.format();

        assert!(line.contains("WARN [SCTP]: no route"));
        assert!(!line.ends_with('\n'));
    }

    #[test]
    fn test_format_without_component() {
        let msg = LogMessage::new(LogLevel::Info, None, "ready".to_string());
        assert!(msg.format().contains("INFO: ready"));
    }

    #[test]
    fn test_timestamp_format() {
        let msg = LogMessage::new(LogLevel::Info, None, "x".to_string());
        // YYYY-MM-DD HH:MM:SS.mmm
        assert_eq!(msg.timestamp.len(), 23);
        assert_eq!(&msg.timestamp[4..5], "-");
        assert_eq!(&msg.timestamp[19..20], ".");
    }
}
