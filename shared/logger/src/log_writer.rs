//! Writer thread and the sinks it drains into.

use crate::error::Result;
use crate::log_message::LogMessage;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

/// Where formatted records end up.
pub(crate) enum LogSink {
    /// Append-mode log file.
    File(File),
    /// Shared buffer read back through [`LogCapture`](crate::LogCapture).
    Memory(Arc<Mutex<Vec<String>>>),
}

impl LogSink {
    pub fn file(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(LogSink::File(file))
    }

    fn write_line(&mut self, line: &str) {
        match self {
            LogSink::File(file) => {
                if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
                    eprintln!("Error writing log: {}", e);
                }
            }
            LogSink::Memory(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line.to_string());
                }
            }
        }
    }

    /// Drains the channel until every sender is dropped.
    pub fn run(mut self, receiver: Receiver<LogMessage>) {
        for message in receiver {
            self.write_line(&message.format());
        }
    }
}

/// Spawns the dedicated writer thread for `sink`.
pub(crate) fn spawn_writer_thread(sink: LogSink, receiver: Receiver<LogMessage>) {
    std::thread::spawn(move || sink.run(receiver));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_level::LogLevel;
    use std::fs;
    use std::sync::mpsc::channel;
    use tempfile::tempdir;

    #[test]
    fn test_file_sink_creates_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("sctp.log");

        assert!(LogSink::file(&log_path).is_ok());
        assert!(log_path.exists());
    }

    #[test]
    fn test_file_sink_appends_lines() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("sctp.log");

        let mut sink = LogSink::file(&log_path).unwrap();
        sink.write_line("first");
        sink.write_line("second");

        let content = fs::read_to_string(log_path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_memory_sink_run_until_disconnect() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = LogSink::Memory(Arc::clone(&lines));
        let (sender, receiver) = channel();

        sender
            .send(LogMessage::new(LogLevel::Info, None, "one".into()))
            .unwrap();
        drop(sender);
        sink.run(receiver);

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("INFO: one"));
    }
}
