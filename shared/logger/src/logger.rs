//! Thread-safe, non-blocking logger.
//!
//! Records are formatted on the calling thread and handed over a channel to
//! one writer thread per sink. Component loggers created with
//! [`Logger::for_component`] share the parent's channel.

use crate::error::Result;
use crate::log_level::LogLevel;
use crate::log_message::LogMessage;
use crate::log_writer::{LogSink, spawn_writer_thread};
use std::path::PathBuf;
use std::sync::mpsc::{Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Cloneable handle to a log writer thread.
///
/// # Examples
///
/// ```no_run
/// use logging::{LogLevel, Logger};
///
/// let logger = Logger::new("sctp.log".into(), LogLevel::Info).unwrap();
/// let sctp = logger.for_component("SCTP");
/// sctp.info("association established");
/// ```
#[derive(Clone)]
pub struct Logger {
    sender: Sender<LogMessage>,
    level: LogLevel,
    component: Option<String>,
    console_output: bool,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("component", &self.component)
            .finish()
    }
}

impl Logger {
    /// File-backed logger; the file is created if missing and appended to.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(log_path: PathBuf, level: LogLevel) -> Result<Self> {
        Self::with_component(log_path, level, None, false)
    }

    /// File-backed logger tagged with `component`, optionally echoing to stdout.
    pub fn with_component(
        log_path: PathBuf,
        level: LogLevel,
        component: Option<String>,
        console_output: bool,
    ) -> Result<Self> {
        let sink = LogSink::file(&log_path)?;
        let (sender, receiver) = channel();
        spawn_writer_thread(sink, receiver);
        Ok(Logger {
            sender,
            level,
            component,
            console_output,
        })
    }

    /// Logger whose records are kept in memory and readable through the
    /// returned [`LogCapture`].
    pub fn in_memory(level: LogLevel) -> (Self, LogCapture) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let (sender, receiver) = channel();
        spawn_writer_thread(LogSink::Memory(Arc::clone(&lines)), receiver);
        let logger = Logger {
            sender,
            level,
            component: None,
            console_output: false,
        };
        (logger, LogCapture { lines })
    }

    /// Same sink and level, different component tag.
    pub fn for_component(&self, component: &str) -> Self {
        Logger {
            sender: self.sender.clone(),
            level: self.level,
            component: Some(component.to_string()),
            console_output: self.console_output,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// True when a record at `level` would be kept. Lets callers skip
    /// building expensive messages.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    fn log(&self, level: LogLevel, message: &str) {
        if !self.enabled(level) {
            return;
        }
        let msg = LogMessage::new(level, self.component.clone(), message.to_string());
        if self.console_output {
            println!("{}", msg.format());
        }
        // A dropped writer only loses records; callers never fail on logging.
        let _ = self.sender.send(msg);
    }
}

/// Read side of an in-memory logger.
#[derive(Clone, Debug)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    /// Snapshot of the records written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Polls until a record containing `needle` shows up or `timeout` passes.
    pub fn wait_for(&self, needle: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.lines().iter().any(|line| line.contains(needle)) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}
