//! Notification side channel for non-fatal stage failures.
//!
//! In lenient mode a failing stage does not stop the pipeline; the failure is
//! handed to a [`Notifier`] instead so the developer still sees it.

use std::io::Write;
use std::sync::Mutex;

/// Format the message sent for a stage failure.
pub fn failure_message(stage: &str, error: &dyn std::fmt::Display) -> String {
    format!(
        "An error occurred while compiling {}.\nLook in the console for details.\n{}",
        stage, error
    )
}

/// Receives failure notifications.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    fn notify(&self, message: &str);
}

/// A notifier that discards everything.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str) {}
}

/// Writes notifications to the console, prefixed with a timestamp.
pub struct ConsoleNotifier {
    use_colors: bool,
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleNotifier").field("use_colors", &self.use_colors).finish()
    }
}

impl ConsoleNotifier {
    /// Create a notifier writing to stderr.
    pub fn new() -> Self {
        Self { use_colors: true, output: Mutex::new(Box::new(std::io::stderr())) }
    }

    /// Create a notifier that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { use_colors: false, output: Mutex::new(Box::new(output)) }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str) {
        let header = if self.use_colors {
            format!("\x1b[31m[{}] Build error\x1b[0m", crate::watch::timestamp())
        } else {
            format!("[{}] Build error", crate::watch::timestamp())
        };
        if let Ok(mut out) = self.output.lock() {
            let _ = writeln!(out, "{}\n{}", header, message);
            let _ = out.flush();
        }
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages received so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failure_message_template() {
        let message = failure_message("Less", &"missing.less not found");
        assert_eq!(
            message,
            "An error occurred while compiling Less.\nLook in the console for details.\nmissing.less not found"
        );
    }

    #[test]
    fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        assert!(notifier.is_empty());

        notifier.notify("first");
        notifier.notify("second");
        assert_eq!(notifier.len(), 2);
        assert_eq!(notifier.messages(), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_console_notifier_writes_message() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let notifier = ConsoleNotifier::with_output(SharedBuffer(Arc::clone(&buffer)));

        notifier.notify("An error occurred while compiling Less.");

        let written = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(written.contains("Build error"));
        assert!(written.contains("compiling Less"));
        assert!(!written.contains("\x1b["));
    }
}
