use std::fmt;

use crate::Error;

/// A single failure, as delivered to an [`ErrorSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// The error message.
    pub message: String,
    /// The name of the file being processed when the error occurred.
    pub file: String,
    /// The 1-based line of the error, or `-1` if the error is not tied to a line.
    pub line: i32,
}

/// Receives errors reported by [`DescriptorPool::run`](crate::DescriptorPool::run).
///
/// This is implemented for closures taking an [`ErrorRecord`], and for `Vec<ErrorRecord>`, which
/// collects every record.
pub trait ErrorSink {
    /// Reports a single error. This is called exactly once for each file that fails.
    fn report(&mut self, record: &ErrorRecord);
}

/// An [`ErrorSink`] which prints each error to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl<F> ErrorSink for F
where
    F: FnMut(&ErrorRecord),
{
    fn report(&mut self, record: &ErrorRecord) {
        self(record)
    }
}

impl ErrorSink for Vec<ErrorRecord> {
    fn report(&mut self, record: &ErrorRecord) {
        self.push(record.clone());
    }
}

impl ErrorSink for StderrSink {
    fn report(&mut self, record: &ErrorRecord) {
        eprintln!("{}", record);
    }
}

impl From<&Error> for ErrorRecord {
    fn from(err: &Error) -> Self {
        ErrorRecord {
            message: err.to_string(),
            file: err.file().unwrap_or("UNKNOWN").to_owned(),
            line: err
                .line()
                .and_then(|line| i32::try_from(line).ok())
                .unwrap_or(-1),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line >= 0 {
            write!(
                f,
                "Protobuf: Parsing file [{}:{}] failed: {}",
                self.file, self.line, self.message
            )
        } else {
            write!(
                f,
                "Protobuf: Parsing file [{}] failed: {}",
                self.file, self.message
            )
        }
    }
}
