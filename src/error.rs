//! Error types for the logcat streaming library.

use thiserror::Error;

/// The main error type for log streaming operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The external log command could not be launched.
    #[error("Failed to spawn log command `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// `start` was called while a streaming session is active.
    #[error("Log streaming is already running")]
    AlreadyRunning,

    /// The streaming process closed its output.
    #[error("Log stream ended (exit code: {code:?})")]
    StreamEnded { code: Option<i32> },

    /// I/O errors while reading process output or waiting on the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A one-shot command exited with a non-zero status.
    #[error("Log command `{program}` failed (exit code: {code:?}): {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The process was killed but did not exit within the reap timeout.
    #[error("Log process {pid:?} did not exit after kill")]
    TerminateTimeout { pid: Option<u32> },
}

impl Error {
    /// True for the informational end-of-stream condition.
    pub fn is_stream_end(&self) -> bool {
        matches!(self, Error::StreamEnded { .. })
    }

    pub(crate) fn spawn(program: &str, source: std::io::Error) -> Self {
        Error::Spawn {
            program: program.to_string(),
            source,
        }
    }
}

/// A convenient Result type for log streaming operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_conversion() {
        let io_error = IoError::new(ErrorKind::BrokenPipe, "pipe closed");
        let error: Error = io_error.into();

        match error {
            Error::Io(_) => {}
            _ => panic!("Expected Error::Io variant"),
        }

        assert!(error.to_string().contains("I/O error"));
        assert!(error.to_string().contains("pipe closed"));
    }

    #[test]
    fn test_spawn_error_keeps_source() {
        let error = Error::spawn("logcat", IoError::new(ErrorKind::NotFound, "no such file"));

        assert_eq!(
            error.to_string(),
            "Failed to spawn log command `logcat`: no such file"
        );
        let source = error.source().expect("spawn error should carry a source");
        assert_eq!(source.to_string(), "no such file");
    }

    #[test]
    fn test_already_running_error() {
        assert_eq!(
            Error::AlreadyRunning.to_string(),
            "Log streaming is already running"
        );
    }

    #[test]
    fn test_command_failed_error() {
        let error = Error::CommandFailed {
            program: "logcat".to_string(),
            code: Some(1),
            stderr: "permission denied".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Log command `logcat` failed (exit code: Some(1)): permission denied"
        );
    }

    #[test]
    fn test_stream_end_classification() {
        assert!(Error::StreamEnded { code: Some(0) }.is_stream_end());
        assert!(Error::StreamEnded { code: None }.is_stream_end());
        assert!(!Error::AlreadyRunning.is_stream_end());
        assert!(!Error::Io(IoError::other("read failed")).is_stream_end());
    }

    #[test]
    fn test_error_debug_format() {
        let error = Error::AlreadyRunning;
        let debug_str = format!("{:?}", error);
        assert_eq!(debug_str, "AlreadyRunning");
    }

    #[test]
    fn test_error_send_sync_traits() {
        // Errors cross task boundaries inside session events
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
