//! Configuration for the external log command and the log service.

use std::time::Duration;

const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;
const DEFAULT_EVENT_CAPACITY: usize = 16;
const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(2);
const PID_PLACEHOLDER: &str = "{pid}";

/// Restricts log records to a single process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessFilter {
    Pid(u32),
}

impl ProcessFilter {
    /// Filter on the current process.
    pub fn current() -> Self {
        ProcessFilter::Pid(std::process::id())
    }

    fn pid(&self) -> u32 {
        match self {
            ProcessFilter::Pid(pid) => *pid,
        }
    }
}

/// The three ways the external command is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Dump,
    Stream,
    Clear,
}

/// Shape of the external log command.
///
/// Arguments are assembled as `program args.. mode_args.. [filter]`, so a
/// prefix such as `adb logcat` or `sh script.sh` can be expressed with
/// [`LogCommand::arg`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCommand {
    program: String,
    args: Vec<String>,
    dump_args: Vec<String>,
    stream_args: Vec<String>,
    clear_args: Vec<String>,
    filter_arg: String,
}

impl LogCommand {
    /// A command with no mode arguments and the `--pid={pid}` filter template.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dump_args: Vec::new(),
            stream_args: Vec::new(),
            clear_args: Vec::new(),
            filter_arg: format!("--pid={}", PID_PLACEHOLDER),
        }
    }

    /// Android `logcat`: `-d` to dump, `-v brief` to stream, `-c` to clear.
    pub fn logcat() -> Self {
        Self::new("logcat")
            .dump_args(["-d"])
            .stream_args(["-v", "brief"])
            .clear_args(["-c"])
    }

    /// Appends a leading argument used in every mode.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn dump_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dump_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn stream_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stream_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn clear_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clear_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the filter template; `{pid}` is replaced by the process id.
    pub fn filter_arg(mut self, template: impl Into<String>) -> Self {
        self.filter_arg = template.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument list for one invocation. The clear mode ignores the filter.
    pub(crate) fn args_for(&self, mode: Mode, filter: Option<ProcessFilter>) -> Vec<String> {
        let mode_args = match mode {
            Mode::Dump => &self.dump_args,
            Mode::Stream => &self.stream_args,
            Mode::Clear => &self.clear_args,
        };

        let mut args: Vec<String> = self.args.iter().chain(mode_args).cloned().collect();
        if mode != Mode::Clear {
            if let Some(filter) = filter {
                args.push(
                    self.filter_arg
                        .replace(PID_PLACEHOLDER, &filter.pid().to_string()),
                );
            }
        }
        args
    }
}

impl Default for LogCommand {
    fn default() -> Self {
        Self::logcat()
    }
}

/// Tunables for [`crate::LogService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub command: LogCommand,
    /// Queue size per subscriber; a full queue suspends the reader.
    pub subscriber_capacity: usize,
    /// Buffer of the session event channel.
    pub event_capacity: usize,
    /// How long to wait for the process to be reaped after a kill.
    pub terminate_timeout: Duration,
}

impl ServiceConfig {
    pub fn new(command: LogCommand) -> Self {
        Self {
            command,
            ..Self::default()
        }
    }

    pub fn with_subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.max(1);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command: LogCommand::default(),
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
        }
    }
}
