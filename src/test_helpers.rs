//! Test utilities: a shell-script stand-in for `logcat`.

#[cfg(test)]
use crate::config::LogCommand;
#[cfg(test)]
use std::fs;
#[cfg(test)]
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
const SCRIPT_TEMPLATE: &str = r#"#!/bin/sh
buffer='@BUFFER@'
spawns='@SPAWNS@'
mode=stream
pid=
for arg in "$@"; do
  case "$arg" in
    -d) mode=dump ;;
    -c) mode=clear ;;
    --pid=*) pid="${arg#--pid=}" ;;
  esac
done
case "$mode" in
  dump)
    if [ -n "$pid" ]; then
      grep -F -- "($pid)" "$buffer" || true
    else
      cat "$buffer"
    fi
    ;;
  clear)
    : > "$buffer"
    ;;
  stream)
    echo "$$" >> "$spawns"
@LINES@
@TAIL@
    ;;
esac
"#;

/// A fake log command backed by files in a temporary directory.
///
/// Dump prints the buffer file, clear truncates it, stream records its pid in
/// a spawn log, then prints the configured lines with a delay before each.
#[cfg(test)]
pub struct FakeLogcat {
    script: PathBuf,
    buffer: PathBuf,
    spawns: PathBuf,
    _temp_dir: tempfile::TempDir,
}

#[cfg(test)]
impl FakeLogcat {
    /// Streams `lines` and then stays alive until killed.
    pub fn new(lines: &[&str], delay: Duration) -> std::io::Result<Self> {
        Self::build(lines, delay, true)
    }

    /// Streams `lines` and then exits on its own.
    pub fn finite(lines: &[&str], delay: Duration) -> std::io::Result<Self> {
        Self::build(lines, delay, false)
    }

    fn build(lines: &[&str], delay: Duration, keep_alive: bool) -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let script = temp_dir.path().join("logcat.sh");
        let buffer = temp_dir.path().join("buffer.log");
        let spawns = temp_dir.path().join("spawns.log");

        let delay = format!("{:.3}", delay.as_secs_f64());
        let body: Vec<String> = lines
            .iter()
            .map(|line| format!("    sleep {}\n    printf '%s\\n' '{}'", delay, line))
            .collect();
        let tail = if keep_alive {
            "    exec sleep 3600"
        } else {
            "    exit 0"
        };

        let contents = SCRIPT_TEMPLATE
            .replace("@BUFFER@", &buffer.to_string_lossy())
            .replace("@SPAWNS@", &spawns.to_string_lossy())
            .replace("@LINES@", &body.join("\n"))
            .replace("@TAIL@", tail);

        fs::write(&script, contents)?;
        fs::write(&buffer, "")?;

        Ok(Self {
            script,
            buffer,
            spawns,
            _temp_dir: temp_dir,
        })
    }

    /// Command that runs the script through `sh`.
    pub fn command(&self) -> LogCommand {
        LogCommand::new("sh")
            .arg(self.script.to_string_lossy())
            .dump_args(["-d"])
            .stream_args(["-v", "brief"])
            .clear_args(["-c"])
    }

    /// Replace the dump buffer.
    pub fn set_buffer(&self, lines: &[&str]) -> std::io::Result<()> {
        let mut contents = lines.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        fs::write(&self.buffer, contents)
    }

    pub fn buffer_path(&self) -> &Path {
        &self.buffer
    }

    /// How many streaming processes have started so far.
    pub fn spawn_count(&self) -> usize {
        fs::read_to_string(&self.spawns)
            .map(|contents| contents.lines().count())
            .unwrap_or(0)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_fake_logcat_creation() {
        let fake = FakeLogcat::new(&["A"], Duration::from_millis(10)).unwrap();
        assert!(fake.buffer_path().exists());
        assert_eq!(fake.spawn_count(), 0);
    }

    #[test]
    fn test_set_buffer() {
        let fake = FakeLogcat::new(&[], Duration::ZERO).unwrap();
        fake.set_buffer(&["line 1", "line 2"]).unwrap();

        let contents = fs::read_to_string(fake.buffer_path()).unwrap();
        assert_eq!(contents, "line 1\nline 2\n");

        fake.set_buffer(&[]).unwrap();
        assert!(fs::read_to_string(fake.buffer_path()).unwrap().is_empty());
    }

    #[test]
    fn test_command_runs_through_sh() {
        let fake = FakeLogcat::new(&[], Duration::ZERO).unwrap();
        let command = fake.command();
        assert_eq!(command.program(), "sh");
    }
}
