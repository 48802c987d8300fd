//! Ownership of the matcher child process and its pipes.

use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::protocol::API_MODE_ARG;

/// Line-oriented duplex channel to a matcher.
///
/// Implemented by [`ChildProcess`] for the real executable; tests provide
/// scripted doubles.
pub trait LineTransport {
    /// Blocks until a full line is available. `Ok(None)` means end of stream.
    fn read_line(&mut self) -> io::Result<Option<String>>;
    /// Writes `line` plus a line terminator and flushes.
    fn send_line(&mut self, line: &str) -> io::Result<()>;
    /// Stops the matcher. Called at most once by the controller.
    fn terminate(&mut self) -> io::Result<()>;
}

/// A running matcher started in `api` mode.
///
/// stderr is drained on a background thread into the log so the child never
/// stalls on a full pipe.
pub struct ChildProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr_drain: Option<JoinHandle<()>>,
    terminated: bool,
}

impl ChildProcess {
    /// Launches `executable api` with all three standard streams piped.
    pub fn spawn(executable: &Path) -> Result<Self> {
        let mut command = Command::new(executable);
        command.arg(API_MODE_ARG);
        Self::from_command(command).map_err(|err| match err {
            Error::Io(source) => Error::Launch {
                path: executable.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Launches a prepared command. Standard streams are overridden with pipes.
    pub fn from_command(mut command: Command) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        debug!("spawned matcher pid {}", child.id());

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Protocol("matcher pipes were not captured".into()));
            }
        };
        let stderr_drain = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    match line {
                        Ok(line) => debug!(target: "sgm_pipe::matcher", "{}", line),
                        Err(_) => break,
                    }
                }
            })
        });

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr_drain,
            terminated: false,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl LineTransport for ChildProcess {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        if self.stdout.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()
    }

    fn terminate(&mut self) -> io::Result<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        match self.child.try_wait()? {
            Some(status) => debug!("matcher already exited with {}", status),
            None => {
                self.child.kill()?;
                let status = self.child.wait()?;
                debug!("matcher terminated with {}", status);
            }
        }
        // A helper spawned by the matcher may still hold stderr open; the
        // drain thread then outlives us and exits on EOF.
        if let Some(handle) = self.stderr_drain.take() {
            if handle.is_finished() && handle.join().is_err() {
                warn!("matcher stderr drain thread panicked");
            }
        }
        Ok(())
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if let Err(err) = self.terminate() {
            warn!("failed to terminate matcher pid {}: {}", self.child.id(), err);
        }
    }
}
