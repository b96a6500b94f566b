//! Bounded execution of an external command.
//!
//! The child is polled until it exits or its deadline passes, in which case it
//! is killed. Stdout and stderr are drained on helper threads so a chatty child
//! never blocks on a full pipe.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long to wait, in total, for both pipe readers once the child has exited.
/// A grandchild that inherited the pipes can keep them open after the child is gone.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// How the child ended.
#[derive(Debug)]
pub enum ProcessExit {
    Exited { status: ExitStatus, stdout: String, stderr: String },
    TimedOut,
    /// Spawning or waiting failed; carries the OS error text.
    Failed(String),
}

/// Everything observed about one bounded run.
#[derive(Debug)]
pub struct ProcessReport {
    pub exit: ProcessExit,
    pub elapsed: Duration,
    pub peak_memory_bytes: Option<u64>,
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = source {
            let _ = r.read_to_end(&mut buf);
        }
        let _ = tx.send(buf);
    });
    rx
}

fn collect(rx: &Receiver<Vec<u8>>, deadline: Instant) -> String {
    let wait = deadline.saturating_duration_since(Instant::now());
    let bytes = rx.recv_timeout(wait).unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Run `cmd` to completion or until `timeout` elapses. A zero timeout never expires.
///
/// Never returns an error: launch failures and timeouts are reported through
/// [`ProcessExit`].
pub fn run_bounded(mut cmd: Command, timeout: Duration) -> ProcessReport {
    #[cfg(feature = "mem")]
    use sysinfo::{ProcessRefreshKind, RefreshKind, System};

    let start = Instant::now();
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ProcessReport {
                exit: ProcessExit::Failed(e.to_string()),
                elapsed: start.elapsed(),
                peak_memory_bytes: None,
            };
        }
    };
    let stdout_rx = drain(child.stdout.take());
    let stderr_rx = drain(child.stderr.take());

    #[cfg(feature = "mem")]
    let mut sys =
        System::new_with_specifics(RefreshKind::new().with_processes(ProcessRefreshKind::everything()));
    #[cfg(feature = "mem")]
    let pid = sysinfo::Pid::from_u32(child.id());
    #[cfg_attr(not(feature = "mem"), allow(unused_mut))]
    let mut peak_rss: Option<u64> = None;

    loop {
        #[cfg(feature = "mem")]
        {
            sys.refresh_process(pid);
            if let Some(p) = sys.process(pid) {
                peak_rss = Some(peak_rss.unwrap_or(0).max(p.memory()));
            }
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                let deadline = Instant::now() + PIPE_DRAIN_GRACE;
                let stdout = collect(&stdout_rx, deadline);
                let stderr = collect(&stderr_rx, deadline);
                return ProcessReport {
                    exit: ProcessExit::Exited { status, stdout, stderr },
                    elapsed: start.elapsed(),
                    peak_memory_bytes: peak_rss,
                };
            }
            Ok(None) => {
                if !timeout.is_zero() && start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return ProcessReport {
                        exit: ProcessExit::TimedOut,
                        elapsed: start.elapsed(),
                        peak_memory_bytes: peak_rss,
                    };
                }
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return ProcessReport {
                    exit: ProcessExit::Failed(e.to_string()),
                    elapsed: start.elapsed(),
                    peak_memory_bytes: peak_rss,
                };
            }
        }

        let sleep = if timeout.is_zero() {
            POLL_INTERVAL
        } else {
            POLL_INTERVAL.min(timeout.saturating_sub(start.elapsed()))
        };
        std::thread::sleep(sleep);
    }
}
