use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const STDERR_TAIL_LINES: usize = 40;

/// Owns the headless display server running as a child process.
#[derive(Clone)]
pub struct ServerProcess {
    child: Arc<Mutex<Option<Child>>>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
}

impl ServerProcess {
    /// Start `command` with stderr captured; stdin and stdout are inherited.
    pub fn spawn(mut command: Command) -> Result<Self> {
        log::info!("Starting display server: {:?}", command);

        let mut child = command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn display server")?;

        log::info!("Display server spawned with PID: {}", child.id());

        let stderr = child
            .stderr
            .take()
            .context("Failed to capture display server stderr")?;

        let process = Self {
            child: Arc::new(Mutex::new(Some(child))),
            stderr_tail: Arc::new(Mutex::new(VecDeque::new())),
        };

        let tail = process.stderr_tail.clone();
        thread::spawn(move || Self::read_stderr(stderr, tail));

        Ok(process)
    }

    /// Forward the server's log lines and keep the latest ones for error reports.
    fn read_stderr(stderr: std::process::ChildStderr, tail: Arc<Mutex<VecDeque<String>>>) {
        let reader = BufReader::new(stderr);

        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    log::info!("[server] {}", line);

                    let mut tail = tail.lock();
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Err(e) => {
                    log::error!("Error reading display server stderr: {}", e);
                    break;
                }
            }
        }

        log::debug!("Display server stderr reader stopped");
    }

    /// Exit status if the process has already terminated.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        let mut guard = self.child.lock();
        let child = guard.as_mut()?;
        match child.try_wait() {
            Ok(status) => status,
            Err(e) => {
                log::error!("Error checking display server status: {}", e);
                None
            }
        }
    }

    pub fn is_running(&self) -> bool {
        let spawned = self.child.lock().is_some();
        spawned && self.exit_status().is_none()
    }

    /// Wait `grace` and fail if the server exited in the meantime.
    pub fn wait_for_startup(&self, grace: Duration) -> Result<()> {
        let started = Instant::now();
        while started.elapsed() < grace {
            if let Some(status) = self.exit_status() {
                // Give the reader thread a moment to drain the pipe
                thread::sleep(Duration::from_millis(200));
                anyhow::bail!(
                    "Display server failed to start ({}).\n\nError output:\n{}",
                    status,
                    self.stderr_output()
                );
            }
            thread::sleep(Duration::from_millis(100));
        }
        Ok(())
    }

    pub fn stderr_output(&self) -> String {
        self.stderr_tail
            .lock()
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Block until the server exits on its own.
    pub fn wait(&self) -> Option<ExitStatus> {
        loop {
            let stopped = self.child.lock().is_none();
            if stopped {
                return None;
            }
            if let Some(status) = self.exit_status() {
                return Some(status);
            }
            thread::sleep(Duration::from_millis(250));
        }
    }

    /// Ask the server to stop, killing it if it has not exited within 2 s.
    pub fn stop(&self) -> Result<()> {
        let child_option = self.child.lock().take();
        if let Some(mut child) = child_option {
            log::info!("Stopping display server with PID {}...", child.id());

            #[cfg(unix)]
            {
                let pid = child.id();
                let _ = Command::new("kill")
                    .arg("-TERM")
                    .arg(pid.to_string())
                    .output();
            }

            #[cfg(windows)]
            {
                child.kill().ok();
            }

            let max_wait = Duration::from_millis(2000);
            let started = Instant::now();
            while started.elapsed() < max_wait {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        log::info!("Display server exited with status: {}", status);
                        return Ok(());
                    }
                    Ok(None) => thread::sleep(Duration::from_millis(100)),
                    Err(e) => {
                        log::error!("Error checking display server status: {}", e);
                        break;
                    }
                }
            }

            log::warn!("Display server didn't stop after {:?}, killing it", max_wait);
            child.kill().context("Failed to kill display server")?;
            child.wait().context("Failed to wait for display server")?;
        }

        Ok(())
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        // Clones share the child; only the last handle cleans up
        if Arc::strong_count(&self.child) == 1 {
            if let Err(e) = self.stop() {
                log::error!("Error stopping display server in Drop: {}", e);
            }
        }
    }
}

/// Open `url` in the user's default browser, or just log it when
/// `no_browser` is set. A browser that fails to start is not fatal.
pub fn show_display<F>(url: &str, no_browser: bool, open: F)
where
    F: FnOnce(&str) -> std::io::Result<()>,
{
    if no_browser {
        log::info!("Display available at {}", url);
        return;
    }

    log::info!("Opening browser at {}", url);
    if let Err(e) = open(url) {
        log::warn!("Failed to open browser ({}); open {} manually", e, url);
    }
}
