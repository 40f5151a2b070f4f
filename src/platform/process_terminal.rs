//! Process-based terminal implementation.

use std::io::{self, BufRead, Write};
#[cfg(unix)]
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
#[cfg(unix)]
use std::thread::{self, JoinHandle};

use crate::core::terminal::Terminal;

#[cfg(unix)]
use signal_hook::iterator::Signals;

/// Terminal over the process's stdout and stdin.
#[derive(Debug)]
pub struct ProcessTerminal {
    stdout: io::Stdout,
    stdin: io::Stdin,
}

impl ProcessTerminal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
            stdin: io::stdin(),
        }
    }
}

impl Default for ProcessTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for ProcessTerminal {
    fn write(&mut self, data: &str) {
        // A closed stdout leaves nothing useful to report to.
        let _ = self.stdout.lock().write_all(data.as_bytes());
    }

    fn flush(&mut self) {
        let _ = self.stdout.lock().flush();
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let read = self.stdin.lock().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        strip_line_terminator(&mut line);
        Ok(Some(line))
    }
}

fn strip_line_terminator(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}

/// Signal handler guard for cleanup hooks.
#[cfg(unix)]
pub struct SignalHookGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<JoinHandle<()>>,
}

#[cfg(unix)]
impl Drop for SignalHookGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Install SIGINT/SIGTERM cleanup hook.
///
/// The cleanup runs on a dedicated thread, at most once.
#[cfg(unix)]
pub fn install_signal_handlers<F>(cleanup: F) -> io::Result<SignalHookGuard>
where
    F: Fn() + Send + Sync + 'static,
{
    let cleanup = Arc::new(cleanup);
    let ran = Arc::new(AtomicBool::new(false));
    let mut signals = Signals::new([libc::SIGINT, libc::SIGTERM])?;
    let handle = signals.handle();

    let thread = thread::spawn(move || {
        for _ in signals.forever() {
            run_cleanup_once(cleanup.as_ref(), &ran);
        }
    });

    Ok(SignalHookGuard {
        handle,
        thread: Some(thread),
    })
}

#[cfg(unix)]
fn run_cleanup_once<F: Fn() + ?Sized>(cleanup: &F, ran: &AtomicBool) {
    if ran
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        cleanup();
    }
}
