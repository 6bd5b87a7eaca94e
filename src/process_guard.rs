//! Process lifecycle management for child processes
//!
//! Long-running tools (clone, dependency install) are spawned in their own
//! process group and tracked here, so that when the provisioner is
//! interrupted or killed they are terminated instead of being left to finish
//! against a half-provisioned host.
//!
//! - Spawn children in their own process group
//! - Track all child PIDs in a global registry
//! - On SIGINT/SIGTERM/SIGHUP, send SIGTERM to every tracked group
//! - Groups still alive after the grace period get SIGKILL
//! - While an interactive child owns the terminal, SIGINT and SIGQUIT are
//!   left to it and the run continues with its exit status

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry tracking all spawned child processes
#[derive(Debug, Default)]
pub struct ChildRegistry {
    /// Set of child PIDs currently running
    pids: HashSet<u32>,
    /// Whether cleanup has already been initiated (prevent double-cleanup)
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    /// Register a new child process
    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        tracing::debug!("Registered child process PID {}", pid);
    }

    /// Unregister a child process (called when it exits normally)
    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        tracing::debug!("Unregistered child process PID {}", pid);
    }

    /// Get count of tracked children
    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate all tracked process groups.
    /// Sends SIGTERM first, waits up to `grace_period`, then SIGKILL
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            tracing::debug!("Cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        let groups: Vec<u32> = self.pids.drain().collect();
        if groups.is_empty() {
            tracing::debug!("No child processes to terminate");
            return;
        }

        tracing::info!("Terminating {} child process group(s)...", groups.len());
        for &pgid in &groups {
            if let Err(e) = send_signal_to_group(pgid, Signal::SIGTERM) {
                tracing::debug!("SIGTERM to process group {} failed: {}", pgid, e);
            }
        }

        let deadline = Instant::now() + grace_period;
        while Instant::now() < deadline && groups.iter().any(|&pgid| group_alive(pgid)) {
            std::thread::sleep(Duration::from_millis(50));
        }

        for &pgid in groups.iter().filter(|&&pgid| group_alive(pgid)) {
            tracing::warn!("Process group {} did not terminate, sending SIGKILL", pgid);
            if let Err(e) = send_signal_to_group(pgid, Signal::SIGKILL) {
                tracing::error!("SIGKILL to process group {} failed: {}", pgid, e);
            }
        }
    }
}

/// Registration of one running child; unregisters on drop so a failed wait
/// cannot leave a stale PID behind
pub struct TrackedChild {
    pid: u32,
}

impl TrackedChild {
    pub fn register(pid: u32) -> Self {
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }
        Self { pid }
    }
}

impl Drop for TrackedChild {
    fn drop(&mut self) {
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(self.pid);
        }
    }
}

/// Number of interactive children currently holding the terminal
static FOREGROUND_CHILDREN: AtomicUsize = AtomicUsize::new(0);

/// Marks an interactive child as running in the terminal's foreground group.
///
/// While one is alive, keyboard signals (SIGINT, SIGQUIT) belong to the child:
/// the terminal delivers them to it directly and the provisioner waits for its
/// exit status instead of exiting underneath it.
pub struct ForegroundChild {
    _private: (),
}

impl ForegroundChild {
    pub fn enter() -> Self {
        FOREGROUND_CHILDREN.fetch_add(1, Ordering::SeqCst);
        Self { _private: () }
    }

    pub fn active() -> bool {
        FOREGROUND_CHILDREN.load(Ordering::SeqCst) > 0
    }
}

impl Drop for ForegroundChild {
    fn drop(&mut self) {
        FOREGROUND_CHILDREN.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Negative PID signals the whole group, so grandchildren (e.g. the compilers
/// pip spawns) receive it too
fn send_signal_to_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), signal)
}

/// A group exists while any member, including an unreaped leader, remains
fn group_alive(pgid: u32) -> bool {
    signal::kill(Pid::from_raw(-(pgid as i32)), None).is_ok()
}

/// Keyboard signals are left to a foreground child; everything else ends the run
fn exits_on(sig: i32, foreground_child: bool) -> bool {
    use signal_hook::consts::signal::{SIGINT, SIGQUIT};
    !(foreground_child && (sig == SIGINT || sig == SIGQUIT))
}

/// Initialize global signal handlers for SIGINT, SIGQUIT, SIGTERM and SIGHUP.
/// Call this once at program start.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new([SIGINT, SIGQUIT, SIGTERM, SIGHUP])?;

    thread::spawn(move || {
        for sig in signals.forever() {
            let signal_name = match sig {
                SIGINT => "SIGINT",
                SIGQUIT => "SIGQUIT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "UNKNOWN",
            };

            if !exits_on(sig, ForegroundChild::active()) {
                tracing::info!(
                    "Received {} while an interactive command runs, waiting for it to exit",
                    signal_name
                );
                continue;
            }

            tracing::warn!("Received {} signal, stopping child processes", signal_name);

            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }

            // A prompt may hold raw mode; Drop guards never run past exit()
            crate::prompt::restore_terminal();

            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait for std::process::Command to set up process groups
pub trait CommandProcessGroup {
    /// Configure the command to run in its own process group
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: the closure only calls async-signal-safe functions
        // (setpgid, prctl) between fork and exec.
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;

                set_parent_death_signal()
            });
        }
        self
    }
}

/// Child dies with us even if we are SIGKILLed
#[cfg(target_os = "linux")]
fn set_parent_death_signal() -> std::io::Result<()> {
    // SAFETY: prctl with PR_SET_PDEATHSIG takes a plain signal number
    if unsafe { nix::libc::prctl(nix::libc::PR_SET_PDEATHSIG, nix::libc::SIGTERM) } == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_parent_death_signal() -> std::io::Result<()> {
    Ok(())
}
