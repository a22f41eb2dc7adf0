//! Process tree reaper.
//!
//! Shell-launched commands fork children the caller never sees directly, so
//! killing only the direct child leaks orphans. The reaper walks the process
//! table, force-kills every descendant (deepest first) and then the root,
//! and sends a graceful terminate to anything that survived the first pass.
//!
//! All failures are swallowed and logged: the reaper's job is cleanup. A
//! process that is already gone counts as terminated, which makes
//! [`ProcessReaper::terminate_tree`] idempotent.

use std::collections::{HashMap, HashSet, VecDeque};

use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

/// Counters describing one `terminate_tree` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Processes that accepted the forceful kill.
    pub signalled: usize,
    /// Processes that no longer existed when signalled.
    pub already_gone: usize,
    /// Survivors of the forceful pass that were sent a graceful terminate.
    pub fallback_terminated: usize,
}

/// Capability to terminate a process and all of its descendants.
pub trait ProcessReaper: Send + Sync {
    /// Signal `root_pid` and every transitive descendant.
    ///
    /// Returns once every discoverable process received at least one
    /// termination signal; does not wait for exit confirmation.
    fn terminate_tree(&self, root_pid: u32) -> ReapReport;
}

/// Reaper backed by the operating system process table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemReaper;

impl ProcessReaper for SystemReaper {
    fn terminate_tree(&self, root_pid: u32) -> ReapReport {
        // On Unix, signalling pid 0 reaches our own process group.
        if root_pid == 0 {
            warn!("refusing to reap pid 0");
            return ReapReport::default();
        }

        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        let root = Pid::from_u32(root_pid);
        let mut targets = collect_descendants(&system, root);
        // Deepest descendants first, root last.
        targets.reverse();
        targets.push(root);

        let mut report = ReapReport::default();
        for pid in &targets {
            match send(*pid, Signal::Kill) {
                Delivery::Sent => report.signalled += 1,
                Delivery::Gone => report.already_gone += 1,
                Delivery::Failed(err) => {
                    warn!(pid = pid.as_u32(), %err, "forceful kill failed");
                }
            }
        }

        system.refresh_processes(ProcessesToUpdate::Some(&targets), true);
        for pid in &targets {
            if system.process(*pid).is_some_and(is_running) {
                match send(*pid, Signal::Terminate) {
                    Delivery::Sent => report.fallback_terminated += 1,
                    Delivery::Gone => {}
                    Delivery::Failed(err) => {
                        warn!(pid = pid.as_u32(), %err, "graceful terminate failed");
                    }
                }
            }
        }

        info!(
            root_pid,
            signalled = report.signalled,
            already_gone = report.already_gone,
            fallback_terminated = report.fallback_terminated,
            "process tree terminated"
        );
        report
    }
}

/// List the transitive descendants of `root_pid` in breadth-first order.
///
/// The root itself is not included.
#[must_use]
pub fn descendants_of(root_pid: u32) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    collect_descendants(&system, Pid::from_u32(root_pid))
        .into_iter()
        .map(Pid::as_u32)
        .collect()
}

/// Whether `pid` names a live process. Zombies count as dead.
#[must_use]
pub fn is_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some_and(is_running)
}

fn is_running(process: &sysinfo::Process) -> bool {
    !matches!(
        process.status(),
        sysinfo::ProcessStatus::Zombie | sysinfo::ProcessStatus::Dead
    )
}

fn collect_descendants(system: &System, root: Pid) -> Vec<Pid> {
    let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for (pid, process) in system.processes() {
        // Linux lists threads as tasks of their process; they die with it.
        if process.thread_kind().is_some() {
            continue;
        }
        if let Some(parent) = process.parent() {
            children.entry(parent).or_default().push(*pid);
        }
    }

    let mut ordered = Vec::new();
    let mut seen: HashSet<Pid> = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        for child in children.get(&current).into_iter().flatten() {
            if seen.insert(*child) {
                ordered.push(*child);
                queue.push_back(*child);
            }
        }
    }
    ordered
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Kill,
    Terminate,
}

enum Delivery {
    Sent,
    Gone,
    Failed(String),
}

#[cfg(unix)]
fn send(pid: Pid, signal: Signal) -> Delivery {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal as NixSignal};
    use nix::unistd::Pid as NixPid;

    let Ok(raw) = i32::try_from(pid.as_u32()) else {
        return Delivery::Failed(format!("pid {pid} out of range"));
    };
    let nix_signal = match signal {
        Signal::Kill => NixSignal::SIGKILL,
        Signal::Terminate => NixSignal::SIGTERM,
    };

    match kill(NixPid::from_raw(raw), nix_signal) {
        Ok(()) => Delivery::Sent,
        Err(Errno::ESRCH) => {
            debug!(pid = raw, "process already exited");
            Delivery::Gone
        }
        Err(err) => Delivery::Failed(err.to_string()),
    }
}

#[cfg(not(unix))]
fn send(pid: Pid, signal: Signal) -> Delivery {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    let Some(process) = system.process(pid) else {
        debug!(pid = pid.as_u32(), "process already exited");
        return Delivery::Gone;
    };

    let delivered = match signal {
        Signal::Kill => process.kill(),
        Signal::Terminate => process
            .kill_with(sysinfo::Signal::Term)
            .unwrap_or_else(|| process.kill()),
    };
    if delivered {
        Delivery::Sent
    } else {
        Delivery::Failed("signal not delivered".into())
    }
}
