//! Access to the host system: running helper programs, reading pseudo-files, probing paths and
//! querying filesystem usage.
//!
//! Everything that inspects the host goes through [`SystemProbe`], so the sampling and icon
//! resolution logic can be exercised against a fake system in tests.

use std::{
    io::Read,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    time::Duration,
};

use thiserror::Error;
use wait_timeout::ChildExt;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to spawn {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    ExitStatus { program: String, status: ExitStatus },
    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("could not read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not query filesystem usage of {}", path.display())]
    Statvfs {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },
    #[error("no PID reported for bus address {0}")]
    MissingPid(String),
    #[error("process {0} has no command name")]
    EmptyProcessName(u32),
}

/// Capacity of a mounted filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsUsage {
    pub size_bytes: u64,
    pub used_bytes: u64,
}

pub trait SystemProbe {
    /// Run a program to completion and return its stdout. Fails on spawn errors and on a nonzero
    /// exit status.
    fn run(&self, program: &str, args: &[&str]) -> Result<String, ProbeError>;

    /// Start a program without waiting for it.
    fn spawn_detached(&self, program: &str, args: &[&str]) -> Result<(), ProbeError>;

    fn read_text(&self, path: &Path) -> Result<String, ProbeError>;

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, ProbeError>;

    fn is_file(&self, path: &Path) -> bool;

    fn home_dir(&self) -> Option<PathBuf>;

    fn filesystem_usage(&self, path: &Path) -> Result<FsUsage, ProbeError>;
}

/// [`SystemProbe`] backed by the real system.
#[derive(Debug, Clone)]
pub struct LocalSystem {
    /// Upper bound for helper programs like `busctl`, which run on the event loop thread.
    pub command_timeout: Duration,
}

impl LocalSystem {
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }
}

impl SystemProbe for LocalSystem {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, ProbeError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ProbeError::Spawn { program: program.to_owned(), source })?;

        let status = match child.wait_timeout(self.command_timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProbeError::Timeout { program: program.to_owned(), timeout: self.command_timeout });
            }
            Err(source) => return Err(ProbeError::Spawn { program: program.to_owned(), source }),
        };
        if !status.success() {
            return Err(ProbeError::ExitStatus { program: program.to_owned(), status });
        }

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout).map_err(|source| ProbeError::Spawn { program: program.to_owned(), source })?;
        }
        Ok(stdout)
    }

    fn spawn_detached(&self, program: &str, args: &[&str]) -> Result<(), ProbeError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ProbeError::Spawn { program: program.to_owned(), source })?;
        // reap the child whenever it exits, so it doesn't linger as a zombie
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }

    fn read_text(&self, path: &Path) -> Result<String, ProbeError> {
        std::fs::read_to_string(path).map_err(|source| ProbeError::Read { path: path.to_owned(), source })
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, ProbeError> {
        let entries = std::fs::read_dir(path).map_err(|source| ProbeError::Read { path: path.to_owned(), source })?;
        let mut paths = entries.filter_map(|entry| entry.ok().map(|e| e.path())).collect::<Vec<_>>();
        paths.sort();
        Ok(paths)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        std::env::var_os("HOME").filter(|home| !home.is_empty()).map(PathBuf::from)
    }

    fn filesystem_usage(&self, path: &Path) -> Result<FsUsage, ProbeError> {
        let stat = nix::sys::statvfs::statvfs(path).map_err(|source| ProbeError::Statvfs { path: path.to_owned(), source })?;
        let fragment_size = stat.fragment_size() as u64;
        let blocks = stat.blocks() as u64;
        let free = stat.blocks_free() as u64;
        Ok(FsUsage { size_bytes: blocks * fragment_size, used_bytes: blocks.saturating_sub(free) * fragment_size })
    }
}

/// Extract the `PID=` field from the output of `busctl status`.
pub fn parse_busctl_pid(output: &str) -> Option<u32> {
    output.lines().find_map(|line| line.strip_prefix("PID=")).and_then(|pid| pid.trim().parse().ok())
}

/// Ask the bus which process owns `bus_address`.
pub fn lookup_pid(probe: &dyn SystemProbe, bus_address: &str) -> Result<u32, ProbeError> {
    let output = probe.run("busctl", &["--user", "status", bus_address])?;
    parse_busctl_pid(&output).ok_or_else(|| ProbeError::MissingPid(bus_address.to_owned()))
}

/// Command name of a process, as reported by `/proc/<pid>/comm`.
pub fn lookup_process_name(probe: &dyn SystemProbe, pid: u32) -> Result<String, ProbeError> {
    let comm = probe.read_text(&Path::new("/proc").join(pid.to_string()).join("comm"))?;
    let comm = comm.trim();
    if comm.is_empty() {
        Err(ProbeError::EmptyProcessName(pid))
    } else {
        Ok(comm.to_owned())
    }
}

/// Find the command name of the process owning a bus address, logging why it couldn't be found.
pub fn process_name_for_bus_address(probe: &dyn SystemProbe, bus_address: &str) -> Option<String> {
    let result = lookup_pid(probe, bus_address).and_then(|pid| lookup_process_name(probe, pid));
    match result {
        Ok(name) => Some(name),
        Err(err) => {
            log::debug!("Could not find process for {}: {}", bus_address, err);
            None
        }
    }
}

#[cfg(test)]
pub mod test_util {
    //! In-memory [`SystemProbe`] for tests.

    use super::*;
    use itertools::Itertools;
    use std::{
        cell::RefCell,
        collections::{HashMap, HashSet},
    };

    #[derive(Default)]
    pub struct FakeSystem {
        /// stdout per full command line, e.g. `"busctl --user status :1.5"`.
        pub commands: HashMap<String, String>,
        pub files: RefCell<HashMap<PathBuf, String>>,
        /// Paths that exist but aren't readable text (icons).
        pub existing: HashSet<PathBuf>,
        pub home: Option<PathBuf>,
        pub fs_usage: Option<FsUsage>,
        pub ran: RefCell<Vec<String>>,
        /// Full command lines of detached programs.
        pub spawned: RefCell<Vec<String>>,
    }

    impl FakeSystem {
        pub fn with_file(self, path: &str, content: &str) -> Self {
            self.set_file(path, content);
            self
        }

        /// Create or overwrite a file while the fake is already in use.
        pub fn set_file(&self, path: &str, content: &str) {
            self.files.borrow_mut().insert(PathBuf::from(path), content.to_owned());
        }

        pub fn with_command(mut self, command: &str, stdout: &str) -> Self {
            self.commands.insert(command.to_owned(), stdout.to_owned());
            self
        }

        pub fn with_existing(mut self, path: &str) -> Self {
            self.existing.insert(PathBuf::from(path));
            self
        }

        /// Make `bus_address` resolve to a process called `name`.
        pub fn with_process(self, bus_address: &str, pid: u32, name: &str) -> Self {
            let busctl_status = format!("Unique={}\nPID={}\nComm={}\n", bus_address, pid, name);
            self.with_command(&format!("busctl --user status {}", bus_address), &busctl_status)
                .with_file(&format!("/proc/{}/comm", pid), &format!("{}\n", name))
        }
    }

    impl SystemProbe for FakeSystem {
        fn run(&self, program: &str, args: &[&str]) -> Result<String, ProbeError> {
            let command_line = std::iter::once(program).chain(args.iter().copied()).join(" ");
            self.ran.borrow_mut().push(command_line.clone());
            self.commands.get(&command_line).cloned().ok_or_else(|| ProbeError::Spawn {
                program: program.to_owned(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }

        fn spawn_detached(&self, program: &str, args: &[&str]) -> Result<(), ProbeError> {
            self.spawned.borrow_mut().push(std::iter::once(program).chain(args.iter().copied()).join(" "));
            Ok(())
        }

        fn read_text(&self, path: &Path) -> Result<String, ProbeError> {
            self.files.borrow().get(path).cloned().ok_or_else(|| ProbeError::Read {
                path: path.to_owned(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }

        fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, ProbeError> {
            let files = self.files.borrow();
            let mut children = files
                .keys()
                .chain(self.existing.iter())
                .filter_map(|p| p.strip_prefix(path).ok().and_then(|rest| rest.components().next()).map(|c| path.join(c)))
                .collect::<Vec<_>>();
            children.sort();
            children.dedup();
            if children.is_empty() {
                Err(ProbeError::Read { path: path.to_owned(), source: std::io::Error::from(std::io::ErrorKind::NotFound) })
            } else {
                Ok(children)
            }
        }

        fn is_file(&self, path: &Path) -> bool {
            self.existing.contains(path) || self.files.borrow().contains_key(path)
        }

        fn home_dir(&self) -> Option<PathBuf> {
            self.home.clone()
        }

        fn filesystem_usage(&self, path: &Path) -> Result<FsUsage, ProbeError> {
            self.fs_usage.ok_or_else(|| ProbeError::Statvfs { path: path.to_owned(), source: nix::Error::EACCES })
        }
    }
}
