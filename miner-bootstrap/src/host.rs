use crate::common::find_executable;
use crate::operator::Operator;
use cmd_lib::*;
use log::{debug, warn};
use std::fmt;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

/// One external action: a program, its arguments and the environment it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Arguments handed to `env(1)`: assignments, then the program and its args.
    fn env_argv(&self) -> Vec<String> {
        let mut argv: Vec<String> = self.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.env {
            write!(f, "{k}={v} ")?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Identity an external action runs under.
#[derive(Debug, Clone, Copy)]
pub enum RunAs<'a> {
    Root,
    Operator(&'a Operator),
}

impl fmt::Display for RunAs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunAs::Root => write!(f, "root"),
            RunAs::Operator(op) => write!(f, "{}", op.name),
        }
    }
}

/// Everything the provisioning stages ask of the machine they run on.
pub trait Host {
    fn run(&self, who: RunAs<'_>, cmd: &Command) -> CmdResult;

    fn output(&self, who: RunAs<'_>, cmd: &Command) -> FunResult;

    /// Resolve a command name on PATH (plus host-specific extra directories).
    fn find_command(&self, name: &str) -> Option<PathBuf>;

    fn write_file(&self, who: RunAs<'_>, path: &Path, contents: &str) -> CmdResult;
}

/// Executes actions on the local machine. Requires root.
pub struct SystemHost {
    extra_search_dirs: Vec<PathBuf>,
}

impl SystemHost {
    pub fn new(extra_search_dirs: Vec<PathBuf>) -> Result<Self, Error> {
        let euid = run_fun!(id -u)?;
        if euid.trim() != "0" {
            return Err(Error::other(
                "miner-bootstrap must be run as root (try again with sudo)",
            ));
        }
        Ok(Self { extra_search_dirs })
    }
}

impl Host for SystemHost {
    fn run(&self, who: RunAs<'_>, cmd: &Command) -> CmdResult {
        debug!("[{who}] {cmd}");
        let argv = cmd.env_argv();
        let dir = cmd
            .current_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "/".to_string());
        match who {
            RunAs::Root => run_cmd!(cd $dir; env $[argv]),
            RunAs::Operator(op) if op.is_root() => run_cmd!(cd $dir; env $[argv]),
            RunAs::Operator(op) => {
                let user = &op.name;
                run_cmd!(cd $dir; sudo -u $user -H env $[argv])
            }
        }
    }

    fn output(&self, who: RunAs<'_>, cmd: &Command) -> FunResult {
        debug!("[{who}] {cmd}");
        let argv = cmd.env_argv();
        let dir = cmd
            .current_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "/".to_string());
        match who {
            RunAs::Root => run_fun!(cd $dir; env $[argv]),
            RunAs::Operator(op) if op.is_root() => run_fun!(cd $dir; env $[argv]),
            RunAs::Operator(op) => {
                let user = &op.name;
                run_fun!(cd $dir; sudo -u $user -H env $[argv])
            }
        }
    }

    fn find_command(&self, name: &str) -> Option<PathBuf> {
        find_executable(name, &self.extra_search_dirs)
    }

    fn write_file(&self, who: RunAs<'_>, path: &Path, contents: &str) -> CmdResult {
        debug!("[{who}] writing {}", path.display());
        replace_file(path, contents)?;
        if let RunAs::Operator(op) = who {
            std::os::unix::fs::lchown(path, Some(op.uid), Some(op.gid))?;
        }
        Ok(())
    }
}

/// Writes run as root: a symlink planted at `path` is replaced, never followed.
fn replace_file(path: &Path, contents: &str) -> Result<(), Error> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            warn!("Replacing symlink {} with a regular file", path.display());
            std::fs::remove_file(path)?;
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::fs::write(path, contents)
}
