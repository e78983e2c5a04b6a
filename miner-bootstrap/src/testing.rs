use crate::host::{Command, Host, RunAs};
use cmd_lib::{CmdResult, FunResult};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Error;
use std::path::{Path, PathBuf};

/// Host double that records every action instead of touching the machine.
#[derive(Default)]
pub struct FakeHost {
    available: HashSet<String>,
    outputs: HashMap<String, String>,
    failing: HashSet<String>,
    ran: RefCell<Vec<String>>,
    written: RefCell<BTreeMap<PathBuf, String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commands(mut self, names: &[&str]) -> Self {
        self.available.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Canned stdout for a query, keyed by the command's display form.
    pub fn with_output(mut self, cmd: &str, out: &str) -> Self {
        self.outputs.insert(cmd.to_string(), out.to_string());
        self
    }

    pub fn failing(mut self, program: &str) -> Self {
        self.failing.insert(program.to_string());
        self
    }

    /// Recorded `run` calls as `<who>: <command>`.
    pub fn ran(&self) -> Vec<String> {
        self.ran.borrow().clone()
    }

    pub fn written(&self, path: &Path) -> Option<String> {
        self.written.borrow().get(path).cloned()
    }

    pub fn nothing_mutated(&self) -> bool {
        self.ran.borrow().is_empty() && self.written.borrow().is_empty()
    }
}

impl Host for FakeHost {
    fn run(&self, who: RunAs<'_>, cmd: &Command) -> CmdResult {
        self.ran.borrow_mut().push(format!("{who}: {cmd}"));
        if self.failing.contains(&cmd.program) {
            return Err(Error::other(format!("{} exited with status 1", cmd.program)));
        }
        Ok(())
    }

    fn output(&self, _who: RunAs<'_>, cmd: &Command) -> FunResult {
        self.outputs
            .get(&cmd.to_string())
            .cloned()
            .ok_or_else(|| Error::other(format!("{} exited with status 1", cmd.program)))
    }

    fn find_command(&self, name: &str) -> Option<PathBuf> {
        self.available
            .contains(name)
            .then(|| Path::new("/usr/bin").join(name))
    }

    fn write_file(&self, _who: RunAs<'_>, path: &Path, contents: &str) -> CmdResult {
        self.written
            .borrow_mut()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }
}
