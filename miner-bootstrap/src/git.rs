use crate::host::{Command, Host, RunAs};
use crate::operator::Operator;
use crate::ownership;
use crate::runner::ProvisioningStep;
use cmd_lib::CmdResult;
use log::{info, warn};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    Missing,
    Valid,
    /// Present on disk without version-control metadata.
    Invalid,
}

/// `.git` may be a directory or, for worktrees and submodules, a file.
pub fn checkout_state(path: &Path) -> CheckoutState {
    if path.join(".git").exists() {
        CheckoutState::Valid
    } else if path.exists() {
        CheckoutState::Invalid
    } else {
        CheckoutState::Missing
    }
}

pub fn clone(host: &dyn Host, operator: &Operator, url: &str, path: &Path) -> CmdResult {
    info!("Cloning {url} into {}", path.display());
    host.run(
        RunAs::Operator(operator),
        &Command::new("git").args(["clone", url]).path_arg(path),
    )
}

pub fn pull(host: &dyn Host, operator: &Operator, path: &Path) -> CmdResult {
    info!("Fast-forwarding checkout {}", path.display());
    host.run(
        RunAs::Operator(operator),
        &Command::new("git")
            .arg("-C")
            .path_arg(path)
            .args(["pull", "--ff-only"]),
    )
}

/// Clones the application unless a valid checkout is already there. A
/// directory without `.git` is removed and cloned afresh.
pub fn checkout_step<'a>(
    host: &'a dyn Host,
    operator: &'a Operator,
    url: &'a str,
    path: &'a Path,
) -> ProvisioningStep<'a> {
    ProvisioningStep::new(
        "checkout",
        move || Ok(checkout_state(path) == CheckoutState::Valid),
        move || {
            if checkout_state(path) == CheckoutState::Invalid {
                warn!(
                    "{} exists but is not a git checkout, recreating it",
                    path.display()
                );
                host.run(RunAs::Root, &Command::new("rm").arg("-rf").path_arg(path))?;
            }
            if let Some(parent) = path.parent() {
                if !parent.exists() {
                    host.run(RunAs::Root, &Command::new("mkdir").arg("-p").path_arg(parent))?;
                    ownership::normalize(host, parent, operator)?;
                }
            }
            clone(host, operator, url, path)
        },
    )
}
