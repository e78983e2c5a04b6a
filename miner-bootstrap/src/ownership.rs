use crate::host::{Command, Host, RunAs};
use crate::operator::Operator;
use crate::runner::ProvisioningStep;
use cmd_lib::CmdResult;
use log::info;
use std::io::{Error, ErrorKind};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// True when `path` and everything below it belongs to `uid:gid`.
/// Symlinks are checked themselves, never followed. A missing path has
/// nothing to fix and counts as owned.
pub fn is_owned_by(path: &Path, uid: u32, gid: u32) -> Result<bool, Error> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    if meta.uid() != uid || meta.gid() != gid {
        return Ok(false);
    }
    if meta.is_dir() {
        for entry in std::fs::read_dir(path)? {
            if !is_owned_by(&entry?.path(), uid, gid)? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

pub fn normalize(host: &dyn Host, path: &Path, operator: &Operator) -> CmdResult {
    info!("Handing {} over to {}", path.display(), operator.name);
    host.run(
        RunAs::Root,
        &Command::new("chown")
            .args(["-R", operator.owner_spec().as_str()])
            .path_arg(path),
    )
}

/// Step keeping `path` owned by the operator; re-run after privileged writes.
pub fn ownership_step<'a>(
    host: &'a dyn Host,
    path: &'a Path,
    operator: &'a Operator,
) -> ProvisioningStep<'a> {
    ProvisioningStep::new(
        "checkout-ownership",
        move || is_owned_by(path, operator.uid, operator.gid),
        move || normalize(host, path, operator),
    )
}
