use crate::host::{Command, Host, RunAs};
use log::info;
use std::io::Error;
use std::path::PathBuf;

/// The non-privileged user the miner ends up running as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

impl Operator {
    /// `SUDO_USER` when elevated through sudo, the effective user otherwise.
    pub fn resolve(host: &dyn Host) -> Result<Self, Error> {
        let name = match std::env::var("SUDO_USER") {
            Ok(user) if !user.trim().is_empty() && user != "root" => user.trim().to_string(),
            _ => host.output(RunAs::Root, &Command::new("id").arg("-un"))?,
        };
        let id = |flag: &str| -> Result<u32, Error> {
            let out = host.output(
                RunAs::Root,
                &Command::new("id").args([flag, name.as_str()]),
            )?;
            parse_id(&out)
        };
        let uid = id("-u")?;
        let gid = id("-g")?;
        let passwd = host.output(
            RunAs::Root,
            &Command::new("getent").args(["passwd", name.as_str()]),
        )?;
        let home = home_from_passwd(&passwd)
            .ok_or_else(|| Error::other(format!("Could not find home directory of {name}")))?;

        info!("Provisioning for operator {name} (uid={uid}, gid={gid}, home={home:?})");
        Ok(Self {
            name,
            uid,
            gid,
            home,
        })
    }

    pub fn is_root(&self) -> bool {
        self.uid == 0
    }

    /// `user:group` argument for chown.
    pub fn owner_spec(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }
}

fn parse_id(raw: &str) -> Result<u32, Error> {
    raw.trim()
        .parse()
        .map_err(|e| Error::other(format!("Invalid numeric id {raw:?}: {e}")))
}

fn home_from_passwd(line: &str) -> Option<PathBuf> {
    line.lines()
        .next()?
        .split(':')
        .nth(5)
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}
