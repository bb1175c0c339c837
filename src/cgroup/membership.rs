//! Parser for `/proc/<pid>/cgroup`.
//!
//! Each line has the form `<hierarchy-id>:<controller-list>:<cgroup-path>`:
//!
//! - v1: an arbitrary hierarchy id, a comma-separated controller list
//!   (e.g. `cpu,cpuacct`) and the group path relative to that hierarchy.
//! - v2: always `0::<path>`, the unified path shared by all controllers.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::fsutil;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    FileOpen(#[from] fsutil::FileOpenError),
    #[error("failed to read line for file `{path}`: {source}")]
    ReadLine {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cgroup membership at line {line} of `{path}`: `{content}`")]
    Parse {
        path: PathBuf,
        line: usize,
        content: String,
    },
    #[error("no unified `0::<path>` entry in `{path}`")]
    MissingUnifiedEntry { path: PathBuf },
}

impl Error {
    /// Returns `true` if the membership file does not exist, i.e. the process is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::FileOpen(err) if err.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Controller name to the group path relative to the controller's hierarchy root.
pub type CgroupMembership = HashMap<String, String>;

/// Location of the membership file of `pid` below `host_root`.
pub fn membership_path(host_root: &Path, pid: u32) -> PathBuf {
    fsutil::host_path(host_root, format!("/proc/{pid}/cgroup"))
}

/// Parses the v1 membership of `pid` into a controller map.
///
/// Every controller of a joint list maps to the same path. Named
/// hierarchies (e.g. `name=systemd`) are kept under their full name.
pub fn read_v1_membership(host_root: &Path, pid: u32) -> Result<CgroupMembership> {
    let path = membership_path(host_root, pid);
    let buf = fsutil::open_file_reader(&path)?;
    parse_v1_membership(buf, &path)
}

/// Returns the unified group path of `pid`.
pub fn read_v2_membership(host_root: &Path, pid: u32) -> Result<String> {
    let path = membership_path(host_root, pid);
    let buf = fsutil::open_file_reader(&path)?;
    parse_v2_membership(buf, &path)
}

fn parse_v1_membership<R: BufRead>(reader: R, origin: &Path) -> Result<CgroupMembership> {
    let mut membership = CgroupMembership::new();
    for_each_entry(reader, origin, |_, controllers, group| {
        for controller in controllers.split(',').filter(|c| !c.is_empty()) {
            membership.insert(controller.to_owned(), group.to_owned());
        }
    })?;
    Ok(membership)
}

fn parse_v2_membership<R: BufRead>(reader: R, origin: &Path) -> Result<String> {
    let mut unified = None;
    for_each_entry(reader, origin, |hierarchy, controllers, group| {
        if hierarchy == "0" && controllers.is_empty() && unified.is_none() {
            unified = Some(group.to_owned());
        }
    })?;
    unified.ok_or_else(|| Error::MissingUnifiedEntry {
        path: origin.to_path_buf(),
    })
}

fn for_each_entry<R: BufRead>(
    mut reader: R,
    origin: &Path,
    mut visit: impl FnMut(&str, &str, &str),
) -> Result<()> {
    let mut line = String::with_capacity(128);
    let mut lineno = 0;

    while reader.read_line(&mut line).map_err(|source| Error::ReadLine {
        path: origin.to_path_buf(),
        source,
    })? != 0
    {
        lineno += 1;
        let content = line.trim_end_matches('\n');
        if !content.is_empty() {
            // The group path may itself contain ':'.
            let mut parts = content.splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(hierarchy), Some(controllers), Some(group)) => {
                    visit(hierarchy, controllers, group)
                }
                _ => {
                    return Err(Error::Parse {
                        path: origin.to_path_buf(),
                        line: lineno,
                        content: content.to_owned(),
                    });
                }
            }
        }
        line.clear();
    }
    Ok(())
}
