//! Parser for lines of `/proc/mounts`.
//!
//! Each line holds `<device> <mount point> <fs type> <options> <dump> <pass>`.
//! See [`fstab(5)`](https://man7.org/linux/man-pages/man5/fstab.5.html).

/// Represents a parsed mount table line.
#[derive(Debug, PartialEq, Eq)]
pub struct MountEntry<'a> {
    /// Mounted device or pseudo source (e.g., `cgroup`).
    pub device: &'a str,
    /// Mount point path as seen by the reading process.
    pub mount_point: &'a str,
    /// Filesystem type (e.g., `cgroup`, `cgroup2`).
    pub fs_type: &'a str,
    /// Comma-separated mount options.
    pub options: &'a str,
}

impl<'a> MountEntry<'a> {
    /// Iterates over the comma-separated mount options.
    pub fn options(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        self.options.split(',').filter(|opt| !opt.is_empty())
    }
}

/// Named fields in a mount table line.
#[derive(Debug)]
pub enum MountField {
    Device,
    MountPoint,
    FsType,
    Options,
}

impl std::fmt::Display for MountField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MountField::Device => "device",
            MountField::MountPoint => "mount_point",
            MountField::FsType => "fs_type",
            MountField::Options => "options",
        };
        write!(f, "{name}")
    }
}

/// Errors that may occur when parsing a mount table line.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing `{field}` in line: `{line}`")]
    MissingField { field: MountField, line: String },
}

/// Parses a single line of the mount table.
///
/// Trailing `dump` and `pass` columns are optional and ignored.
///
/// # Errors
///
/// Returns [`ParseError::MissingField`] naming the first absent column.
pub fn parse_mount_line(line: &str) -> Result<MountEntry<'_>, ParseError> {
    let mut fields = line.split_whitespace();
    let mut next = |field: MountField| {
        fields.next().ok_or_else(|| ParseError::MissingField {
            field,
            line: line.trim_end().to_owned(),
        })
    };

    let device = next(MountField::Device)?;
    let mount_point = next(MountField::MountPoint)?;
    let fs_type = next(MountField::FsType)?;
    let options = next(MountField::Options)?;

    Ok(MountEntry {
        device,
        mount_point,
        fs_type,
        options,
    })
}
