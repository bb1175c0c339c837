use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Error that occurs when opening a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to open file `{path}`: {source}")]
pub struct FileOpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FileOpenError {
    /// Returns `true` if the file does not exist.
    pub fn is_not_found(&self) -> bool {
        self.source.kind() == io::ErrorKind::NotFound
    }
}

impl From<FileOpenError> for io::Error {
    fn from(err: FileOpenError) -> Self {
        io::Error::new(err.source.kind(), err)
    }
}

/// Opens a file at the given path and wraps it in a [`BufReader`].
///
/// # Errors
///
/// Returns a [`FileOpenError`] if the file cannot be opened.
///
/// # Example
/// ```no_run
/// # use cgroup_sampler::fsutil;
/// let reader = fsutil::open_file_reader("/some/file.txt")?;
/// # Ok::<(), fsutil::FileOpenError>(())
/// ```
pub fn open_file_reader(path: impl AsRef<Path>) -> Result<BufReader<File>, FileOpenError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FileOpenError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Opens `path` and hands the buffered reader to `parse`.
///
/// Open failures keep their [`io::ErrorKind`] so callers can still tell a
/// missing file apart from malformed content.
pub fn parse_file<T>(
    path: impl AsRef<Path>,
    parse: impl FnOnce(&mut BufReader<File>) -> io::Result<T>,
) -> io::Result<T> {
    let mut reader = open_file_reader(path)?;
    parse(&mut reader)
}

/// Reads the first line of a file with surrounding whitespace removed.
pub fn read_trimmed_line<R: BufRead>(buf: &mut R) -> io::Result<String> {
    let mut line = String::new();
    buf.read_line(&mut line)?;
    Ok(line.trim().to_owned())
}

/// Joins an absolute path read from a kernel file onto the host root prefix.
///
/// `/sys/fs/cgroup` under the root `/rootfs` becomes `/rootfs/sys/fs/cgroup`.
pub fn host_path(host_root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    host_root.join(path.strip_prefix("/").unwrap_or(path))
}
