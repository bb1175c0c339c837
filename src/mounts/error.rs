use std::path::PathBuf;

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
    #[error("failed to parse line in file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: super::parser::ParseError,
    },
    #[error("no `{fs_type}` mount found in file `{path}`")]
    MissingMount { fs_type: String, path: PathBuf },
}

impl Error {
    /// Returns `true` if the mount table itself does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::FileOpen(err) if err.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
