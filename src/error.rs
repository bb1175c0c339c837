use std::fmt::Display;

pub trait ResultOkLogExt<T, E> {
    /// Converts into an `Option`, logging the error as a warning.
    fn ok_log(self) -> Option<T>;

    /// Like [`ResultOkLogExt::ok_log`], prefixing the message with `context`.
    ///
    /// This is how a single controller failing is swallowed without failing
    /// the whole sample.
    fn ok_log_with(self, context: impl Display) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: Display,
{
    fn ok_log(self) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::warn!("{err}");
                None
            }
        }
    }

    fn ok_log_with(self, context: impl Display) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::warn!("{context}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_log() {
        let ok: Result<u8, std::io::Error> = Ok(3);
        assert_eq!(ok.ok_log(), Some(3));
        let err: Result<u8, std::io::Error> = Err(std::io::Error::other("boom"));
        assert_eq!(err.ok_log(), None);
    }

    #[test]
    fn test_ok_log_with() {
        let err: Result<u8, std::io::Error> = Err(std::io::Error::other("boom"));
        assert_eq!(err.ok_log_with("container abc: memory"), None);
    }
}
