//! Generic parsing of multi-line key/value stat files.
//!
//! Files such as `cpu.stat`, `memory.stat` or `cpuacct.stat` hold one
//! `key value` pair per line. Implementors of [`KeyValueStat`] only declare
//! the keys they care about; everything else is skipped.
//!
//! # Example: Implementing `KeyValueStat`
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::LazyLock;
//! use cgroup_sampler::cgroup::stats::KeyValueStat;
//!
//! #[derive(Default)]
//! struct MyStat {
//!     foo: u64,
//! }
//!
//! fn set_foo(stat: &mut MyStat, foo: u64) {
//!     stat.foo = foo;
//! }
//!
//! static HANDLERS: LazyLock<HashMap<&'static str, fn(&mut MyStat, u64)>> =
//!     LazyLock::new(|| HashMap::from([("foo", set_foo as fn(&mut MyStat, u64))]));
//!
//! impl KeyValueStat for MyStat {
//!     const ALLOW_DUPLICATE_KEYS: bool = false;
//!
//!     fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
//!         &HANDLERS
//!     }
//! }
//!
//! let stat = MyStat::from_reader(&mut "foo 7\nbar 8\n".as_bytes()).unwrap();
//! assert_eq!(stat.foo, 7);
//! ```

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use super::StatParseError;

/// A stat file made of `key value` lines.
pub trait KeyValueStat: Default + 'static {
    /// If `false`, a key seen twice is a [`StatParseError::DuplicateField`].
    const ALLOW_DUPLICATE_KEYS: bool;

    /// Known keys and the handler applying a parsed value to the struct.
    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)>;

    /// Parses the whole buffer.
    ///
    /// Lines with fewer than two fields and unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if reading fails, or a wrapped [`StatParseError`]
    /// if a known key has a non-numeric value or is duplicated.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut stat = Self::default();
        let handlers = Self::field_handlers();
        let mut seen_keys: HashSet<&'static str> = HashSet::with_capacity(handlers.len());

        let mut line = String::new();
        let mut lineno = 0;
        while buf.read_line(&mut line)? != 0 {
            lineno += 1;
            let mut parts = line.split_whitespace();
            if let (Some(key), Some(val)) = (parts.next(), parts.next()) {
                if let Some((k, handler)) = handlers.get_key_value(key) {
                    let parsed =
                        val.parse::<u64>()
                            .map_err(|source| StatParseError::InvalidKeyValue {
                                key: key.to_string(),
                                value: val.to_string(),
                                line: lineno,
                                source,
                            })?;
                    if !Self::ALLOW_DUPLICATE_KEYS && !seen_keys.insert(k) {
                        return Err(StatParseError::DuplicateField {
                            field: key.to_string(),
                            line: lineno,
                        }
                        .into());
                    }
                    handler(&mut stat, parsed);
                }
            }
            line.clear();
        }

        Ok(stat)
    }
}

/// A stat file whose meaning is carried by its first line only,
/// e.g. `cpuacct.usage_percpu`.
pub trait SingleLineStat: Sized + Default {
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self>;
}
