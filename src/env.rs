use std::env as stdenv;
use std::ffi::{CString, NulError, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;

use indexmap::IndexMap;

/// The environment table owned by a shell session.
///
/// It is captured from the host process once, at startup, and from then on it is
/// the only source of truth: `setenv` writes here, `printenv` reads here, and every
/// spawned child receives a snapshot of it. The host process's own table is never
/// modified.
///
/// Iteration order is insertion order. Overwriting a variable keeps its position.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: IndexMap<OsString, OsString>,
}

impl Environment {
    /// An empty table.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the current process environment into a new `Environment` instance.
    pub fn from_host() -> Self {
        stdenv::vars_os().collect()
    }

    /// Get the value of an environment variable.
    pub fn get_var(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars.get(key.as_ref()).map(OsString::as_os_str)
    }

    /// Set or override an environment variable.
    pub fn set_var(&mut self, key: impl Into<OsString>, val: impl Into<OsString>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// `NAME=VALUE` entries in the form `execve` expects.
    pub fn to_envp(&self) -> Result<Vec<CString>, NulError> {
        self.vars
            .iter()
            .map(|(k, v)| {
                let mut entry = Vec::with_capacity(k.len() + v.len() + 1);
                entry.extend_from_slice(k.as_bytes());
                entry.push(b'=');
                entry.extend_from_slice(v.as_bytes());
                CString::new(entry)
            })
            .collect()
    }
}

impl<K: Into<OsString>, V: Into<OsString>> FromIterator<(K, V)> for Environment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Environment {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
