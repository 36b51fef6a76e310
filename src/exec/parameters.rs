// src/exec/parameters.rs

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;

use tracing::{debug, warn};

/// Name → value pairs handed to the installer as extra environment
/// entries.
///
/// Seeded once at startup (configured defaults, then the service's own
/// environment on top), extended by request fields before each launch.
/// Reserved names (the progress channel path) are set by the service and
/// cannot be overridden by requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunParameters {
    values: BTreeMap<String, String>,
    reserved: BTreeSet<String>,
}

impl RunParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configured defaults, then `env` (which wins).
    pub fn seed<I>(defaults: &BTreeMap<String, String>, env: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut values = defaults.clone();
        values.extend(env);
        Self {
            values,
            reserved: BTreeSet::new(),
        }
    }

    /// Set a value that later merges may not change.
    pub fn reserve(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.values.insert(name.clone(), value.into());
        self.reserved.insert(name);
    }

    /// Overlay request fields. Reserved names, and names the environment
    /// cannot carry, are skipped.
    pub fn merge<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in overrides {
            if self.reserved.contains(&name) {
                warn!(parameter = %name, "ignoring request value for reserved parameter");
                continue;
            }
            if !is_env_name(&name) || value.contains('\0') {
                warn!(parameter = %name, "ignoring parameter that cannot be passed through the environment");
                continue;
            }
            debug!(parameter = %name, %value, "parameter set");
            self.values.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Owned copy taken at launch time.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.clone()
    }
}

/// Whether `name` can be set as an environment variable name.
pub(crate) fn is_env_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['=', '\0'])
}

/// Keep the environment pairs that are valid UTF-8. The rest are logged and
/// skipped; `std::env::vars` would panic on them.
pub fn unicode_env<I>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => Some((name, value)),
            (Ok(name), Err(_)) => {
                warn!(variable = %name, "skipping environment variable with a non-UTF-8 value");
                None
            }
            (Err(name), _) => {
                warn!(variable = %name.to_string_lossy(), "skipping environment variable with a non-UTF-8 name");
                None
            }
        })
        .collect()
}
