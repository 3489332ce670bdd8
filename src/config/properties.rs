//! Flat environment property access
//!
//! Pipeline plugins receive structured options flattened into environment
//! variables: lists become `NAME`, `NAME_0`, `NAME_1`, ... and maps become
//! `NAME_<KEY>`. [`PropertyReader`] reads them back from an [`Environment`]
//! snapshot taken once at startup.

use std::collections::BTreeMap;

/// Prefix shared by every plugin option
pub const PLUGIN_PREFIX: &str = "BUILDKITE_PLUGIN_DOCKER_ECR_CACHE_";

/// Immutable snapshot of the process environment
///
/// Backed by a sorted map so that iteration order is the lexical order of
/// variable names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Capture the current process environment
    ///
    /// Variables that are not valid unicode are skipped.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Iterate over all variables whose names start with `prefix`, in lexical order
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.vars
            .range(prefix.to_string()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Reads plugin options out of an [`Environment`]
#[derive(Debug, Clone, Copy)]
pub struct PropertyReader<'a> {
    env: &'a Environment,
    prefix: &'a str,
}

impl<'a> PropertyReader<'a> {
    /// Reader for options under [`PLUGIN_PREFIX`]
    pub fn new(env: &'a Environment) -> Self {
        Self::with_prefix(env, PLUGIN_PREFIX)
    }

    /// Reader for options under a custom prefix
    pub fn with_prefix(env: &'a Environment, prefix: &'a str) -> Self {
        Self { env, prefix }
    }

    fn name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Read a single value
    pub fn read_scalar(&self, key: &str) -> Option<String> {
        self.env.get(&self.name(key)).map(str::to_string)
    }

    /// Read a list value
    ///
    /// The bare `KEY` comes first, then every `KEY_<digits>` in lexical
    /// order of the full variable name (so `KEY_10` precedes `KEY_2`).
    pub fn read_list(&self, key: &str) -> Vec<String> {
        let name = self.name(key);
        let indexed_prefix = format!("{}_", name);

        let mut values: Vec<String> = self.env.get(&name).map(str::to_string).into_iter().collect();
        values.extend(
            self.env
                .with_prefix(&indexed_prefix)
                .filter(|(k, _)| is_index(&k[indexed_prefix.len()..]))
                .map(|(_, v)| v.to_string()),
        );
        values
    }

    /// Read a map value from `KEY_<NAME>` variables
    ///
    /// Numeric suffixes belong to lists and are ignored.
    pub fn read_map(&self, key: &str) -> BTreeMap<String, String> {
        let map_prefix = format!("{}_", self.name(key));
        self.env
            .with_prefix(&map_prefix)
            .map(|(k, v)| (&k[map_prefix.len()..], v))
            .filter(|(suffix, _)| !suffix.is_empty() && !is_index(suffix))
            .map(|(suffix, v)| (suffix.to_string(), v.to_string()))
            .collect()
    }
}

fn is_index(suffix: &str) -> bool {
    !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit())
}
