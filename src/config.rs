//! Module for the flat key-value configuration the pipeline is driven by.
//!
//! The file uses the Java `.properties` layout: `key=value`, `key: value` or `key value`, one entry per
//! line, `#` and `!` start comments, a trailing backslash continues the value on the next line.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Error;

/// Key namespaces consumed by this crate, never forwarded to the broker client
const OWN_NAMESPACES: [&str; 2] = ["topic.", "dry.run."];

/// Keys only meaningful to the JVM Kafka client. Shared config files carry them, librdkafka rejects them.
const JVM_CLIENT_KEYS: [&str; 4] = [
    "key.serializer",
    "value.serializer",
    "sasl.jaas.config",
    "max.block.ms",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        let mut lines = text.lines();

        while let Some(line) = lines.next() {
            let mut logical = line.trim_start().to_string();
            if logical.is_empty() || logical.starts_with('#') || logical.starts_with('!') {
                continue;
            }
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some(next) => logical.push_str(next.trim_start()),
                    None => break,
                }
            }

            let (key, value) = split_entry(&logical);
            entries.insert(key.to_string(), value.to_string());
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// The value of `key` unless it is absent or blank
    pub fn non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Entries meant for the broker client: everything but this crate's own keys and JVM-only keys
    pub fn client_settings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(key, _)| {
                !OWN_NAMESPACES.iter().any(|ns| key.starts_with(ns))
                    && !JVM_CLIENT_KEYS.contains(&key.as_str())
            })
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// an odd number of trailing backslashes continues the line, an even number is escaped backslashes
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let line = line.trim_end();
    match line.find(['=', ':', ' ', '\t']) {
        Some(pos) => {
            let key = &line[..pos];
            let rest = line[pos..].trim_start();
            // `key = value` puts whitespace before the actual separator
            let value = rest
                .strip_prefix(['=', ':'])
                .map(str::trim_start)
                .unwrap_or(rest);
            (key, value)
        }
        None => (line, ""),
    }
}
