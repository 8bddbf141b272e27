//! ARK naming-authority extraction
//!
//! An ARK `id_value` as stored by the log processor looks like `12345/suffix`
//! (the leading `ark:/` has already been split off). The NAAN is everything
//! before the first `/`. Values with no `/`, or with an empty prefix, cannot
//! be attributed to an authority and land in a single `Unparsed` bucket.

use serde::Serialize;
use std::fmt;

/// Label used for ARK values that carry no authority prefix
pub const UNPARSED_LABEL: &str = "(unparsed)";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Naan {
    Authority(String),
    Unparsed,
}

impl Naan {
    pub fn parse(id_value: &str) -> Self {
        match id_value.split_once('/') {
            Some((prefix, _)) if !prefix.is_empty() => Self::Authority(prefix.to_string()),
            _ => Self::Unparsed,
        }
    }

    pub fn authority(&self) -> Option<&str> {
        match self {
            Self::Authority(naan) => Some(naan),
            Self::Unparsed => None,
        }
    }

    pub fn label(&self) -> &str {
        self.authority().unwrap_or(UNPARSED_LABEL)
    }
}

impl fmt::Display for Naan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
