//! Reporting month parameter

use std::fmt;

use crate::error::{ReportError, Result};

/// A calendar month, 1 through 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(u8);

impl Month {
    pub fn new(month: i64) -> Result<Self> {
        if (1..=12).contains(&month) {
            Ok(Self(month as u8))
        } else {
            Err(invalid(month.to_string()))
        }
    }

    /// Parse a month from user input. Anything but a plain integer in range is rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let value: i64 = trimmed.parse().map_err(|_| invalid(trimmed.to_string()))?;
        Self::new(value)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn as_i64(self) -> i64 {
        i64::from(self.0)
    }
}

fn invalid(value: String) -> ReportError {
    ReportError::InvalidParameter {
        name: "month",
        value,
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
