use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PolicyType {
    #[serde(rename = "BOP", alias = "bop")]
    Bop,
    #[serde(rename = "GL", alias = "gl")]
    Gl,
    #[serde(rename = "WC", alias = "wc")]
    Wc,
}

impl PolicyType {
    pub const ALL: [PolicyType; 3] = [PolicyType::Bop, PolicyType::Gl, PolicyType::Wc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bop => "BOP",
            Self::Gl => "GL",
            Self::Wc => "WC",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BOP" => Some(Self::Bop),
            "GL" => Some(Self::Gl),
            "WC" => Some(Self::Wc),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Bop => "Business Owners Policy",
            Self::Gl => "General Liability",
            Self::Wc => "Workers' Compensation",
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| {
            DomainError::Validation(format!(
                "unsupported policy type `{}` (expected BOP|GL|WC)",
                value.trim()
            ))
        })
    }
}
