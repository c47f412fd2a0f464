//! Service keys accepted by the harness.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DispatchError;

/// Every service the harness knows how to check.
///
/// Keys are validated once when they enter the program, so code past the
/// CLI boundary only ever sees one of these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKey {
    Bos,
    Cfs,
    Conman,
    Crus,
    Gitea,
    Ims,
    Ipxe,
    Tftp,
    Vcs,
}

/// The check a key maps to. Several keys are aliases for one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCheck {
    Bos,
    Cfs,
    Conman,
    Crus,
    Ims,
    IpxeTftp,
    Vcs,
}

impl ServiceKey {
    pub const ALL: [Self; 9] = [
        Self::Bos,
        Self::Cfs,
        Self::Conman,
        Self::Crus,
        Self::Gitea,
        Self::Ims,
        Self::Ipxe,
        Self::Tftp,
        Self::Vcs,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bos => "bos",
            Self::Cfs => "cfs",
            Self::Conman => "conman",
            Self::Crus => "crus",
            Self::Gitea => "gitea",
            Self::Ims => "ims",
            Self::Ipxe => "ipxe",
            Self::Tftp => "tftp",
            Self::Vcs => "vcs",
        }
    }

    pub const fn check(self) -> ServiceCheck {
        match self {
            Self::Bos => ServiceCheck::Bos,
            Self::Cfs => ServiceCheck::Cfs,
            Self::Conman => ServiceCheck::Conman,
            Self::Crus => ServiceCheck::Crus,
            Self::Ims => ServiceCheck::Ims,
            Self::Ipxe | Self::Tftp => ServiceCheck::IpxeTftp,
            Self::Vcs | Self::Gitea => ServiceCheck::Vcs,
        }
    }

    /// Space-separated list of every key, for usage messages.
    pub fn supported() -> String {
        Self::ALL
            .iter()
            .map(|key| key.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKey {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == trimmed)
            .ok_or_else(|| DispatchError::UnknownService(trimmed.to_string(), Self::supported()))
    }
}
