//! Types shared by endpoint resolution and transfer verification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Addresses and ports of a network service, as resolved from the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub cluster_ip: Option<String>,
    pub external_ip: Option<String>,
    /// First declared port; zero when the service declares none
    pub port: i32,
    /// Ports declared after the first one
    pub extra_ports: Vec<i32>,
}

impl ServiceEndpoint {
    /// `ip:port` pairs worth attempting, labelled by which address they use.
    pub fn targets(&self) -> Vec<(&'static str, String)> {
        let mut targets = Vec::with_capacity(2);
        if let Some(ip) = self.cluster_ip.as_deref().filter(|ip| !ip.is_empty()) {
            targets.push(("cluster", format!("{ip}:{}", self.port)));
        }
        if let Some(ip) = self.external_ip.as_deref().filter(|ip| !ip.is_empty()) {
            targets.push(("external", format!("{ip}:{}", self.port)));
        }
        targets
    }
}

/// How much of an endpoint could be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coverage {
    /// Both addresses and a clean port list
    Full,
    /// Some addresses or ports are missing or unusable, but a transfer can run
    Partial,
    /// Nothing to transfer from
    None,
}

/// A resolved endpoint together with what is wrong with it, if anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub service: String,
    pub endpoint: ServiceEndpoint,
    pub coverage: Coverage,
    /// Extra ports that are not usable (≤ 0); these fail the check
    pub invalid_extra_ports: Vec<i32>,
}

/// Content digest of one artifact at one instant.
///
/// Always 32 lowercase hexadecimal characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactDigest(String);

impl ArtifactDigest {
    pub const LEN: usize = 32;

    /// Accept `hex` only if it has the exact digest shape.
    pub fn parse(hex: &str) -> Option<Self> {
        let valid = hex.len() == Self::LEN
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hex.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transfer mode requested from the legacy protocol client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    Octet,
    Netascii,
}

impl TransferMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Octet => "octet",
            Self::Netascii => "netascii",
        }
    }
}

impl std::str::FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "octet" => Ok(Self::Octet),
            "netascii" => Ok(Self::Netascii),
            other => Err(format!("unknown transfer mode: {other}")),
        }
    }
}
