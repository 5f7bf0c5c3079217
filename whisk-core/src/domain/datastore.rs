//! Datastore and code package types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of artifact datastore a flow is configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatastoreKind {
    Local,
    S3,
    Azure,
    Gs,
}

impl DatastoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::S3 => "s3",
            Self::Azure => "azure",
            Self::Gs => "gs",
        }
    }

    /// Whether remote tasks can fetch code packages from this datastore
    pub fn is_remote_capable(&self) -> bool {
        matches!(self, Self::S3 | Self::Azure)
    }
}

impl fmt::Display for DatastoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatastoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            "azure" => Ok(Self::Azure),
            "gs" => Ok(Self::Gs),
            other => Err(format!("unknown datastore kind '{}'", other)),
        }
    }
}

/// Location and checksum of an uploaded code package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub url: String,
    pub sha: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("S3".parse::<DatastoreKind>(), Ok(DatastoreKind::S3));
        assert_eq!("azure".parse::<DatastoreKind>(), Ok(DatastoreKind::Azure));
        assert!("ftp".parse::<DatastoreKind>().is_err());
        assert_eq!(DatastoreKind::Gs.to_string(), "gs");
    }

    #[test]
    fn test_remote_capable_kinds() {
        assert!(DatastoreKind::S3.is_remote_capable());
        assert!(DatastoreKind::Azure.is_remote_capable());
        assert!(!DatastoreKind::Local.is_remote_capable());
        assert!(!DatastoreKind::Gs.is_remote_capable());
    }
}
