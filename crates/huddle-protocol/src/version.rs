//! Protocol versioning for the bus.
//!
//! The client offers every STOMP version it understands in `accept-version`
//! and adopts whatever the broker answers in `CONNECTED`.

use crate::codec::ProtocolError;

/// Versions the client can speak, oldest first.
pub const SUPPORTED_VERSIONS: [Version; 3] =
    [Version::new(1, 0), Version::new(1, 1), Version::new(1, 2)];

/// Version assumed before the broker has answered.
pub const PROTOCOL_VERSION: Version = Version::new(1, 2);

/// A STOMP `major.minor` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    #[must_use]
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Parse a `major.minor` string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not two dot-separated integers.
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        let invalid = || ProtocolError::Invalid(format!("bad version {value:?}"));
        let (major, minor) = value.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }

    /// Whether this version is one the client implements.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        SUPPORTED_VERSIONS.contains(self)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Default for Version {
    fn default() -> Self {
        PROTOCOL_VERSION
    }
}

/// Value for the `accept-version` header of `CONNECT`.
#[must_use]
pub fn accept_version_header() -> String {
    SUPPORTED_VERSIONS
        .iter()
        .map(Version::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Resolve the version a broker chose in its `CONNECTED` frame.
///
/// A missing header means a STOMP 1.0 broker.
///
/// # Errors
///
/// Returns an error if the broker picked a version the client does not speak.
pub fn negotiate(connected_version: Option<&str>) -> Result<Version, ProtocolError> {
    let version = match connected_version {
        Some(v) => Version::parse(v)?,
        None => Version::new(1, 0),
    };

    if !version.is_supported() {
        return Err(ProtocolError::Invalid(format!(
            "broker chose unsupported version {version}"
        )));
    }

    Ok(version)
}
