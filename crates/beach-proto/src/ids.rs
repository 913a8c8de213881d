//! Identifiers and addressing primitives shared across the cluster.
//!
//! `Realm` and `Category` are plain string newtypes; `Uid` is the globally
//! unique actor identifier minted by a node controller at spawn time, and
//! `Endpoint` is the `tcp://ip:port` address an actor's reply socket binds to.

// Layer 1: Standard library imports
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Default realm used when a caller does not specify one.
pub const DEFAULT_REALM: &str = "global";

/// A namespace partitioning the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Realm(String);

impl Realm {
    /// The default realm, `"global"`.
    pub fn default_realm() -> Self {
        Self(DEFAULT_REALM.to_string())
    }

    /// Wrap an arbitrary realm name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::default_realm()
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Realm {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Realm {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A label grouping interchangeable actors within a realm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Globally unique identifier for an actor, minted by the owning node
/// controller at spawn time.
///
/// Rendered on the wire as a plain UUID string (§3 `ActorId (uid)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(Uuid);

impl Uid {
    /// Mint a fresh, random uid.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Uid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The transport address of an actor's reply socket: `tcp://<ip>:<port>`.
///
/// Kept structured (not a bare string) so consumers such as the cluster
/// client's affinity strategy never resort to positional string splitting —
/// see the REDESIGN FLAGS note on `beach_api.py`'s endpoint parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    ip: IpAddr,
    port: u16,
}

impl Endpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The host portion of the endpoint, e.g. `192.168.1.4`.
    ///
    /// Used by affinity-by-node strategies instead of splitting the rendered
    /// `tcp://ip:port` string.
    pub fn host(&self) -> IpAddr {
        self.ip
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp://{}:{}", self.ip, self.port)
    }
}

/// Error returned when parsing a malformed `tcp://ip:port` endpoint string.
#[derive(Debug, thiserror::Error)]
#[error("invalid endpoint string: {0}")]
pub struct EndpointParseError(String);

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("tcp://")
            .ok_or_else(|| EndpointParseError(s.to_string()))?;
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError(s.to_string()))?;
        let ip: IpAddr = host
            .parse()
            .map_err(|_| EndpointParseError(s.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| EndpointParseError(s.to_string()))?;
        Ok(Self::new(ip, port))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(value: Endpoint) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realm_defaults_to_global() {
        assert_eq!(Realm::default().as_str(), "global");
    }

    #[test]
    fn uid_roundtrips_through_string() {
        let uid = Uid::new();
        let s = uid.to_string();
        let parsed: Uid = s.parse().expect("valid uid");
        assert_eq!(uid, parsed);
    }

    #[test]
    fn uids_are_unique() {
        assert_ne!(Uid::new(), Uid::new());
    }

    #[test]
    fn endpoint_display_and_parse_roundtrip() {
        let ep = Endpoint::new("10.0.0.5".parse().unwrap(), 5001);
        let rendered = ep.to_string();
        assert_eq!(rendered, "tcp://10.0.0.5:5001");
        let parsed: Endpoint = rendered.parse().expect("valid endpoint");
        assert_eq!(parsed, ep);
    }

    #[test]
    fn endpoint_host_is_structured_not_split() {
        let ep: Endpoint = "tcp://192.168.1.9:6000".parse().unwrap();
        assert_eq!(ep.host(), "192.168.1.9".parse::<IpAddr>().unwrap());
        assert_eq!(ep.port(), 6000);
    }

    #[test]
    fn endpoint_rejects_malformed_strings() {
        assert!("nope".parse::<Endpoint>().is_err());
        assert!("tcp://not-an-ip:80".parse::<Endpoint>().is_err());
    }
}
