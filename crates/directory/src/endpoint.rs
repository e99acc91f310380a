//! Directory endpoint addressing.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// One directory server address. List order defines failover priority; the
/// first endpoint is always tried first on every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectoryEndpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for DirectoryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A `host:port` pair that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid directory endpoint {input:?}: {reason}")]
pub struct EndpointParseError {
    pub input: String,
    pub reason: String,
}

impl FromStr for DirectoryEndpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let Some((host, port)) = trimmed.split_once(':') else {
            return Err(EndpointParseError {
                input: s.to_owned(),
                reason: "expected host:port".into(),
            });
        };
        if host.is_empty() {
            return Err(EndpointParseError {
                input: s.to_owned(),
                reason: "empty host".into(),
            });
        }
        let port = port.parse().map_err(|_| EndpointParseError {
            input: s.to_owned(),
            reason: format!("invalid port {port:?}"),
        })?;
        Ok(Self {
            host: host.to_owned(),
            port,
        })
    }
}

/// Parse the configured comma-separated endpoint list, e.g.
/// `"ldap-1:1389,ldap-2:1389"`.
pub fn parse_endpoint_list(list: &str) -> Result<Vec<DirectoryEndpoint>, EndpointParseError> {
    let endpoints: Vec<DirectoryEndpoint> = list
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()?;
    if endpoints.is_empty() {
        return Err(EndpointParseError {
            input: list.to_owned(),
            reason: "no endpoints configured".into(),
        });
    }
    Ok(endpoints)
}
