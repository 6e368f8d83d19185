//! Device-under-test handle.

use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SSH_USER: &str = "root";
pub const DEFAULT_SSH_PORT: u16 = 22;

/// An SSH-reachable DUT.
///
/// Accepted forms: `host`, `host:port`, `user@host[:port]` and
/// `ssh://[user@]host[:port]`. IPv6 hosts are written bare (`::1`) or in
/// brackets when a port follows (`[fe80::1]:2222`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// The address exactly as given, minus any `ssh://` scheme.
    pub raw: String,
    pub user: String,
    pub hostname: String,
    pub port: u16,
}

impl Device {
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let trimmed = input.trim();
        let raw = trimmed.strip_prefix("ssh://").unwrap_or(trimmed);
        if raw.is_empty() || raw.contains('/') {
            return Err(ConfigError::InvalidDevice(input.to_string()));
        }

        let (user, host_port) = match raw.split_once('@') {
            Some((user, rest)) if !user.is_empty() => (user.to_string(), rest),
            Some(_) => return Err(ConfigError::InvalidDevice(input.to_string())),
            None => (DEFAULT_SSH_USER.to_string(), raw),
        };

        let invalid = || ConfigError::InvalidDevice(input.to_string());
        let parse_port = |port: &str| port.parse::<u16>().map_err(|_| invalid());

        let (hostname, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
            // [v6addr] or [v6addr]:port
            let (host, rest) = bracketed.split_once(']').ok_or_else(invalid)?;
            let port = match rest {
                "" => DEFAULT_SSH_PORT,
                _ => parse_port(rest.strip_prefix(':').ok_or_else(invalid)?)?,
            };
            (host.to_string(), port)
        } else if host_port.matches(':').count() > 1 {
            // Bare IPv6 address; a port needs the bracketed form.
            (host_port.to_string(), DEFAULT_SSH_PORT)
        } else {
            match host_port.split_once(':') {
                Some((host, port)) => (host.to_string(), parse_port(port)?),
                None => (host_port.to_string(), DEFAULT_SSH_PORT),
            }
        };

        if hostname.is_empty() {
            return Err(ConfigError::InvalidDevice(input.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            user,
            hostname,
            port,
        })
    }

    /// `user@hostname`, as ssh expects it.
    pub fn login(&self) -> String {
        format!("{}@{}", self.user, self.hostname)
    }

    /// Hostname with IPv6 addresses wrapped in brackets.
    pub fn host_literal(&self) -> String {
        if self.hostname.contains(':') {
            format!("[{}]", self.hostname)
        } else {
            self.hostname.clone()
        }
    }

    /// `user@host:path` for scp.
    pub fn scp_location(&self, path: &str) -> String {
        format!("{}@{}:{}", self.user, self.host_literal(), path)
    }

    /// Address handed to `test_that`: the host, plus the port when it isn't 22.
    pub fn harness_address(&self) -> String {
        if self.port == DEFAULT_SSH_PORT {
            self.host_literal()
        } else {
            format!("{}:{}", self.host_literal(), self.port)
        }
    }
}

impl FromStr for Device {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Device::parse(s)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
