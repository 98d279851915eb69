/*!
 * Location strings.
 *
 * A location says which channel a device is reached through:
 *
 * ```text
 * port:/dev/ttyUSB0        serial device
 * ip:10.0.0.20:4001        TCP host with optional port
 * ip:[fe80::1]:23          bracketed IPv6 literal
 * /run/matrix.sock         local duplex channel (no prefix)
 * ```
 *
 * Parsing is purely syntactic. Whether a serial path exists is only known at
 * call time, against the live port list, see [`is_valid_location`].
 */
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use thiserror::Error;

use crate::transport::ports::PortInfo;

/// Prefix of serial locations
pub const SERIAL_PREFIX: &str = "port:";
/// Prefix of network locations
pub const NETWORK_PREFIX: &str = "ip:";

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// A classified location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// An OS serial device, e.g. `/dev/ttyS0` or `COM3`
    Serial {
        /// Device path, opaque to the parser
        path: String,
    },
    /// A TCP endpoint
    Network {
        /// Hostname, IPv4 or IPv6 literal (without brackets)
        host: String,
        /// Explicit port, if the location carried one
        port: Option<u16>,
    },
    /// A named local duplex channel (Unix socket or Windows named pipe)
    Local {
        /// Socket or pipe path
        path: String,
    },
}

/// Why a location string was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The string does not match any location grammar
    #[error("malformed location {0:?}")]
    Malformed(String),
    /// The serial path is not among the currently attached ports
    #[error("serial port {0:?} is not connected")]
    UnknownPort(String),
}

impl Location {
    /// Parse a location string, returning `None` if it is malformed.
    pub fn parse(value: &str) -> Option<Location> {
        if let Some(path) = value.strip_prefix(SERIAL_PREFIX) {
            if path.is_empty() {
                return None;
            }
            return Some(Location::Serial {
                path: path.to_string(),
            });
        }

        if let Some(rest) = value.strip_prefix(NETWORK_PREFIX) {
            let (host, port) = parse_host_port(rest)?;
            return Some(Location::Network { host, port });
        }

        if value.is_empty() || has_unknown_scheme(value) {
            return None;
        }
        Some(Location::Local {
            path: value.to_string(),
        })
    }

    /// Short name of the transport kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Location::Serial { .. } => "serial",
            Location::Network { .. } => "network",
            Location::Local { .. } => "local",
        }
    }

    /// The network port, or `default` when the location carries none.
    ///
    /// Returns `None` for non-network locations.
    pub fn port_or(&self, default: u16) -> Option<u16> {
        match self {
            Location::Network { port, .. } => Some(port.unwrap_or(default)),
            _ => None,
        }
    }
}

impl FromStr for Location {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::parse(s).ok_or_else(|| LocationError::Malformed(s.to_string()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Serial { path } => write!(f, "{}{}", SERIAL_PREFIX, path),
            Location::Network { host, port } => {
                let host_is_v6 = host.contains(':');
                match (host_is_v6, port) {
                    (true, Some(port)) => write!(f, "{}[{}]:{}", NETWORK_PREFIX, host, port),
                    (true, None) => write!(f, "{}[{}]", NETWORK_PREFIX, host),
                    (false, Some(port)) => write!(f, "{}{}:{}", NETWORK_PREFIX, host, port),
                    (false, None) => write!(f, "{}{}", NETWORK_PREFIX, host),
                }
            }
            Location::Local { path } => write!(f, "{}", path),
        }
    }
}

/// Parse a location against the ports attached right now.
///
/// Serial locations must name a port from `known_ports`; network locations
/// must be syntactically valid. No DNS lookup or connection attempt is made.
pub fn validate_location(value: &str, known_ports: &[PortInfo]) -> Result<Location, LocationError> {
    let location = value.parse::<Location>()?;
    if let Location::Serial { path } = &location {
        if !known_ports.iter().any(|port| &port.path == path) {
            return Err(LocationError::UnknownPort(path.clone()));
        }
    }
    Ok(location)
}

/// Boolean form of [`validate_location`].
pub fn is_valid_location(value: &str, known_ports: &[PortInfo]) -> bool {
    validate_location(value, known_ports).is_ok()
}

/// `scheme:` prefixes other than ours make a bare path invalid (`file:`, `tcp:`).
/// Single letters are left alone so `C:\...` stays a local path.
fn has_unknown_scheme(value: &str) -> bool {
    match value.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() >= 2
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

fn parse_host_port(value: &str) -> Option<(String, Option<u16>)> {
    if value.is_empty() {
        return None;
    }

    // [v6] or [v6]:port
    if let Some(rest) = value.strip_prefix('[') {
        let (inner, after) = rest.split_once(']')?;
        inner.parse::<Ipv6Addr>().ok()?;
        let port = match after {
            "" => None,
            _ => Some(parse_port(after.strip_prefix(':')?)?),
        };
        return Some((inner.to_string(), port));
    }

    // Two or more colons can only be a bare IPv6 literal, which never carries a port.
    if value.matches(':').count() >= 2 {
        value.parse::<Ipv6Addr>().ok()?;
        return Some((value.to_string(), None));
    }

    let (host, port) = match value.split_once(':') {
        Some((host, port)) => (host, Some(parse_port(port)?)),
        None => (value, None),
    };

    if is_ipv4(host) || is_hostname(host) {
        Some((host.to_string(), port))
    } else {
        None
    }
}

fn parse_port(value: &str) -> Option<u16> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match value.parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

/// Strict dotted decimal: four octets, 0-255, no leading zeros.
fn is_ipv4(value: &str) -> bool {
    let octets: Vec<&str> = value.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|octet| {
            !octet.is_empty()
                && octet.len() <= 3
                && octet.bytes().all(|b| b.is_ascii_digit())
                && (octet.len() == 1 || !octet.starts_with('0'))
                && octet.parse::<u16>().map_or(false, |n| n <= 255)
        })
}

/// RFC 952/1123 hostname, with unicode letters and digits allowed in labels.
fn is_hostname(value: &str) -> bool {
    let value = value.strip_suffix('.').unwrap_or(value);
    if value.is_empty() || value.chars().count() > MAX_HOSTNAME_LEN {
        return false;
    }

    let labels: Vec<&str> = value.split('.').collect();
    let labels_ok = labels.iter().all(|label| {
        let len = label.chars().count();
        (1..=MAX_LABEL_LEN).contains(&len)
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    });

    // A numeric final label means the caller meant an IPv4 address.
    let last_is_numeric = labels
        .last()
        .map_or(true, |label| label.bytes().all(|b| b.is_ascii_digit()));

    labels_ok && !last_is_numeric
}
