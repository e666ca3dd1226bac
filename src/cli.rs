// MCAST-RECV — CLI MODULE
// Flag surface and the group:port[:interface] endpoint grammar.
// Everything here fails before a socket exists.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use clap::Parser;

/// Receive data from a given multicast group
#[derive(Parser, Debug)]
#[command(name = "mcast_recv")]
pub struct Args {
    /// The multicast group and port with an optional interface IP address
    #[arg(value_name = "group:port[:interface]")]
    pub endpoint: Endpoint,

    /// Quiet, suppress output of the number of bytes received from each packet
    #[arg(short)]
    pub quiet: bool,

    /// Turn on hardware stamping
    #[arg(short)]
    pub timestamp: bool,
}

/// A parsed `group:port[:interface]` token. Absence of the third token means
/// "let the OS choose the interface" (the wildcard address). Tokens past the
/// third are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub group: Ipv4Addr,
    pub port: u16,
    pub interface: Ipv4Addr,
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split(':');

        let group = tokens
            .next()
            .filter(|tok| !tok.is_empty())
            .ok_or(EndpointParseError::MissingGroup)?
            .parse::<Ipv4Addr>()
            .map_err(|_| EndpointParseError::BadGroup)?;

        let port = tokens
            .next()
            .ok_or(EndpointParseError::MissingPort)?
            .parse::<u16>()
            .map_err(|_| EndpointParseError::BadPort)?;

        let interface = match tokens.next() {
            Some(tok) => tok
                .parse::<Ipv4Addr>()
                .map_err(|_| EndpointParseError::BadInterface)?,
            None => Ipv4Addr::UNSPECIFIED,
        };

        Ok(Endpoint { group, port, interface })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointParseError {
    MissingGroup,
    BadGroup,
    MissingPort,
    BadPort,
    BadInterface,
}

impl fmt::Display for EndpointParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            EndpointParseError::MissingGroup => "missing multicast group address",
            EndpointParseError::BadGroup => "multicast group is not a dotted-quad IPv4 address",
            EndpointParseError::MissingPort => "expected group:port[:interface]",
            EndpointParseError::BadPort => "port is not a number in 0..=65535",
            EndpointParseError::BadInterface => "interface is not a dotted-quad IPv4 address",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for EndpointParseError {}
