// MCAST-RECV — SESSION MODULE
// Startup sequence (open → options → bind → join) and the receive loop.

use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::Args;
use crate::socket::{McastSocket, RecvOutcome, DATAGRAM_MAX};

/// Validated configuration, immutable once built.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub group: Ipv4Addr,
    pub port: u16,
    pub interface: Ipv4Addr,
    pub quiet: bool,
    pub timestamping: bool,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Config {
            group: args.endpoint.group,
            port: args.endpoint.port,
            interface: args.endpoint.interface,
            quiet: args.quiet,
            timestamping: args.timestamp,
        }
    }
}

/// Running totals, mutated only by the receive loop. Both counters wrap at
/// u32::MAX rather than saturating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub bytes: u32,
    pub packets: u32,
}

/// Why the receive loop stopped.
#[derive(Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown flag was raised (SIGINT, or a test pulling the flag).
    Interrupted,
    /// A zero-byte receive ended the loop.
    Closed,
    /// An unclassified receive error ended the loop.
    Fatal,
}

/// One multicast receive session: the socket plus its counters.
pub struct Session {
    socket: McastSocket,
    counters: Counters,
    quiet: bool,
    out: Box<dyn Write + Send>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("socket", &self.socket)
            .field("counters", &self.counters)
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Run the startup sequence. Every mandatory step failure carries the
    /// step name plus the OS error; enabling timestamping is best effort.
    pub fn establish(config: &Config) -> Result<Session> {
        let socket = McastSocket::open().context("Error opening socket")?;

        socket
            .set_reuse_addr()
            .context("Error adding socket option: SO_REUSEADDR")?;
        socket
            .set_reuse_port()
            .context("Error adding socket option: SO_REUSEPORT")?;

        if config.timestamping {
            if let Err(err) = socket.enable_hw_timestamping() {
                eprintln!("Error adding socket option: SO_TIMESTAMPING");
                eprintln!("{err}");
                eprintln!("Continuing...");
            }
        }

        socket
            .bind(Ipv4Addr::UNSPECIFIED, config.port)
            .with_context(|| format!("Error on binding port {}", config.port))?;
        socket
            .join_group(config.group, config.interface)
            .with_context(|| {
                format!(
                    "ERROR could not create multicast membership for group {} on interface {}",
                    config.group, config.interface
                )
            })?;

        info!(
            group = %config.group,
            port = config.port,
            interface = %config.interface,
            "joined multicast group"
        );

        Ok(Session {
            socket,
            counters: Counters::default(),
            quiet: config.quiet,
            out: Box::new(io::stdout()),
        })
    }

    /// Redirect the loop's per-packet output. The CLI leaves it on stdout;
    /// tests capture it to assert the quiet-mode contract.
    pub fn set_output(&mut self, out: Box<dyn Write + Send>) {
        self.out = out;
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Hand the underlying socket to callers that need pre-loop tweaks
    /// (tests set a read timeout so termination does not depend on traffic).
    pub fn socket(&self) -> &McastSocket {
        &self.socket
    }

    /// Blocking receive loop. Checks `shutdown` at the top of every
    /// iteration; retryable receive errors (including the EINTR a SIGINT
    /// produces) loop back to that check without touching the counters.
    ///
    /// A signal landing between the flag check and the `recv` entry is
    /// consumed before the call blocks, so with no traffic the interrupt is
    /// only noticed on the next datagram or the next signal. Accepted cost
    /// of the cancellation-flag model; closing the window would take a
    /// masked-signal `ppoll` in front of every receive.
    pub fn run(&mut self, shutdown: &AtomicBool) -> StopReason {
        let mut buf = [0u8; DATAGRAM_MAX];

        loop {
            if shutdown.load(Ordering::Relaxed) {
                return StopReason::Interrupted;
            }

            match self.socket.recv(&mut buf) {
                RecvOutcome::Data(n) => {
                    self.counters.bytes = self.counters.bytes.wrapping_add(n as u32);
                    self.counters.packets = self.counters.packets.wrapping_add(1);
                    if !self.quiet {
                        let _ = writeln!(self.out, "Got: {} bytes", n);
                    }
                    let _ = writeln!(self.out, "Message: {}", String::from_utf8_lossy(&buf[..n]));
                }
                RecvOutcome::Retryable => continue,
                RecvOutcome::Closed => return StopReason::Closed,
                RecvOutcome::Fatal(err) => {
                    warn!("receive failed: {err}");
                    return StopReason::Fatal;
                }
            }
        }
    }
}

/// Final statistics, on stderr, in the fixed report format.
pub fn report(counters: Counters) {
    eprintln!("Received {} bytes", counters.bytes);
    eprintln!("Received {} packets", counters.packets);
}
