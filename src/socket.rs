// MCAST-RECV — SOCKET MODULE
// The one UDP socket the program owns: creation, platform options, bind,
// group membership, and a classified blocking receive.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::debug;

/// Fixed receive buffer ceiling: one Ethernet-MTU-sized datagram.
pub const DATAGRAM_MAX: usize = 1500;

/// Outcome of one blocking receive call.
///
/// A zero-byte return maps to [`RecvOutcome::Closed`] and terminates the
/// receive loop. That conflates "peer closed" with a legitimately empty
/// datagram, and is inherited behavior — do not reinterpret it as "keep
/// looping" without checking every caller.
#[derive(Debug)]
pub enum RecvOutcome {
    /// `n > 0` bytes landed in the buffer.
    Data(usize),
    /// The receive call returned zero bytes.
    Closed,
    /// EAGAIN / EWOULDBLOCK / ETIMEDOUT / EINTR — retry without counting.
    Retryable,
    /// Anything else — the caller should stop receiving.
    Fatal(io::Error),
}

/// Owner of the UDP socket descriptor. `Some` is Open, `None` is Closed;
/// option-setting, bind, join, and recv are valid only while Open and each
/// fails independently without changing that state. The descriptor is
/// released on [`close`](Self::close) or drop, on every exit path.
#[derive(Debug)]
pub struct McastSocket {
    sock: Option<Socket>,
}

impl McastSocket {
    /// Create a UDP/IPv4 socket.
    pub fn open() -> io::Result<Self> {
        let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        Ok(McastSocket { sock: Some(sock) })
    }

    pub fn is_open(&self) -> bool {
        self.sock.is_some()
    }

    fn handle(&self) -> io::Result<&Socket> {
        self.sock
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket is closed"))
    }

    /// SO_REUSEADDR, so repeated runs can rebind the port immediately.
    pub fn set_reuse_addr(&self) -> io::Result<()> {
        self.handle()?.set_reuse_address(true)
    }

    /// SO_REUSEPORT, so multiple receivers can share the port. Whether the
    /// target has the option is decided at compile time; where it does not
    /// exist this is a no-op success.
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    pub fn set_reuse_port(&self) -> io::Result<()> {
        self.handle()?.set_reuse_port(true)
    }

    #[cfg(not(all(unix, not(any(target_os = "solaris", target_os = "illumos")))))]
    pub fn set_reuse_port(&self) -> io::Result<()> {
        self.handle().map(|_| ())
    }

    /// SO_TIMESTAMPING with hardware-RX flags. Best effort: NICs and
    /// non-Linux targets commonly refuse this, and callers are expected to
    /// continue without it.
    #[cfg(target_os = "linux")]
    pub fn enable_hw_timestamping(&self) -> io::Result<()> {
        let fd = self.handle()?.as_raw_fd();
        let flags: libc::c_int =
            (libc::SOF_TIMESTAMPING_RX_HARDWARE | libc::SOF_TIMESTAMPING_RAW_HARDWARE) as libc::c_int;
        // SAFETY: FFI call with a valid fd (handle() checked Open) and a
        // pointer/size pair describing a live c_int.
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_TIMESTAMPING,
                &flags as *const libc::c_int as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        debug!("SO_TIMESTAMPING enabled (flags {:#x})", flags);
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn enable_hw_timestamping(&self) -> io::Result<()> {
        self.handle()?;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "SO_TIMESTAMPING is not available on this platform",
        ))
    }

    /// Optional receive deadline. The CLI never sets one (the loop is meant
    /// to block indefinitely without traffic); a timed-out receive surfaces
    /// as [`RecvOutcome::Retryable`].
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.handle()?.set_read_timeout(timeout)
    }

    /// Bind to `(addr, port)`.
    pub fn bind(&self, addr: Ipv4Addr, port: u16) -> io::Result<()> {
        let local = SocketAddrV4::new(addr, port);
        self.handle()?.bind(&SockAddr::from(local))
    }

    /// Local address after bind (the real port when bound to port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.handle()?.local_addr()?.as_socket().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "non-inet local address")
        })
    }

    /// IP_ADD_MEMBERSHIP for `group`, restricted to `interface`; the
    /// wildcard interface lets the OS pick one.
    pub fn join_group(&self, group: Ipv4Addr, interface: Ipv4Addr) -> io::Result<()> {
        self.handle()?.join_multicast_v4(&group, &interface)
    }

    /// One blocking receive into `buf`, classified per [`RecvOutcome`].
    pub fn recv(&self, buf: &mut [u8]) -> RecvOutcome {
        let sock = match self.handle() {
            Ok(sock) => sock,
            Err(err) => return RecvOutcome::Fatal(err),
        };
        // SAFETY: FFI call; fd is valid while `self.sock` is Some, and the
        // pointer/len pair comes from a live mutable slice.
        let n = unsafe {
            libc::recv(
                sock.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        };
        match n {
            n if n > 0 => RecvOutcome::Data(n as usize),
            0 => RecvOutcome::Closed,
            _ => {
                let err = io::Error::last_os_error();
                match err.kind() {
                    io::ErrorKind::WouldBlock
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted => RecvOutcome::Retryable,
                    _ => RecvOutcome::Fatal(err),
                }
            }
        }
    }

    /// Release the descriptor. Idempotent; dropping the handle does the same.
    pub fn close(&mut self) {
        self.sock = None;
    }
}
