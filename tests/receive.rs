// MCAST-RECV — INTEGRATION TESTS
// Drive the real session loop over loopback sockets: counter accumulation,
// zero-byte termination, shutdown-flag exit, and failing setup steps.
// Sessions bind port 0 and join their group on 127.0.0.1, so no test needs
// a routable network or elevated privileges.

use std::io::Write;
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use mcast_recv::session::{Config, Counters, Session, StopReason};

/// Writer handed to a session so a test can grep the per-packet output the
/// CLI would put on stdout.
#[derive(Clone, Default)]
struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Poll interval for the loop's shutdown check in tests. The CLI blocks
/// indefinitely; tests bound each receive so termination never depends on
/// traffic arriving.
const TEST_RECV_TIMEOUT: Duration = Duration::from_millis(50);

fn loopback_config(group: Ipv4Addr, quiet: bool) -> Config {
    Config {
        group,
        port: 0,
        interface: Ipv4Addr::LOCALHOST,
        quiet,
        timestamping: false,
    }
}

/// Establish a session on an ephemeral port and return it with the address
/// a sender should target.
fn establish(group: Ipv4Addr, quiet: bool) -> (Session, std::net::SocketAddr) {
    let session = Session::establish(&loopback_config(group, quiet)).expect("session setup");
    session
        .socket()
        .set_read_timeout(Some(TEST_RECV_TIMEOUT))
        .expect("read timeout");
    let port = session.socket().local_addr().expect("local addr").port();
    (session, (Ipv4Addr::LOCALHOST, port).into())
}

/// Run the loop on a second thread, returning its stop reason and counters.
fn spawn_loop(
    mut session: Session,
    shutdown: Arc<AtomicBool>,
) -> thread::JoinHandle<(StopReason, Counters)> {
    thread::spawn(move || {
        let reason = session.run(&shutdown);
        (reason, session.counters())
    })
}

#[test]
fn counters_accumulate_until_interrupt() {
    let (session, target) = establish(Ipv4Addr::new(239, 255, 42, 1), true);
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = spawn_loop(session, shutdown.clone());

    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    for size in [10usize, 20, 30] {
        sender.send_to(&vec![0xA5; size], target).unwrap();
    }

    // Let all three datagrams land before pulling the flag.
    thread::sleep(Duration::from_millis(300));
    shutdown.store(true, Ordering::Relaxed);

    let (reason, counters) = handle.join().unwrap();
    assert_eq!(reason, StopReason::Interrupted);
    assert_eq!(counters, Counters { bytes: 60, packets: 3 });
}

#[test]
fn interrupt_before_any_traffic_reports_zero() {
    let (session, _target) = establish(Ipv4Addr::new(239, 255, 42, 2), true);
    let shutdown = Arc::new(AtomicBool::new(true));
    let handle = spawn_loop(session, shutdown);

    let (reason, counters) = handle.join().unwrap();
    assert_eq!(reason, StopReason::Interrupted);
    assert_eq!(counters, Counters::default());
}

#[test]
fn zero_byte_datagram_terminates_without_counting() {
    let (session, target) = establish(Ipv4Addr::new(239, 255, 42, 3), true);
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = spawn_loop(session, shutdown);

    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    sender.send_to(b"hello", target).unwrap();
    thread::sleep(Duration::from_millis(100));
    sender.send_to(&[], target).unwrap();

    let (reason, counters) = handle.join().unwrap();
    assert_eq!(reason, StopReason::Closed);
    // The 5-byte datagram counted; the empty one ended the loop uncounted.
    assert_eq!(counters, Counters { bytes: 5, packets: 1 });
}

#[test]
fn loud_session_prints_byte_count_and_content_lines() {
    let (mut session, target) = establish(Ipv4Addr::new(239, 255, 42, 4), false);
    let output = CapturedOutput::default();
    session.set_output(Box::new(output.clone()));
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = spawn_loop(session, shutdown.clone());

    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    sender.send_to(b"datagram", target).unwrap();
    thread::sleep(Duration::from_millis(200));
    shutdown.store(true, Ordering::Relaxed);

    let (reason, counters) = handle.join().unwrap();
    assert_eq!(reason, StopReason::Interrupted);
    assert_eq!(counters, Counters { bytes: 8, packets: 1 });

    let printed = output.contents();
    assert!(printed.contains("Got: 8 bytes"), "missing byte-count line: {printed:?}");
    assert!(printed.contains("Message: datagram"), "missing content line: {printed:?}");
}

#[test]
fn quiet_session_omits_byte_count_lines_but_keeps_content() {
    let (mut session, target) = establish(Ipv4Addr::new(239, 255, 42, 6), true);
    let output = CapturedOutput::default();
    session.set_output(Box::new(output.clone()));
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = spawn_loop(session, shutdown.clone());

    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    sender.send_to(b"hello", target).unwrap();
    thread::sleep(Duration::from_millis(200));
    shutdown.store(true, Ordering::Relaxed);

    let (reason, counters) = handle.join().unwrap();
    assert_eq!(reason, StopReason::Interrupted);
    assert_eq!(counters, Counters { bytes: 5, packets: 1 });

    let printed = output.contents();
    assert!(!printed.contains("Got:"), "quiet mode must suppress byte counts: {printed:?}");
    assert!(printed.contains("Message: hello"), "content line must survive quiet mode: {printed:?}");
}

#[test]
fn establish_fails_for_non_multicast_group() {
    let config = Config {
        group: Ipv4Addr::new(10, 1, 1, 1),
        port: 0,
        interface: Ipv4Addr::LOCALHOST,
        quiet: false,
        timestamping: false,
    };
    let err = Session::establish(&config).unwrap_err();
    assert!(err.to_string().contains("multicast membership"));
}

#[test]
fn timestamping_failure_is_not_fatal() {
    // Whether or not the host honors SO_TIMESTAMPING, a -t session must
    // still bind and join.
    let config = Config {
        group: Ipv4Addr::new(239, 255, 42, 5),
        port: 0,
        interface: Ipv4Addr::LOCALHOST,
        quiet: true,
        timestamping: true,
    };
    let session = Session::establish(&config).expect("timestamping must stay best-effort");
    assert!(session.socket().is_open());
}
