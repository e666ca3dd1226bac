// MCAST-RECV — CRATE ROOT (LIBRARY)
// Multicast UDP receiver: join a group, count datagrams until interrupted.
//
// Module hierarchy:
//   cli      — argument surface, group:port[:interface] endpoint parsing
//   socket   — the one UDP socket: options, bind, membership, classified recv
//   session  — startup sequence, receive loop, running counters
//   shutdown — SIGINT handler feeding the loop's cancellation flag

pub mod cli;
pub mod session;
pub mod shutdown;
pub mod socket;
