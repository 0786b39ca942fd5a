// ============================================
// File: crates/ztunnel-net/src/lib.rs
// ============================================
//! # ZTunnel Net - High-Throughput I/O Core
//!
//! ## Creation Reason
//! Provides the data-plane I/O primitives of the ZTunnel secure
//! tunneling system: the relay pushes encrypted datagrams through
//! this crate's batch engine, shapes them with its throttler, and
//! reaches local services through its connection pool.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`udp`]: bound datagram socket with batched recv/send
//! - [`packet`]: reusable packet buffers with peer addressing
//! - [`throttle`]: nanosecond-precision token-bucket throttler
//! - [`pool`]: pre-warmed, liveness-checked TCP connection pool
//! - [`time`]: monotonic clock, sleep, cycle counter
//! - [`error`]: crate error types
//!
//! ## Data Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Internet                            │
//! │                         │                                │
//! │              ┌──────────┴──────────┐                     │
//! │              │     UdpEngine       │  recv_batch /       │
//! │              │  (encrypted pkts)   │  send_batch         │
//! │              └──────────┬──────────┘                     │
//! │                         │                                │
//! │              ┌──────────┴──────────┐                     │
//! │              │      Throttle       │  consume / wait     │
//! │              └──────────┬──────────┘                     │
//! │                         │                                │
//! │              ┌──────────┴──────────┐                     │
//! │              │      ConnPool       │  acquire / release  │
//! │              │  (local services)   │                     │
//! │              └─────────────────────┘                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//! Everything here is synchronous and single-threaded: operations run
//! to completion on the calling thread, and no component spawns tasks
//! or shares mutable state. Only three calls block at all: `bind`
//! (kernel socket setup), `Throttle::wait` (bounded by the computed
//! wait), and pool connects (100 ms cap). Batch I/O never blocks.
//!
//! ## Platform Support
//! | Platform | Batch syscalls | Fallback |
//! |----------|----------------|----------|
//! | Linux | recvmmsg/sendmmsg | - |
//! | macOS/BSD | - | per-datagram loop |
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Ok(0)` from batch I/O means "try again later", never failure
//! - Handles are exclusively owned; share them only behind your own
//!   lock
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod packet;
pub mod pool;
pub mod throttle;
pub mod time;
pub mod udp;

// Re-export primary types
pub use error::{NetError, Result};
pub use packet::Packet;
pub use pool::{ConnPool, PooledConn};
pub use throttle::Throttle;
pub use udp::UdpEngine;
