//! Ephemeral port allocation for mock services.
//!
//! A port is found by binding a loopback listener to port 0 and releasing it straight away. Between the release
//! and the mock service binding it, another process may grab the port; that surfaces as an ordinary mock-service
//! failure further down the pipeline, not as an allocator error.

use std::collections::HashSet;
use std::io;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::{Mutex, PoisonError};

/// Upper bound on listeners held open while asking the OS for a port not yet handed out in this run.
const MAX_HELD: usize = 64;

/// Hands out loopback ports, never the same one twice within a run.
#[derive(Debug, Default)]
pub struct PortAllocator {
    issued: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a port currently free on the loopback interface.
    ///
    /// If the OS offers a port already given to another job, the probe listener is kept bound while asking again,
    /// so the same port cannot come back. All probe listeners are closed before returning.
    pub fn allocate(&self) -> io::Result<u16> {
        let mut held = Vec::new();
        loop {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
            let port = listener.local_addr()?.port();
            if self.issued.lock().unwrap_or_else(PoisonError::into_inner).insert(port) {
                return Ok(port);
            }
            held.push(listener);
            if held.len() >= MAX_HELD {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    "no unissued loopback port available",
                ));
            }
        }
    }

    pub fn issued(&self) -> usize {
        self.issued.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
