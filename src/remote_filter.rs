//! Out-of-process loop filter backend (A9): the swappable substitute
//! for `SecondOrderLoopFilter` described in the TCP-connector tracking
//! variant (`gps_l1_ca_tcp_connector_tracking_cc.h`) -- the local
//! DLL/PLL math is replaced by a socket round-trip to an external
//! filter process. Connection handling follows `network.rs::RtlSdrTcp`'s
//! reconnect-on-error style.

use std::io::{Read, Write};
use std::net::TcpStream;

use crate::loop_filter::LoopFilterBackend;

/// `{connect, send(err), recv(corr)}` over a persistent TCP socket, one
/// `f64` each way per `update` call. Reconnects once on I/O error
/// before giving up and returning a zero correction for that epoch.
pub struct TcpLoopFilter {
    addr: String,
    socket: Option<TcpStream>,
}

impl TcpLoopFilter {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            socket: None,
        }
    }

    fn ensure_connected(&mut self) -> std::io::Result<&mut TcpStream> {
        if self.socket.is_none() {
            self.socket = Some(TcpStream::connect(&self.addr)?);
        }
        Ok(self.socket.as_mut().unwrap())
    }

    fn round_trip(&mut self, error: f64) -> std::io::Result<f64> {
        let socket = self.ensure_connected()?;
        socket.write_all(&error.to_le_bytes())?;
        let mut reply = [0u8; 8];
        socket.read_exact(&mut reply)?;
        Ok(f64::from_le_bytes(reply))
    }
}

impl LoopFilterBackend for TcpLoopFilter {
    fn initialize(&mut self) {
        // A fresh connection is the remote process's own reset signal;
        // drop any stale socket so the next update reconnects.
        self.socket = None;
    }

    fn update(&mut self, error: f64) -> f64 {
        match self.round_trip(error) {
            Ok(correction) => correction,
            Err(e) => {
                log::warn!("remote filter at {}: {e}, reconnecting", self.addr);
                self.socket = None;
                match self.round_trip(error) {
                    Ok(correction) => correction,
                    Err(e) => {
                        log::warn!("remote filter at {}: retry failed: {e}", self.addr);
                        0.0
                    }
                }
            }
        }
    }
}
