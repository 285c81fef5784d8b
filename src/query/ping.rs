// src/query/ping.rs
use std::time::Duration;

use log::debug;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

use crate::models::server::UNREACHABLE_PING;

/// Round trip of a TCP connect to `addr` in milliseconds, or
/// [`UNREACHABLE_PING`] when the connect fails or runs past `limit`.
pub async fn measure_ping(addr: &str, limit: Duration) -> u32 {
    let started = Instant::now();

    match timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => started.elapsed().as_millis().min(UNREACHABLE_PING as u128 - 1) as u32,
        Ok(Err(e)) => {
            debug!("Ping to {} failed: {}", addr, e);
            UNREACHABLE_PING
        }
        Err(_) => {
            debug!("Ping to {} timed out after {:?}", addr, limit);
            UNREACHABLE_PING
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reachable_listener_has_a_real_ping() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let ping = measure_ping(&addr, Duration::from_secs(2)).await;
        assert!(ping < UNREACHABLE_PING);
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert_eq!(measure_ping(&addr, Duration::from_secs(2)).await, UNREACHABLE_PING);
    }
}
