//! Line-oriented TCP command receiver.
//!
//! One request per line, one reply line per request.  Every connection gets
//! its own thread; all of them feed the same [`CommandClient`].
//!
//! ```text
//!   $ nc turret.local 9000
//!   yaw 30
//!   OK: yaw=30.00
//!   {"cmd": "shoot", "value": 0.8}
//!   OK: shoot power=0.80
//! ```

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use super::command_link::CommandClient;

/// How often blocked accept/read calls re-check the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Longest accepted request line, newline included.  Longer lines get
/// `ERR: line too long` and the connection is closed.
pub const MAX_LINE: usize = 1024;

pub struct CommandServer {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

impl CommandServer {
    /// Bind `addr` and start accepting connections on a background thread.
    pub fn spawn(addr: impl ToSocketAddrs, client: CommandClient) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local = listener.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let acceptor = thread::Builder::new()
            .name("cmd-accept".into())
            .spawn(move || accept_loop(listener, client, flag))?;

        info!("command server listening on {}", local);
        Ok(Self {
            addr: local,
            running,
            acceptor: Some(acceptor),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and wait for the acceptor thread.  Open connections
    /// close on their next poll.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(acceptor) = self.acceptor.take() {
            if acceptor.join().is_err() {
                warn!("command server: acceptor thread panicked");
            }
            info!("command server on {} stopped", self.addr);
        }
    }
}

impl Drop for CommandServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(listener: TcpListener, client: CommandClient, running: Arc<AtomicBool>) {
    while running.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!("command server: connection from {}", peer);
                let client = client.clone();
                let running = Arc::clone(&running);
                let spawned = thread::Builder::new()
                    .name(format!("cmd-{peer}"))
                    .spawn(move || {
                        if let Err(e) = serve_connection(stream, &client, &running) {
                            debug!("command server: {} dropped: {}", peer, e);
                        }
                        info!("command server: {} disconnected", peer);
                    });
                if let Err(e) = spawned {
                    warn!("command server: cannot serve {}: {}", peer, e);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                warn!("command server: accept failed: {}", e);
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn serve_connection(
    stream: TcpStream,
    client: &CommandClient,
    running: &AtomicBool,
) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(POLL_INTERVAL))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    while running.load(Ordering::Acquire) {
        let budget = (MAX_LINE + 1).saturating_sub(buf.len()) as u64;
        match reader.by_ref().take(budget).read_until(b'\n', &mut buf) {
            Ok(0) => {
                if !buf.is_empty() {
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    reply(&mut writer, client, &line)?;
                }
                break;
            }
            Ok(_) => {
                if buf.len() > MAX_LINE {
                    warn!("command server: line over {} bytes, closing", MAX_LINE);
                    writeln!(writer, "ERR: line too long")?;
                    writer.flush()?;
                    break;
                }
                if buf.last() != Some(&b'\n') {
                    // Peer closed mid-line; answer what we have.
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    reply(&mut writer, client, &line)?;
                    break;
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                buf.clear();
                reply(&mut writer, client, &line)?;
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn reply(writer: &mut TcpStream, client: &CommandClient, line: &str) -> io::Result<()> {
    debug!("command server: <- {:?}", line.trim());
    let answer = client.submit(line).unwrap_or_else(|e| e.to_string());
    writeln!(writer, "{answer}")?;
    writer.flush()
}
