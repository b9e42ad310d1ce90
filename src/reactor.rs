//! C7: the single-threaded socket reactor that multiplexes one UDP socket and
//! one TCP listener (with its accepted connections).
//!
//! Built on a dedicated `tokio` `current_thread` runtime rather than a
//! hand-rolled `epoll`/`select` loop (spec §9 "Reactor abstraction" allows an
//! event-loop library, provided the single-OS-thread semantics and the
//! shutdown contract hold). The top-level `tokio::select!` in [`run`] is the
//! crate's one suspension point, mirroring spec §5's "exactly one — the
//! selector's blocking select/poll call". Per-TCP-connection framing is
//! still modeled as the explicit `WantLength`/`WantBody`/`Complete` state
//! machine spec §4.7 describes, rather than leaning on
//! `AsyncReadExt::read_exact`, so that state machine stays visible and unit
//! testable on its own.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::buffer::OutputBuffer;
use crate::control::{self, ControlOutcome};
use crate::logging::QuerySink;
use crate::query::process_query;
use crate::table::RecordTable;

/// UDP payload cap per spec §6 ("UDP payload ≤ 512 bytes") absent EDNS0,
/// which this server never advertises.
const UDP_MAX_RESPONSE: usize = 512;
/// Generously larger than any single UDP datagram the server will ever
/// receive (max legal UDP payload is 65507 bytes).
const UDP_RECV_BUFFER: usize = 65536;
/// `listen()` backlog; spec §4.7 requires at least 5.
const TCP_LISTEN_BACKLOG: i32 = 1024;

/// Read-side state machine for one TCP connection's request
/// (spec §4.7 "TCP framing"): `WantLength` until the 2-byte length prefix is
/// fully buffered, `WantBody` until the declared number of message bytes
/// follow it, then `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    WantLength,
    WantBody { expected: usize },
    Complete,
}

/// Buffers one TCP request as it arrives, tracking which framing state it is
/// in. `request` holds the 2-byte length prefix followed by the message.
#[derive(Debug, Default)]
struct TcpRequest {
    request: Vec<u8>,
}

impl TcpRequest {
    fn new() -> Self {
        Self { request: Vec::new() }
    }

    fn state(&self) -> ReadState {
        if self.request.len() < 2 {
            ReadState::WantLength
        } else {
            let expected = u16::from_be_bytes([self.request[0], self.request[1]]) as usize;
            if self.request.len() < 2 + expected {
                ReadState::WantBody { expected }
            } else {
                ReadState::Complete
            }
        }
    }

    fn feed(&mut self, chunk: &[u8]) {
        self.request.extend_from_slice(chunk);
    }

    /// The message bytes, without the 2-byte length prefix. Only meaningful
    /// once `state()` is `Complete`.
    fn message(&self) -> &[u8] {
        &self.request[2..]
    }
}

/// Public handle to a running reactor. `start` spawns the reactor's single
/// OS thread; `join` waits for it to exit (spec §5: "The public API offers
/// `start()` ... and `join()`").
pub struct DnsServer {
    shutting_down: Arc<AtomicBool>,
    thread: Option<JoinHandle<anyhow::Result<()>>>,
}

impl DnsServer {
    /// Binds the UDP socket and TCP listener and spawns the reactor thread.
    /// `table` must already be fully populated — it is never mutated again.
    pub fn start(addr: SocketAddr, table: RecordTable, sink: Arc<dyn QuerySink>) -> io::Result<Self> {
        let table = Arc::new(table);
        let shutting_down = Arc::new(AtomicBool::new(false));
        let thread_flag = shutting_down.clone();

        let udp_std = bind_udp(addr)?;
        let tcp_std = bind_tcp(addr)?;

        let handle = std::thread::Builder::new()
            .name("dns-reactor".to_string())
            .spawn(move || -> anyhow::Result<()> {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                rt.block_on(run(udp_std, tcp_std, table, sink, thread_flag))
            })?;

        Ok(Self {
            shutting_down,
            thread: Some(handle),
        })
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Waits for the reactor thread to exit.
    pub fn join(mut self) -> anyhow::Result<()> {
        if let Some(handle) = self.thread.take() {
            match handle.join() {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("reactor thread panicked")),
            }
        } else {
            Ok(())
        }
    }
}

fn bind_udp(addr: SocketAddr) -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

/// Binds the TCP listener with `SO_REUSEADDR` and a backlog `>= 5`
/// (spec §4.7).
fn bind_tcp(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(TCP_LISTEN_BACKLOG)?;
    Ok(socket.into())
}

async fn run(
    udp_std: std::net::UdpSocket,
    tcp_std: std::net::TcpListener,
    table: Arc<RecordTable>,
    sink: Arc<dyn QuerySink>,
    shutting_down: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let udp = UdpSocket::from_std(udp_std)?;
    let tcp = TcpListener::from_std(tcp_std)?;
    info!("DNS reactor listening on {} (udp+tcp)", udp.local_addr()?);

    let mut connections: JoinSet<()> = JoinSet::new();
    let mut recv_buf = vec![0u8; UDP_RECV_BUFFER];

    loop {
        tokio::select! {
            result = udp.recv_from(&mut recv_buf) => {
                match result {
                    Ok((len, src)) => {
                        let shutdown_requested =
                            handle_udp_datagram(&udp, &recv_buf[..len], src, &table, &sink).await;
                        if shutdown_requested {
                            shutting_down.store(true, Ordering::SeqCst);
                            break;
                        }
                    }
                    Err(e) => warn!("UDP recv error: {}", e),
                }
            }
            accepted = tcp.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!("accepted TCP connection from {}", peer);
                        let table = table.clone();
                        let sink = sink.clone();
                        connections.spawn(async move {
                            handle_tcp_connection(stream, peer, table, sink).await;
                        });
                    }
                    Err(e) => warn!("TCP accept error: {}", e),
                }
            }
        }
    }

    info!("shutdown requested, closing all sockets");
    connections.shutdown().await;
    Ok(())
}

/// Handles one UDP exchange end to end (recv already done by the caller):
/// control-channel dispatch first, then the query processor. Returns `true`
/// if the control channel requested shutdown.
async fn handle_udp_datagram(
    udp: &UdpSocket,
    body: &[u8],
    src: SocketAddr,
    table: &RecordTable,
    sink: &Arc<dyn QuerySink>,
) -> bool {
    if let Some(outcome) = control::interpret(body) {
        let reply = control::reply_text(&outcome);
        if let Err(e) = udp.send_to(reply.as_bytes(), src).await {
            debug!("failed to send control reply to {}: {}", src, e);
        }
        return match outcome {
            ControlOutcome::Shutdown => {
                sink.log(&format!("shutdown command received from {}", src));
                true
            }
            ControlOutcome::Unknown => false,
        };
    }

    let mut out = OutputBuffer::new(0, UDP_MAX_RESPONSE);
    process_query(body, table, &mut out);
    if let Err(e) = udp.send_to(&out.result, src).await {
        debug!("failed to send UDP response to {}: {}", src, e);
    }
    sink.log(&format!("udp query from {}: {} bytes -> {} bytes", src, body.len(), out.result.len()));
    false
}

/// Reads one length-prefixed request, runs the query processor on it, and
/// writes the length-prefixed response back, tolerating short reads/writes.
/// Destroys the connection (returns) on EOF or I/O error at any point.
async fn handle_tcp_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    table: Arc<RecordTable>,
    sink: Arc<dyn QuerySink>,
) {
    let mut request = TcpRequest::new();
    let mut buf = [0u8; 4096];

    while request.state() != ReadState::Complete {
        match stream.read(&mut buf).await {
            Ok(0) => {
                debug!("TCP connection from {} closed before a full request arrived", peer);
                return;
            }
            Ok(n) => request.feed(&buf[..n]),
            Err(e) => {
                debug!("TCP read error from {}: {}", peer, e);
                return;
            }
        }
    }

    let mut out = OutputBuffer::new(2, 0);
    out.write_u16(0); // placeholder length
    process_query(request.message(), &table, &mut out);
    let body_len = (out.len() - 2) as u16;
    out.overwrite_u16(0, body_len);
    let response = out.result;

    sink.log(&format!("tcp query from {}: {} bytes -> {} bytes", peer, request.message().len(), response.len()));

    let mut bytes_sent = 0usize;
    while bytes_sent < response.len() {
        match stream.write(&response[bytes_sent..]).await {
            Ok(0) => {
                debug!("TCP write to {} returned 0, dropping connection", peer);
                return;
            }
            Ok(n) => bytes_sent += n,
            Err(e) => {
                debug!("TCP write error to {}: {}", peer, e);
                return;
            }
        }
    }
}
