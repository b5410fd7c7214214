//! Tests for the socket listener.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};

use btrmount_config::SocketEndpoint;

use super::listener::SocketListener;
#[cfg(unix)]
use super::StaleSocketError;
use super::{
    ConnectionHandler, ConnectionStream, CountingHandler, FaultHook, FaultingHandler,
    HandlerFault, ListenerError, MessageRead, read_message, write_message,
};

#[derive(Clone)]
struct CountingFixture {
    count: Arc<AtomicUsize>,
    handler: Arc<CountingHandler>,
}

#[fixture]
fn counting_fixture() -> CountingFixture {
    let (count, handler) = CountingHandler::new();
    CountingFixture { count, handler }
}

#[fixture]
fn tcp_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", 0)
}

fn no_fault() -> FaultHook {
    Box::new(|| {})
}

fn fault_flag() -> (Arc<AtomicBool>, FaultHook) {
    let flag = Arc::new(AtomicBool::new(false));
    let hook_flag = Arc::clone(&flag);
    (flag, Box::new(move || hook_flag.store(true, Ordering::SeqCst)))
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

fn send(addr: std::net::SocketAddr, message: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).expect("connect client");
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("read timeout");
    stream.write_all(message).expect("write message");
    stream.shutdown(Shutdown::Write).expect("half close");
    let mut reply = Vec::new();
    let _ = stream.read_to_end(&mut reply);
    reply
}

/// Replies with the byte count it received, or nothing when oversized.
struct EchoLength;

impl ConnectionHandler for EchoLength {
    fn handle(&self, mut stream: ConnectionStream) -> Result<(), HandlerFault> {
        if let Ok(MessageRead::Complete(bytes)) = read_message(&mut stream, 16) {
            let _ = write_message(&mut stream, &format!("{}\n", bytes.len()));
        }
        let _ = stream.shutdown();
        Ok(())
    }
}

#[rstest]
fn tcp_listener_accepts_connections(
    tcp_endpoint: SocketEndpoint,
    counting_fixture: CountingFixture,
) {
    let listener = SocketListener::bind(&tcp_endpoint).expect("bind tcp listener");
    let addr = listener
        .local_addr()
        .expect("listener should report local address");
    let CountingFixture { count, handler } = counting_fixture;
    let handler: Arc<dyn ConnectionHandler> = handler;
    let handle = listener.start(handler, no_fault()).expect("start listener");

    TcpStream::connect(addr).expect("connect first client");
    TcpStream::connect(addr).expect("connect second client");

    assert!(
        wait_until(|| count.load(Ordering::SeqCst) >= 2),
        "expected two connections"
    );
    handle.shutdown();
    handle.join().expect("join listener");
}

#[rstest]
fn exchanges_are_served_in_turn(tcp_endpoint: SocketEndpoint) {
    let listener = SocketListener::bind(&tcp_endpoint).expect("bind tcp listener");
    let addr = listener.local_addr().expect("local address");
    let handle = listener
        .start(Arc::new(EchoLength), no_fault())
        .expect("start listener");

    assert_eq!(send(addr, b"List\n"), b"5\n");
    assert_eq!(send(addr, b""), b"0\n");

    handle.shutdown();
    handle.join().expect("join listener");
}

#[rstest]
fn oversized_message_gets_no_reply_and_listener_survives(tcp_endpoint: SocketEndpoint) {
    let listener = SocketListener::bind(&tcp_endpoint).expect("bind tcp listener");
    let addr = listener.local_addr().expect("local address");
    let handle = listener
        .start(Arc::new(EchoLength), no_fault())
        .expect("start listener");

    assert!(send(addr, &[b'x'; 17]).is_empty());
    assert_eq!(send(addr, b"OK\n"), b"3\n");

    handle.shutdown();
    handle.join().expect("join listener");
}

#[rstest]
#[case::returned(FaultingHandler::returning("boom"))]
#[case::panicked(FaultingHandler::panicking("boom"))]
fn handler_fault_stops_the_listener(
    tcp_endpoint: SocketEndpoint,
    #[case] handler: Arc<FaultingHandler>,
) {
    let listener = SocketListener::bind(&tcp_endpoint).expect("bind tcp listener");
    let addr = listener.local_addr().expect("local address");
    let (faulted, hook) = fault_flag();
    let handle = listener.start(handler, hook).expect("start listener");

    send(addr, b"fine\n");
    assert!(!faulted.load(Ordering::SeqCst));
    send(addr, b"boom\n");

    assert!(
        wait_until(|| faulted.load(Ordering::SeqCst)),
        "fault hook should run"
    );
    let error = handle.join().expect_err("listener reports the fault");
    assert!(matches!(error, ListenerError::Fault(_)));
}

#[cfg(unix)]
#[fixture]
fn unix_tempdir() -> tempfile::TempDir {
    tempfile::tempdir().expect("temp dir")
}

#[cfg(unix)]
#[rstest]
fn unix_listener_cleans_stale_socket_files(unix_tempdir: tempfile::TempDir) {
    let path = unix_tempdir.path().join("btrmountd.sock");
    {
        let _stale = std::os::unix::net::UnixListener::bind(&path).expect("bind stale listener");
    }
    assert!(path.exists(), "stale socket should remain");

    let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path").to_string());
    let listener = SocketListener::bind(&endpoint).expect("bind new listener");
    let (_, handler) = CountingHandler::new();
    let handle = listener.start(handler, no_fault()).expect("start listener");

    std::os::unix::net::UnixStream::connect(&path).expect("connect unix client");

    handle.shutdown();
    handle.join().expect("join listener");
    assert!(
        !path.exists(),
        "listener should remove unix socket on shutdown"
    );
}

#[cfg(unix)]
#[rstest]
fn unix_listener_rejects_in_use_socket(unix_tempdir: tempfile::TempDir) {
    let path = unix_tempdir.path().join("btrmountd.sock");
    let _existing = std::os::unix::net::UnixListener::bind(&path).expect("bind existing listener");

    let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path").to_string());
    let error = SocketListener::bind(&endpoint).expect_err("should fail bind");
    assert!(matches!(
        error,
        ListenerError::StaleSocket {
            source: StaleSocketError::InUse,
            ..
        }
    ));
}

#[cfg(unix)]
#[rstest]
fn unix_listener_refuses_regular_files(unix_tempdir: tempfile::TempDir) {
    let path = unix_tempdir.path().join("btrmountd.sock");
    std::fs::write(&path, b"not a socket").expect("write file");

    let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path").to_string());
    let error = SocketListener::bind(&endpoint).expect_err("should fail bind");
    assert!(matches!(
        error,
        ListenerError::StaleSocket {
            source: StaleSocketError::NotSocket,
            ..
        }
    ));
    assert!(path.exists(), "a regular file must not be deleted");
}
