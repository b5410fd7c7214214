//! Fake service used by the CLI behaviour tests.
//!
//! Listens on an ephemeral TCP port, accepts one connection, records the
//! request and then answers according to a [`FakeBehaviour`].

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};

const ACCEPT_DEADLINE: Duration = Duration::from_secs(2);

/// How the fake answers the one request it accepts.
#[derive(Debug, Clone)]
pub(crate) enum FakeBehaviour {
    /// Writes the bytes and closes the connection.
    Reply(String),
    /// Holds the connection open without answering, then closes it.
    Silent(Duration),
    /// Closes the connection without writing anything.
    Hangup,
}

pub(crate) struct FakeDaemon {
    port: u16,
    request: Arc<Mutex<Option<String>>>,
    handle: Option<thread::JoinHandle<Result<()>>>,
}

impl FakeDaemon {
    pub(crate) fn spawn(behaviour: FakeBehaviour) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake service")?;
        listener
            .set_nonblocking(true)
            .context("fake service nonblocking")?;
        let port = listener.local_addr().context("local addr")?.port();
        let request = Arc::new(Mutex::new(None));
        let recorded = Arc::clone(&request);
        let handle = thread::spawn(move || serve_client(&listener, &behaviour, &recorded));
        Ok(Self {
            port,
            request,
            handle: Some(handle),
        })
    }

    pub(crate) const fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the fake to finish and returns the request it received.
    pub(crate) fn take_request(&mut self) -> Result<Option<String>> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("fake service thread panicked"))?
                .context("fake service failed")?;
        }
        let request = self
            .request
            .lock()
            .map_err(|error| anyhow!("lock request: {error}"))?;
        Ok(request.clone())
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve_client(
    listener: &TcpListener,
    behaviour: &FakeBehaviour,
    request: &Arc<Mutex<Option<String>>>,
) -> Result<()> {
    let deadline = Instant::now() + ACCEPT_DEADLINE;
    let stream = loop {
        match listener.accept() {
            Ok((stream, _)) => break stream,
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    // The CLI gave up before connecting, e.g. on a usage error.
                    return Ok(());
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(error) => return Err(error).context("accept connection"),
        }
    };
    stream
        .set_nonblocking(false)
        .context("blocking fake connection")?;
    let text = read_request(&stream)?;
    *request
        .lock()
        .map_err(|error| anyhow!("lock request: {error}"))? = Some(text);
    respond(stream, behaviour)
}

fn read_request(mut stream: &TcpStream) -> Result<String> {
    stream
        .set_read_timeout(Some(ACCEPT_DEADLINE))
        .context("request read timeout")?;
    let mut text = String::new();
    stream
        .read_to_string(&mut text)
        .context("read request until half-close")?;
    Ok(text)
}

fn respond(mut stream: TcpStream, behaviour: &FakeBehaviour) -> Result<()> {
    match behaviour {
        FakeBehaviour::Reply(reply) => {
            // The client may already have given up; a failed write is fine.
            let _ = stream.write_all(reply.as_bytes());
        }
        FakeBehaviour::Silent(hold) => thread::sleep(*hold),
        FakeBehaviour::Hangup => {}
    }
    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}
