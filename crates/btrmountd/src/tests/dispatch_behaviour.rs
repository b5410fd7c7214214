//! Behavioural tests driving the control socket end to end over TCP.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use btrmount_config::SocketEndpoint;

use crate::dispatch::{CommandDispatcher, DispatchConnectionHandler, RegistryManager};
use crate::health::HealthReporter;
use crate::registry::VolumeRegistry;
use crate::supervisor::WorkerLauncher;
use crate::transport::{ListenerHandle, SocketListener};

use super::support::{RecordingHealthReporter, StubLauncher};

const EXCHANGE_TIMEOUT: Duration = Duration::from_millis(200);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

type StepResult = Result<(), String>;

#[derive(Default)]
struct ControlSocketWorld {
    launcher: Option<Arc<StubLauncher>>,
    registry: Option<RegistryManager>,
    listener: Option<ListenerHandle>,
    address: Option<SocketAddr>,
    stalled: Vec<TcpStream>,
    reply: Option<String>,
}

impl ControlSocketWorld {
    fn start(&mut self, launcher: StubLauncher) -> StepResult {
        let launcher = Arc::new(launcher);
        let registry = RegistryManager::new(VolumeRegistry::default());
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&launcher) as Arc<dyn WorkerLauncher>,
            Arc::new(RecordingHealthReporter::default()) as Arc<dyn HealthReporter>,
            Duration::from_millis(100),
        );
        let handler = DispatchConnectionHandler::new(
            Arc::new(dispatcher),
            registry.clone(),
            EXCHANGE_TIMEOUT,
        );

        let listener = SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0))
            .map_err(|error| error.to_string())?;
        let address = listener
            .local_addr()
            .ok_or_else(|| "listener has no TCP address".to_owned())?;
        let handle = listener
            .start(Arc::new(handler), Box::new(|| {}))
            .map_err(|error| error.to_string())?;

        self.launcher = Some(launcher);
        self.registry = Some(registry);
        self.listener = Some(handle);
        self.address = Some(address);
        Ok(())
    }

    fn address(&self) -> Result<SocketAddr, String> {
        self.address
            .ok_or_else(|| "control socket not started".to_owned())
    }

    fn exchange(&mut self, message: &str) -> StepResult {
        let mut stream = TcpStream::connect(self.address()?).map_err(|error| error.to_string())?;
        stream
            .set_read_timeout(Some(CLIENT_TIMEOUT))
            .map_err(|error| error.to_string())?;
        stream
            .write_all(message.as_bytes())
            .map_err(|error| error.to_string())?;
        stream
            .shutdown(Shutdown::Write)
            .map_err(|error| error.to_string())?;
        let mut reply = String::new();
        stream
            .read_to_string(&mut reply)
            .map_err(|error| format!("no reply from control socket: {error}"))?;
        self.reply = Some(reply);
        Ok(())
    }

    fn stall(&mut self) -> StepResult {
        let mut stream = TcpStream::connect(self.address()?).map_err(|error| error.to_string())?;
        stream
            .write_all(b"List\n")
            .map_err(|error| error.to_string())?;
        self.stalled.push(stream);
        Ok(())
    }

    fn reply(&self) -> &str {
        self.reply.as_deref().expect("no reply recorded")
    }

    fn registry_len(&self) -> usize {
        self.registry
            .as_ref()
            .expect("control socket not started")
            .with_registry(|registry| registry.len())
            .expect("registry lock")
    }
}

impl Drop for ControlSocketWorld {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.shutdown();
            let _ = handle.join();
        }
    }
}

#[fixture]
fn world() -> RefCell<ControlSocketWorld> {
    RefCell::new(ControlSocketWorld::default())
}

fn strip_quotes(value: &str) -> &str {
    value.trim_matches('"')
}

#[given("a control socket backed by a succeeding launcher")]
fn given_succeeding(world: &RefCell<ControlSocketWorld>) -> StepResult {
    world.borrow_mut().start(StubLauncher::succeeding())
}

#[given("a control socket backed by a failing launcher")]
fn given_failing(world: &RefCell<ControlSocketWorld>) -> StepResult {
    world
        .borrow_mut()
        .start(StubLauncher::failing(std::io::ErrorKind::NotFound))
}

#[when("a client sends \"{message}\"")]
fn when_client_sends(world: &RefCell<ControlSocketWorld>, message: String) -> StepResult {
    let message = strip_quotes(&message).replace("\\n", "\n");
    world.borrow_mut().exchange(&message)
}

#[when("a client connects without finishing its request")]
fn when_client_stalls(world: &RefCell<ControlSocketWorld>) -> StepResult {
    world.borrow_mut().stall()
}

#[then("the reply is \"{expected}\"")]
fn then_reply_is(world: &RefCell<ControlSocketWorld>, expected: String) {
    let expected = strip_quotes(&expected).replace("\\n", "\n");
    assert_eq!(world.borrow().reply(), expected);
}

#[then("the reply is an error")]
fn then_reply_is_error(world: &RefCell<ControlSocketWorld>) {
    let world = world.borrow();
    let reply = world.reply();
    assert!(reply.starts_with("Error\n"), "unexpected reply {reply:?}");
}

#[then("the reply lists {count} volumes")]
fn then_reply_lists(world: &RefCell<ControlSocketWorld>, count: usize) {
    let world = world.borrow();
    let entries = world
        .reply()
        .lines()
        .filter(|line| *line == "Entry")
        .count();
    assert!(world.reply().starts_with("Data\n"));
    assert_eq!(entries, count);
}

#[then("the registry holds {count} volumes")]
fn then_registry_holds(world: &RefCell<ControlSocketWorld>, count: usize) {
    assert_eq!(world.borrow().registry_len(), count);
}

#[then("the launcher started {count} workers")]
fn then_launcher_started(world: &RefCell<ControlSocketWorld>, count: usize) {
    let launched = world
        .borrow()
        .launcher
        .as_ref()
        .map(|launcher| launcher.launched().len());
    assert_eq!(launched, Some(count));
}

#[scenario(path = "tests/features/control_socket.feature")]
fn control_socket(#[from(world)] _: RefCell<ControlSocketWorld>) -> Result<(), String> {
    Ok(())
}
