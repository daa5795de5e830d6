//! BDD test world: loader, reporter, runtime, and dispatch outcome shared by step functions.

use std::cell::RefCell;
use std::io::Cursor;
use std::sync::Arc;

use camino::Utf8PathBuf;

use txproc_event::{Command, DecodeError, Event, EventType, FrameReader};

use crate::bootstrap::{BootstrapError, ConfigLoader, Runtime, bootstrap_with};

use super::app::RecordingApp;
use super::broker::FakeBroker;
use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::reporter::RecordingHealthReporter;

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    pub broker: Option<FakeBroker>,
    runtime: Option<Runtime>,
    bootstrap_error: Option<BootstrapError>,
    input: Vec<u8>,
    pub app: RecordingApp,
    pub replies: Vec<Event>,
    pub log_dir: Option<Utf8PathBuf>,
}

impl TestWorld {
    /// Builds a world with a detached, successful configuration loader.
    #[must_use]
    pub fn new() -> Self {
        let loader = TestConfigLoader::new();
        let log_dir = loader.log_dir();
        Self {
            loader: Box::new(loader),
            reporter: Arc::new(RecordingHealthReporter::default()),
            broker: None,
            runtime: None,
            bootstrap_error: None,
            input: Vec::new(),
            app: RecordingApp::default(),
            replies: Vec::new(),
            log_dir: Some(log_dir),
        }
    }

    /// Installs a loader whose configuration file is malformed.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader::new());
        self.log_dir = None;
    }

    /// Starts a fake broker and points the configuration at it.
    pub fn use_fake_broker(&mut self, greeting: &str) {
        let loader = TestConfigLoader::new();
        let broker = FakeBroker::start(loader.root(), greeting);
        let loader = loader.with_broker(broker.datagram_path.clone(), broker.stream_path.clone());
        self.log_dir = Some(loader.log_dir());
        self.loader = Box::new(loader);
        self.broker = Some(broker);
    }

    /// Points the configuration at broker sockets nobody listens on.
    pub fn use_absent_broker(&mut self) {
        let loader = TestConfigLoader::new();
        let root = loader.root().to_owned();
        let loader = loader.with_broker(root.join("missing.dgram"), root.join("missing.sock"));
        self.log_dir = Some(loader.log_dir());
        self.loader = Box::new(loader);
    }

    /// Configures only one of the two broker paths.
    pub fn use_incomplete_broker(&mut self) {
        let loader = TestConfigLoader::new().with_datagram_only();
        self.log_dir = Some(loader.log_dir());
        self.loader = Box::new(loader);
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.runtime.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        match bootstrap_with("tester", &*self.loader, &self.reporter) {
            Ok(runtime) => self.runtime = Some(runtime),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Returns the bootstrap error, if any.
    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns the runtime produced by bootstrap.
    #[must_use]
    pub fn runtime(&self) -> Option<&Runtime> {
        self.runtime.as_ref()
    }

    /// Appends a frame to the simulated standard input.
    pub fn queue(&mut self, frame: &[u8]) {
        self.input.extend_from_slice(frame);
    }

    /// Bootstraps if needed, then runs the loop over the queued input.
    pub fn run_loop(&mut self) {
        self.bootstrap();
        let mut runtime = self.runtime.take().expect("bootstrap should have succeeded");
        runtime
            .multiplexer_mut()
            .spawn_primary(Cursor::new(std::mem::take(&mut self.input)))
            .expect("spawn primary reader");
        let mut dispatcher = runtime.into_dispatcher(std::mem::take(&mut self.app), Vec::new());
        dispatcher.run().expect("loop should finish cleanly");
        let (app, _, output) = dispatcher.into_parts();
        self.app = app;
        self.replies = read_all(&output);
    }
}

/// Encodes `event`, panicking on failure.
pub fn frame_of(event: &Event) -> Vec<u8> {
    event.encode().expect("event should encode")
}

/// Builds a request frame of `kind` with `reference`.
pub fn request(kind: EventType, reference: &str) -> Event {
    let mut event = Event::new(kind);
    event.set_reference(reference);
    event.add_param("resultQueue", "results").expect("materialised");
    event
}

/// Builds a `CMD_PERSISTENT_APP` frame carrying `cmd`.
pub fn persistent(cmd: &str) -> Event {
    let mut event = Event::new(EventType::Command);
    event.set_reference(cmd);
    event.set_command(Command::PersistentApp).expect("materialised");
    event.add_param("cmd", cmd).expect("materialised");
    event
}

fn read_all(output: &[u8]) -> Vec<Event> {
    let mut reader = FrameReader::new(output);
    let mut events = Vec::new();
    loop {
        match reader.read_event() {
            Ok(event) => events.push(event),
            Err(DecodeError::Eof) => return events,
            Err(error) => panic!("reply stream is corrupt: {error}"),
        }
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
