//! Unit tests for the dispatch loop.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rstest::{fixture, rstest};
use txproc_event::{Command, DecodeError, Event, EventType, FrameReader};

use super::*;
use crate::capabilities::{
    EventHandlers, EventSources, HandlerResult, Lifecycle, LogHooks, LoopTasks,
};
use crate::log_sink::{LogReopener, LogSinkError};
use crate::multiplexer::{Multiplexer, SourceRecord};
use crate::transport::{BrokerTransport, MockBrokerTransport, SendOutcome, TransportError};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ScriptedApp {
    fail_url: bool,
    claim_commands: bool,
    regular_runs: usize,
    regular_output: Vec<Event>,
    minutely: usize,
    base_seen: Vec<String>,
    unhandled: Vec<String>,
    extension_records: usize,
    reopened: usize,
    exit_prepared: bool,
}

impl LogHooks for ScriptedApp {
    fn user_cmd_reopen_log(&mut self, _context: &mut DispatchContext) {
        self.reopened += 1;
    }
}

impl LoopTasks for ScriptedApp {
    fn regular_tasks(&mut self, context: &mut DispatchContext) -> Vec<Event> {
        self.regular_runs += 1;
        if context.take_minutely() {
            self.minutely += 1;
        }
        std::mem::take(&mut self.regular_output)
    }
}

impl EventSources for ScriptedApp {
    fn handle_source_record(
        &mut self,
        _context: &mut DispatchContext,
        _record: SourceRecord,
    ) -> Vec<Event> {
        self.extension_records += 1;
        Vec::new()
    }
}

impl Lifecycle for ScriptedApp {
    fn prepare_to_exit(&mut self, _context: &mut DispatchContext, _event: &Event) -> Vec<Event> {
        self.exit_prepared = true;
        Vec::new()
    }
}

impl EventHandlers for ScriptedApp {
    fn handle_command(
        &mut self,
        _context: &mut DispatchContext,
        _event: &Event,
    ) -> Option<HandlerResult> {
        self.claim_commands
            .then(|| Err(HandlerError::failed("claimed")))
    }

    fn handle_url(&mut self, context: &mut DispatchContext, _event: &Event) -> HandlerResult {
        if self.fail_url {
            return Err(HandlerError::failed("boom"));
        }
        if let Some(pending) = context.pending_result_mut() {
            pending.set_result("fetched")?;
        }
        Ok(Vec::new())
    }

    fn handle_base(&mut self, _context: &mut DispatchContext, event: &Event) -> HandlerResult {
        self.base_seen.push(event.reference().to_owned());
        Ok(Vec::new())
    }

    fn handle_unhandled_command(
        &mut self,
        _context: &mut DispatchContext,
        event: &Event,
    ) -> HandlerResult {
        self.unhandled.push(event.reference().to_owned());
        Ok(Vec::new())
    }
}

/// Broker that records every event it is handed.
#[derive(Debug, Default)]
struct RecordingBroker {
    sent: Vec<Event>,
}

impl BrokerTransport for RecordingBroker {
    fn send(&mut self, event: &Event) -> Result<SendOutcome, TransportError> {
        self.sent.push(event.clone());
        Ok(SendOutcome::Accepted)
    }
}

#[derive(Debug, Default)]
struct CountingReopener(AtomicUsize);

impl LogReopener for CountingReopener {
    fn reopen(&self) -> Result<(), LogSinkError> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

struct ScriptedClock(Arc<Mutex<VecDeque<DateSample>>>);

impl Clock for ScriptedClock {
    fn sample(&self) -> DateSample {
        self.0
            .lock()
            .expect("clock lock")
            .pop_front()
            .unwrap_or_default()
    }
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

type TestDispatcher = Dispatcher<ScriptedApp, RecordingBroker, Vec<u8>>;

#[fixture]
fn app() -> ScriptedApp {
    ScriptedApp::default()
}

/// Queues `records` on the primary source followed by end of stream.
fn primary_input(records: Vec<Result<Event, DecodeError>>) -> Multiplexer {
    let multiplexer = Multiplexer::default();
    let sender = multiplexer.primary_sender();
    for record in records {
        assert!(sender.deliver(record));
    }
    assert!(sender.deliver(Err(DecodeError::Eof)));
    multiplexer
}

fn dispatcher(app: ScriptedApp, records: Vec<Result<Event, DecodeError>>) -> TestDispatcher {
    Dispatcher::new(
        "tester",
        app,
        RecordingBroker::default(),
        Vec::new(),
        primary_input(records),
    )
}

fn replies(output: &[u8]) -> Vec<Event> {
    let mut reader = FrameReader::new(output);
    let mut events = Vec::new();
    loop {
        match reader.read_event() {
            Ok(event) => events.push(event),
            Err(DecodeError::Eof) => return events,
            Err(other) => panic!("reply stream is corrupt: {other}"),
        }
    }
}

fn url_request(reference: &str) -> Event {
    let mut event = Event::new(EventType::Url);
    event.set_reference(reference);
    event.set_dest_queue("fetch");
    event.add_param("resultQueue", "results").expect("materialised");
    event
}

fn command(command: Command) -> Event {
    let mut event = Event::new(EventType::Command);
    event.set_reference(command.as_str());
    event.set_command(command).expect("materialised");
    event
}

fn persistent(cmd: Option<&str>) -> Event {
    let mut event = command(Command::PersistentApp);
    if let Some(name) = cmd {
        event.set_reference(name);
        event.add_param("cmd", name).expect("materialised");
    }
    event
}

fn run_to_end(mut dispatcher: TestDispatcher) -> (ScriptedApp, RecordingBroker, Vec<Event>) {
    dispatcher.run().expect("loop finishes cleanly");
    let (app, broker, output) = dispatcher.into_parts();
    (app, broker, replies(&output))
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[rstest]
fn url_request_gets_a_default_success_reply(app: ScriptedApp) {
    let (_, broker, replies) = run_to_end(dispatcher(app, vec![Ok(url_request("job-1"))]));

    let [reply] = replies.as_slice() else {
        panic!("expected one reply, got {}", replies.len());
    };
    assert_eq!(reply.event_type(), EventType::Result);
    assert_eq!(reply.reference(), "job-1");
    assert_eq!(reply.dest_queue(), "results");
    assert!(reply.success().expect("materialised"));
    assert_eq!(reply.sys_params().expect("materialised").result, "fetched");
    assert_eq!(reply.param("generatedby").expect("present"), "tester");
    assert!(broker.sent.is_empty());
}

#[rstest]
fn undecodable_frame_gets_a_failure_reply(app: ScriptedApp) {
    let records = vec![
        Err(DecodeError::UnsupportedVersion {
            found: "9.9".to_owned(),
        }),
        Ok(url_request("job-2")),
    ];
    let (_, _, replies) = run_to_end(dispatcher(app, records));

    let [failure, success] = replies.as_slice() else {
        panic!("expected two replies, got {}", replies.len());
    };
    assert!(!failure.success().expect("materialised"));
    assert!(failure.reference().is_empty());
    assert!(
        failure
            .sys_params()
            .expect("materialised")
            .error_string
            .contains("9.9")
    );
    assert_eq!(success.reference(), "job-2");
}

#[rstest]
fn handler_failure_is_reported_on_the_reply(mut app: ScriptedApp) {
    app.fail_url = true;
    let (_, _, replies) = run_to_end(dispatcher(app, vec![Ok(url_request("job-3"))]));

    let [reply] = replies.as_slice() else {
        panic!("expected one reply, got {}", replies.len());
    };
    let sys = reply.sys_params().expect("materialised");
    assert!(!sys.success);
    assert_eq!(sys.result, "failed");
    assert_eq!(sys.error_string, "boom");
    assert_eq!(reply.reference(), "job-3");
}

#[rstest]
fn oversized_result_is_still_answered(app: ScriptedApp) {
    let oversized = "r".repeat(999_900);
    let records = vec![Ok(url_request(&oversized)), Ok(url_request("job-after"))];
    let (_, _, replies) = run_to_end(dispatcher(app, records));

    let [fallback, next] = replies.as_slice() else {
        panic!("expected two replies, got {}", replies.len());
    };
    let sys = fallback.sys_params().expect("materialised");
    assert!(!sys.success);
    assert_eq!(fallback.reference(), "");
    assert_eq!(sys.error_string, "result could not be encoded");
    assert_eq!(next.reference(), "job-after");
    assert!(next.success().expect("materialised"));
}

#[rstest]
fn request_without_handler_sends_a_no_handler_result(app: ScriptedApp) {
    let mut request = Event::new(EventType::Perl);
    request.set_reference("job-4");
    request.set_dest_queue("scripts");
    let (_, broker, replies) = run_to_end(dispatcher(app, vec![Ok(request)]));

    assert_eq!(replies.len(), 1);
    let [follow_up] = broker.sent.as_slice() else {
        panic!("expected one follow-up, got {}", broker.sent.len());
    };
    assert_eq!(follow_up.event_type(), EventType::Result);
    assert_eq!(follow_up.dest_queue(), "scripts");
    assert_eq!(follow_up.reference(), "job-4");
    assert_eq!(follow_up.sys_params().expect("materialised").result, "failed");
    assert_eq!(follow_up.param("error").expect("present"), "no handler");
    assert_eq!(follow_up.param("generatedby").expect("present"), "tester");
}

#[rstest]
fn end_of_input_terminates_without_a_reply(app: ScriptedApp) {
    let (_, _, replies) = run_to_end(dispatcher(app, Vec::new()));
    assert!(replies.is_empty());
}

#[rstest]
fn write_failure_terminates_after_flushing_follow_ups(mut app: ScriptedApp) {
    let mut internal = Event::new(EventType::Script);
    internal.set_reference("follow-up");
    app.regular_output = vec![internal];
    let mut dispatcher = Dispatcher::new(
        "tester",
        app,
        RecordingBroker::default(),
        BrokenPipe,
        primary_input(vec![Ok(url_request("job-5")), Ok(url_request("job-6"))]),
    );

    let error = dispatcher.run().expect_err("reply cannot be written");
    assert!(matches!(error, DispatchError::Reply { .. }));
    assert!(dispatcher.context().is_terminating());
    let (app, broker, _) = dispatcher.into_parts();
    assert_eq!(broker.sent.len(), 1);
    assert_eq!(app.regular_runs, 1);
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[rstest]
fn stop_and_start_freeze_regular_tasks(app: ScriptedApp) {
    let records = vec![
        Ok(persistent(Some("stop"))),
        Ok(url_request("frozen")),
        Ok(persistent(Some("start"))),
        Ok(url_request("running")),
    ];
    let (app, _, replies) = run_to_end(dispatcher(app, records));

    assert_eq!(replies.len(), 4);
    // start, the second request, and the end-of-input iteration.
    assert_eq!(app.regular_runs, 3);
}

#[rstest]
fn frozen_loop_still_answers_requests(app: ScriptedApp) {
    let records = vec![Ok(persistent(Some("stop"))), Ok(url_request("frozen"))];
    let mut dispatcher = dispatcher(app, records);
    dispatcher.run().expect("loop finishes cleanly");

    assert_eq!(dispatcher.context().state(), LoopState::Terminating);
    assert!(dispatcher.context().is_frozen());
    let (app, _, output) = dispatcher.into_parts();
    assert_eq!(app.regular_runs, 0);
    let replies = replies(&output);
    assert_eq!(replies.len(), 2);
    assert!(replies.iter().all(|reply| reply.success().expect("materialised")));
}

#[rstest]
#[case::persistent_exit(persistent(Some("exit")))]
#[case::exit_when_done(command(Command::ExitWhenDone))]
fn exit_commands_finish_the_iteration_then_stop(app: ScriptedApp, #[case] exit: Event) {
    let records = vec![Ok(exit), Ok(url_request("never-read"))];
    let (app, _, replies) = run_to_end(dispatcher(app, records));

    assert!(app.exit_prepared);
    let [reply] = replies.as_slice() else {
        panic!("expected one reply, got {}", replies.len());
    };
    assert!(reply.success().expect("materialised"));
    assert_eq!(app.regular_runs, 1);
}

#[rstest]
fn startup_info_is_recorded(app: ScriptedApp) {
    let mut info = persistent(Some("startupinfo"));
    info.add_param("ownqueue", "worker-7").expect("materialised");
    info.add_param("workerpid", 4242).expect("materialised");
    let mut dispatcher = dispatcher(app, vec![Ok(info)]);
    dispatcher.run().expect("loop finishes cleanly");

    assert_eq!(dispatcher.context().own_queue(), Some("worker-7"));
    assert_eq!(dispatcher.context().worker_pid(), Some(4242));
}

#[rstest]
#[case::missing_cmd(persistent(None))]
#[case::unknown_cmd(persistent(Some("rebalance")))]
#[case::unknown_command(command(Command::DumpState))]
fn unrecognised_commands_reach_the_unhandled_hook(app: ScriptedApp, #[case] event: Event) {
    let reference = event.reference().to_owned();
    let (app, _, replies) = run_to_end(dispatcher(app, vec![Ok(event)]));

    assert_eq!(app.unhandled, vec![reference]);
    assert_eq!(replies.len(), 1);
}

#[rstest]
fn applications_can_claim_commands(mut app: ScriptedApp) {
    app.claim_commands = true;
    let (app, _, replies) = run_to_end(dispatcher(app, vec![Ok(command(Command::ExitWhenDone))]));

    assert!(!app.exit_prepared);
    let [reply] = replies.as_slice() else {
        panic!("expected one reply, got {}", replies.len());
    };
    assert_eq!(
        reply.sys_params().expect("materialised").error_string,
        "claimed"
    );
}

#[rstest]
fn reopen_log_reopens_then_notifies(app: ScriptedApp) {
    let reopener = Arc::new(CountingReopener::default());
    let mut dispatcher = dispatcher(app, vec![Ok(command(Command::ReopenLog))])
        .with_log_reopener(reopener.clone());
    dispatcher.run().expect("loop finishes cleanly");

    assert_eq!(reopener.0.load(Ordering::Relaxed), 1);
    assert_eq!(dispatcher.app().reopened, 1);
}

// ---------------------------------------------------------------------------
// Follow-ups and sources
// ---------------------------------------------------------------------------

#[rstest]
fn base_events_are_dispatched_internally(mut app: ScriptedApp) {
    let mut internal = Event::new(EventType::Base);
    internal.set_reference("tick");
    let mut outbound = Event::new(EventType::Url);
    outbound.set_reference("outbound");
    app.regular_output = vec![internal, outbound];

    let (app, broker, _) = run_to_end(dispatcher(app, vec![Ok(url_request("job-7"))]));

    assert_eq!(app.base_seen, vec!["tick".to_owned()]);
    let sent: Vec<&str> = broker.sent.iter().map(Event::reference).collect();
    assert_eq!(sent, vec!["outbound"]);
}

#[rstest]
fn broker_failures_do_not_stop_the_loop(mut app: ScriptedApp) {
    let mut outbound = Event::new(EventType::Url);
    outbound.set_reference("outbound");
    app.regular_output = vec![outbound];
    let mut broker = MockBrokerTransport::new();
    broker
        .expect_send()
        .times(1)
        .returning(|_| Err(TransportError::Detached));

    let mut dispatcher = Dispatcher::new(
        "tester",
        app,
        broker,
        Vec::new(),
        primary_input(vec![Ok(url_request("job-8")), Ok(url_request("job-9"))]),
    );
    dispatcher.run().expect("loop finishes cleanly");

    let (_, _, output) = dispatcher.into_parts();
    assert_eq!(replies(&output).len(), 2);
}

#[rstest]
fn extension_records_get_no_reply(app: ScriptedApp) {
    let mut multiplexer = Multiplexer::default();
    let extension = multiplexer.register_source();
    assert!(extension.deliver(Ok(url_request("side"))));
    assert!(multiplexer.primary_sender().deliver(Err(DecodeError::Eof)));

    let dispatcher = Dispatcher::new(
        "tester",
        app,
        RecordingBroker::default(),
        Vec::new(),
        multiplexer,
    );
    let (app, _, replies) = run_to_end(dispatcher);

    assert_eq!(app.extension_records, 1);
    assert!(replies.is_empty());
}

// ---------------------------------------------------------------------------
// Date roll-over
// ---------------------------------------------------------------------------

fn sample(minute: u8, hour: u8, day: u8, month: u8) -> DateSample {
    DateSample {
        minute,
        hour,
        day,
        month,
    }
}

#[rstest]
fn minute_changes_reach_regular_tasks(app: ScriptedApp) {
    let samples = Arc::new(Mutex::new(VecDeque::from([
        sample(5, 10, 3, 4),
        sample(5, 10, 3, 4),
        sample(6, 10, 3, 4),
    ])));
    let tracker = DateTracker::new(Box::new(ScriptedClock(samples)), false);
    let records = vec![Ok(url_request("a")), Ok(url_request("b"))];
    let dispatcher = dispatcher(app, records).with_date_tracker(tracker);

    let (app, _, _) = run_to_end(dispatcher);

    // First sample differs from the zeroed cache, third from the second.
    assert_eq!(app.minutely, 2);
    assert_eq!(app.regular_runs, 3);
}

#[rstest]
#[case::plain(false)]
#[case::skip_zero(true)]
fn midnight_roll_over_respects_skip_zero(#[case] skip_zero: bool) {
    let samples = Arc::new(Mutex::new(VecDeque::from([
        sample(59, 23, 31, 1),
        sample(0, 0, 1, 2),
    ])));
    let mut tracker = DateTracker::new(Box::new(ScriptedClock(samples)), skip_zero);
    let mut context = DispatchContext::new("tester");

    tracker.check(context.date_flags_mut());
    assert!(context.take_minutely());
    assert!(context.take_hourly());
    assert!(context.take_daily());
    assert!(context.take_monthly());

    tracker.check(context.date_flags_mut());
    assert_eq!(context.take_minutely(), !skip_zero);
    assert_eq!(context.take_hourly(), !skip_zero);
    assert!(context.take_daily());
    assert!(context.take_monthly());
}

#[test]
fn flags_are_consumed_once() {
    let samples = Arc::new(Mutex::new(VecDeque::from([sample(1, 1, 1, 1)])));
    let mut tracker = DateTracker::new(Box::new(ScriptedClock(samples)), false);
    let mut context = DispatchContext::new("tester");

    tracker.check(context.date_flags_mut());
    assert!(context.take_hourly());
    assert!(!context.take_hourly());
}
