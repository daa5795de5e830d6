//! The single-threaded dispatch loop.
//!
//! Each iteration optionally samples the clock for date roll-overs, runs the
//! start-of-loop hook, then blocks for one record from the [`Multiplexer`].
//! Every record from standard input gets exactly one reply frame on the
//! primary output, whether it decoded, failed to decode, or its handler
//! failed. Follow-up events gathered during the iteration are flushed before
//! the next blocking receive: `EV_BASE` events are fed back into the
//! handlers and everything else goes to the broker.

mod context;
mod dates;
mod errors;
#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use txproc_event::{Command, DecodeError, Event, EventType};

use crate::capabilities::{Application, HandlerResult};
use crate::log_sink::LogReopener;
use crate::multiplexer::Multiplexer;
use crate::transport::BrokerTransport;

pub use self::context::{DispatchContext, LoopState};
pub use self::dates::{Clock, DateSample, DateTracker, SystemClock};
pub use self::errors::{DispatchError, HandlerError};

use self::context::{failure_result, generic_success};

/// Error string of the reply sent when a result exceeds the frame limits.
const UNENCODABLE_REPLY: &str = "result could not be encoded";

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Drives an [`Application`] from multiplexed event sources.
pub struct Dispatcher<A, T, W> {
    app: A,
    broker: T,
    output: W,
    multiplexer: Multiplexer,
    log: Option<Arc<dyn LogReopener>>,
    dates: Option<DateTracker>,
    context: DispatchContext,
}

impl<A, T, W> Dispatcher<A, T, W>
where
    A: Application,
    T: BrokerTransport,
    W: Write,
{
    /// Creates a loop writing replies to `output` and follow-up events to
    /// `broker`.
    pub fn new(
        app_name: impl Into<String>,
        app: A,
        broker: T,
        output: W,
        multiplexer: Multiplexer,
    ) -> Self {
        Self {
            app,
            broker,
            output,
            multiplexer,
            log: None,
            dates: None,
            context: DispatchContext::new(app_name),
        }
    }

    /// Re-opens `log` when `CMD_REOPEN_LOG` arrives.
    #[must_use]
    pub fn with_log_reopener(mut self, log: Arc<dyn LogReopener>) -> Self {
        self.log = Some(log);
        self
    }

    /// Enables date roll-over flags driven by `tracker`.
    #[must_use]
    pub fn with_date_tracker(mut self, tracker: DateTracker) -> Self {
        self.dates = Some(tracker);
        self
    }

    /// Shared handler context.
    pub const fn context(&self) -> &DispatchContext {
        &self.context
    }

    /// The driven application.
    pub const fn app(&self) -> &A {
        &self.app
    }

    /// Multiplexer feeding the loop, for registering extension sources.
    pub const fn multiplexer_mut(&mut self) -> &mut Multiplexer {
        &mut self.multiplexer
    }

    /// Releases the application, transport and output.
    pub fn into_parts(self) -> (A, T, W) {
        (self.app, self.broker, self.output)
    }

    /// Runs until termination is requested.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Reply`] when a reply could not be written to
    /// the primary output. Follow-up events gathered in that iteration are
    /// still flushed before returning.
    pub fn run(&mut self) -> Result<(), DispatchError> {
        info!(
            target: DISPATCH_TARGET,
            app = %self.context.app_name(),
            "dispatch loop starting"
        );
        let mut failure = None;
        while !self.context.is_terminating() {
            if let Err(source) = self.iterate() {
                failure = Some(source);
            }
        }
        self.multiplexer.termination().request();
        info!(target: DISPATCH_TARGET, "dispatch loop finished");
        failure.map_or(Ok(()), |source| Err(DispatchError::Reply { source }))
    }

    fn iterate(&mut self) -> io::Result<()> {
        if let Some(tracker) = self.dates.as_mut() {
            tracker.check(self.context.date_flags_mut());
        }
        self.app.start_loop(&mut self.context);

        let Some(record) = self.multiplexer.recv() else {
            warn!(target: DISPATCH_TARGET, "all event sources closed");
            self.context.request_termination();
            return Ok(());
        };

        let mut follow_ups = Vec::new();
        let outcome = if record.source.is_primary() {
            self.handle_primary(record.payload, &mut follow_ups)
        } else {
            follow_ups.extend(self.app.handle_source_record(&mut self.context, record));
            Ok(())
        };

        if !self.context.is_frozen() {
            follow_ups.extend(self.app.regular_tasks(&mut self.context));
        }
        self.flush(follow_ups);

        if self.context.is_terminating() {
            self.multiplexer.termination().request();
        }
        outcome
    }

    fn handle_primary(
        &mut self,
        payload: Result<Event, DecodeError>,
        follow_ups: &mut Vec<Event>,
    ) -> io::Result<()> {
        match payload {
            Err(DecodeError::Eof) => {
                info!(target: DISPATCH_TARGET, "standard input closed; terminating");
                self.context.request_termination();
                return Ok(());
            }
            Err(decode_error) => {
                warn!(target: DISPATCH_TARGET, error = %decode_error, "undecodable request");
                self.context
                    .set_pending_result(failure_result("", &decode_error.to_string()));
            }
            Ok(event) => {
                info!(target: DISPATCH_TARGET, event = %event, "request received");
                let result = self
                    .context
                    .default_result(&event)
                    .unwrap_or_else(|build_error| {
                        failure_result(event.reference(), &build_error.to_string())
                    });
                self.context.set_pending_result(result);
                follow_ups.extend(self.dispatch(&event));
            }
        }
        self.write_reply()
    }

    fn write_reply(&mut self) -> io::Result<()> {
        let result = self
            .context
            .take_pending_result()
            .unwrap_or_else(generic_success);
        let frame = match result.encode() {
            Ok(frame) => frame,
            Err(encode_error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    reference = %result.reference(),
                    error = %encode_error,
                    "result could not be encoded; replying with a failure"
                );
                match failure_result("", UNENCODABLE_REPLY).encode() {
                    Ok(frame) => frame,
                    Err(fallback_error) => {
                        error!(
                            target: DISPATCH_TARGET,
                            error = %fallback_error,
                            "failure reply could not be encoded; terminating"
                        );
                        self.context.request_termination();
                        return Err(io::Error::other(fallback_error));
                    }
                }
            }
        };

        if let Err(write_error) = self
            .output
            .write_all(&frame)
            .and_then(|()| self.output.flush())
        {
            error!(
                target: DISPATCH_TARGET,
                error = %write_error,
                "failed to write reply; terminating"
            );
            self.context.request_termination();
            return Err(write_error);
        }
        debug!(target: DISPATCH_TARGET, reply = %result, "reply written");
        Ok(())
    }

    fn dispatch(&mut self, event: &Event) -> Vec<Event> {
        let outcome = match event.event_type() {
            EventType::Command => self.dispatch_command(event),
            EventType::Perl => self.app.handle_perl(&mut self.context, event),
            EventType::Url => self.app.handle_url(&mut self.context, event),
            EventType::Result => self.app.handle_result(&mut self.context, event),
            EventType::Base => self.app.handle_base(&mut self.context, event),
            EventType::Error => self.app.handle_error(&mut self.context, event),
            _ => self.app.handle_other(&mut self.context, event),
        };
        match outcome {
            Ok(events) => events,
            Err(handler_error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    reference = %event.reference(),
                    error = %handler_error,
                    "handler failed"
                );
                self.context.fail_pending(&handler_error.to_string());
                Vec::new()
            }
        }
    }

    fn dispatch_command(&mut self, event: &Event) -> HandlerResult {
        if let Some(outcome) = self.app.handle_command(&mut self.context, event) {
            return outcome;
        }

        let command = event.command()?;
        info!(target: DISPATCH_TARGET, command = %command, "command received");
        match command {
            Command::ReopenLog => {
                self.reopen_log();
                self.app.user_cmd_reopen_log(&mut self.context);
                Ok(Vec::new())
            }
            Command::Stats => self.app.generate_stats(&mut self.context, event),
            Command::ExitWhenDone => Ok(self.begin_exit(event)),
            Command::PersistentApp => self.dispatch_persistent(event),
            _ => self.app.handle_unhandled_command(&mut self.context, event),
        }
    }

    fn dispatch_persistent(&mut self, event: &Event) -> HandlerResult {
        match event.param("cmd").ok() {
            Some("stop") => {
                info!(target: DISPATCH_TARGET, "freezing regular tasks");
                self.context.set_frozen(true);
                Ok(Vec::new())
            }
            Some("start") => {
                info!(target: DISPATCH_TARGET, "resuming regular tasks");
                self.context.set_frozen(false);
                Ok(Vec::new())
            }
            Some("exit") => Ok(self.begin_exit(event)),
            Some("startupinfo") => {
                let own_queue = event.param("ownqueue").ok().map(str::to_owned);
                let worker_pid = event.param_as::<u32>("workerpid").ok();
                info!(
                    target: DISPATCH_TARGET,
                    own_queue = ?own_queue,
                    worker_pid = ?worker_pid,
                    "startup info recorded"
                );
                self.context.record_startup_info(own_queue, worker_pid);
                Ok(Vec::new())
            }
            _ => self
                .app
                .handle_user_persistent_command(&mut self.context, event),
        }
    }

    fn begin_exit(&mut self, event: &Event) -> Vec<Event> {
        info!(target: DISPATCH_TARGET, "exit requested");
        self.context.request_termination();
        self.app.prepare_to_exit(&mut self.context, event)
    }

    fn reopen_log(&self) {
        let Some(log) = &self.log else {
            return;
        };
        match log.reopen() {
            Ok(()) => info!(target: DISPATCH_TARGET, "log reopened"),
            Err(reopen_error) => warn!(
                target: DISPATCH_TARGET,
                error = %reopen_error,
                "log reopen failed"
            ),
        }
    }

    fn flush(&mut self, follow_ups: Vec<Event>) {
        let mut queue = VecDeque::from(follow_ups);
        while let Some(event) = queue.pop_front() {
            if event.event_type() == EventType::Base {
                debug!(target: DISPATCH_TARGET, event = %event, "dispatching internal event");
                queue.extend(self.dispatch(&event));
                continue;
            }
            match self.broker.send(&event) {
                Ok(outcome) => info!(
                    target: DISPATCH_TARGET,
                    event = %event,
                    outcome = ?outcome,
                    "follow-up sent"
                ),
                Err(send_error) => warn!(
                    target: DISPATCH_TARGET,
                    event = %event,
                    error = %send_error,
                    "follow-up dropped"
                ),
            }
        }
    }
}
