//! A small persistent application built on [`txproc_app`].
//!
//! The application acknowledges URL requests, counts them, reports the count
//! on `CMD_STATS`, and emits an internal heartbeat once a minute when date
//! tracking is enabled. The counter resets at the start of each day.

use tracing::info;
use txproc_app::capabilities::{EventHandlers, EventSources, Lifecycle, LogHooks, LoopTasks};
use txproc_app::{DispatchContext, HandlerError, HandlerResult};
use txproc_event::{Event, EventType};

/// Name the process registers its log file and sockets under.
pub const APP_NAME: &str = "txproc-example";

const EXAMPLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::app");

/// Reference carried by heartbeat events.
pub const HEARTBEAT_REFERENCE: &str = "heartbeat";

/// URL acknowledging application.
#[derive(Debug, Default)]
pub struct Acknowledger {
    processed: u64,
    heartbeats: u64,
}

impl Acknowledger {
    /// Number of URL requests acknowledged since the last daily reset.
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.processed
    }

    /// Number of heartbeats handled.
    #[must_use]
    pub const fn heartbeats(&self) -> u64 {
        self.heartbeats
    }
}

impl LogHooks for Acknowledger {
    fn user_cmd_reopen_log(&mut self, _context: &mut DispatchContext) {
        info!(target: EXAMPLE_TARGET, processed = self.processed, "log reopened");
    }
}

impl LoopTasks for Acknowledger {
    fn regular_tasks(&mut self, context: &mut DispatchContext) -> Vec<Event> {
        if context.take_daily() {
            self.processed = 0;
        }
        if !context.take_minutely() {
            return Vec::new();
        }
        let mut heartbeat = Event::new(EventType::Base);
        heartbeat.set_reference(HEARTBEAT_REFERENCE);
        vec![heartbeat]
    }
}

impl EventSources for Acknowledger {}

impl Lifecycle for Acknowledger {
    fn prepare_to_exit(&mut self, _context: &mut DispatchContext, _event: &Event) -> Vec<Event> {
        info!(target: EXAMPLE_TARGET, processed = self.processed, "exiting");
        Vec::new()
    }

    fn generate_stats(&mut self, context: &mut DispatchContext, _event: &Event) -> HandlerResult {
        if let Some(pending) = context.pending_result_mut() {
            pending.add_param("processed", self.processed)?;
            pending.add_param("heartbeats", self.heartbeats)?;
        }
        Ok(Vec::new())
    }
}

impl EventHandlers for Acknowledger {
    fn handle_url(&mut self, context: &mut DispatchContext, event: &Event) -> HandlerResult {
        let url = event.sys_params()?.url.clone();
        if url.is_empty() {
            return Err(HandlerError::failed("request carries no url"));
        }
        self.processed += 1;
        if let Some(pending) = context.pending_result_mut() {
            pending.set_result(format!("acknowledged {url}"))?;
        }
        Ok(Vec::new())
    }

    fn handle_base(&mut self, _context: &mut DispatchContext, event: &Event) -> HandlerResult {
        if event.reference() == HEARTBEAT_REFERENCE {
            self.heartbeats += 1;
            info!(
                target: EXAMPLE_TARGET,
                processed = self.processed,
                heartbeats = self.heartbeats,
                "heartbeat"
            );
        }
        Ok(Vec::new())
    }
}
