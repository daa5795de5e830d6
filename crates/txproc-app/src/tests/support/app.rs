//! Application double recording which hooks ran.

use txproc_event::Event;

use crate::capabilities::{
    EventHandlers, EventSources, HandlerResult, Lifecycle, LogHooks, LoopTasks,
};
use crate::dispatch::{DispatchContext, HandlerError};

/// Answers URL requests with `fetched`, rejects script requests, and counts
/// regular task runs.
#[derive(Debug, Default)]
pub struct RecordingApp {
    pub regular_runs: usize,
    pub exit_prepared: bool,
    pub follow_ups: Vec<Event>,
}

impl LogHooks for RecordingApp {}

impl LoopTasks for RecordingApp {
    fn regular_tasks(&mut self, _context: &mut DispatchContext) -> Vec<Event> {
        self.regular_runs += 1;
        std::mem::take(&mut self.follow_ups)
    }
}

impl EventSources for RecordingApp {}

impl Lifecycle for RecordingApp {
    fn prepare_to_exit(&mut self, _context: &mut DispatchContext, _event: &Event) -> Vec<Event> {
        self.exit_prepared = true;
        Vec::new()
    }
}

impl EventHandlers for RecordingApp {
    fn handle_url(&mut self, context: &mut DispatchContext, _event: &Event) -> HandlerResult {
        if let Some(pending) = context.pending_result_mut() {
            pending.set_result("fetched")?;
        }
        Ok(Vec::new())
    }

    fn handle_other(&mut self, _context: &mut DispatchContext, event: &Event) -> HandlerResult {
        Err(HandlerError::failed(format!(
            "{} is not supported",
            event.event_type()
        )))
    }
}
