//! Extension points a persistent application implements.
//!
//! Every hook has a default, so an application only overrides what it needs.
//! Any type implementing all five traits is an [`Application`] and can be
//! handed to the [`Dispatcher`](crate::Dispatcher).
//!
//! Hooks that return follow-up events may return any number of them. Events
//! of type `EV_BASE` are dispatched back into the handlers within the same
//! loop iteration; everything else is sent to the broker.

use tracing::{debug, info};

use txproc_event::Event;

use crate::dispatch::{DispatchContext, HandlerError};
use crate::multiplexer::SourceRecord;

const CAPABILITIES_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::capabilities");

/// Outcome of an event handler: follow-up events, or a failure that is
/// reported on the pending result.
pub type HandlerResult = Result<Vec<Event>, HandlerError>;

/// Log file hooks.
pub trait LogHooks {
    /// Called after the log has been re-opened in response to
    /// `CMD_REOPEN_LOG`.
    fn user_cmd_reopen_log(&mut self, _context: &mut DispatchContext) {}
}

/// Hooks run on every loop iteration.
pub trait LoopTasks {
    /// Called at the top of each iteration, before blocking for the next
    /// record.
    fn start_loop(&mut self, _context: &mut DispatchContext) {}

    /// Called after each record unless the loop is frozen. The date
    /// roll-over flags on `context` are meant to be consumed here.
    fn regular_tasks(&mut self, _context: &mut DispatchContext) -> Vec<Event> {
        Vec::new()
    }
}

/// Hook for records from sources other than standard input.
pub trait EventSources {
    /// Handles a record from an extension source. No reply is written for
    /// these records.
    fn handle_source_record(
        &mut self,
        _context: &mut DispatchContext,
        record: SourceRecord,
    ) -> Vec<Event> {
        info!(
            target: CAPABILITIES_TARGET,
            source = %record.source,
            "no handler for additional event source"
        );
        Vec::new()
    }
}

/// Process lifecycle hooks.
pub trait Lifecycle {
    /// Called once termination has been requested by `CMD_EXIT_WHEN_DONE` or
    /// the persistent `exit` command.
    fn prepare_to_exit(&mut self, _context: &mut DispatchContext, _event: &Event) -> Vec<Event> {
        Vec::new()
    }

    /// Handles `CMD_STATS`.
    fn generate_stats(&mut self, _context: &mut DispatchContext, _event: &Event) -> HandlerResult {
        Ok(Vec::new())
    }
}

/// Per event type handlers.
///
/// Perl, URL and other request types answer with a "no handler" result by
/// default. Result, base and error events are informational and are ignored.
pub trait EventHandlers {
    /// Gives the application first refusal on `EV_COMMAND` events. Returning
    /// `None` lets the built-in command routing run.
    fn handle_command(
        &mut self,
        _context: &mut DispatchContext,
        _event: &Event,
    ) -> Option<HandlerResult> {
        None
    }

    /// Handles `EV_PERL`.
    fn handle_perl(&mut self, context: &mut DispatchContext, event: &Event) -> HandlerResult {
        no_handler(context, event)
    }

    /// Handles `EV_URL`.
    fn handle_url(&mut self, context: &mut DispatchContext, event: &Event) -> HandlerResult {
        no_handler(context, event)
    }

    /// Handles `EV_RESULT`.
    fn handle_result(&mut self, _context: &mut DispatchContext, _event: &Event) -> HandlerResult {
        Ok(Vec::new())
    }

    /// Handles `EV_BASE`, including internal follow-up events.
    fn handle_base(&mut self, _context: &mut DispatchContext, _event: &Event) -> HandlerResult {
        Ok(Vec::new())
    }

    /// Handles `EV_ERROR`.
    fn handle_error(&mut self, _context: &mut DispatchContext, _event: &Event) -> HandlerResult {
        Ok(Vec::new())
    }

    /// Handles every other event type.
    fn handle_other(&mut self, context: &mut DispatchContext, event: &Event) -> HandlerResult {
        no_handler(context, event)
    }

    /// Handles command codes the built-in routing does not recognise.
    fn handle_unhandled_command(
        &mut self,
        _context: &mut DispatchContext,
        event: &Event,
    ) -> HandlerResult {
        debug!(
            target: CAPABILITIES_TARGET,
            reference = %event.reference(),
            "unhandled command"
        );
        Ok(Vec::new())
    }

    /// Handles `CMD_PERSISTENT_APP` events whose `cmd` parameter is missing
    /// or not one of `stop`, `start`, `exit` or `startupinfo`.
    fn handle_user_persistent_command(
        &mut self,
        context: &mut DispatchContext,
        event: &Event,
    ) -> HandlerResult {
        self.handle_unhandled_command(context, event)
    }
}

/// A complete persistent application.
pub trait Application: LogHooks + LoopTasks + EventSources + Lifecycle + EventHandlers {}

impl<T> Application for T where T: LogHooks + LoopTasks + EventSources + Lifecycle + EventHandlers {}

fn no_handler(context: &DispatchContext, event: &Event) -> HandlerResult {
    debug!(
        target: CAPABILITIES_TARGET,
        event_type = %event.event_type(),
        reference = %event.reference(),
        "no handler registered"
    );
    Ok(vec![context.return_event(event, "failed", "no handler")?])
}
