//! State shared between the dispatch loop and application handlers.

use txproc_event::{Event, EventError, EventType};

use super::dates::DateFlags;

/// Coarse lifecycle state of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Processing events and running regular tasks.
    Running,
    /// Processing events; regular tasks are suspended.
    Frozen,
    /// Finishing the current iteration before exiting.
    Terminating,
}

/// Per-application state handed to every hook.
///
/// Holds the pending result for the request being processed, the broker
/// assigned queue and worker id, and the date roll-over flags.
#[derive(Debug)]
pub struct DispatchContext {
    app_name: String,
    pending: Option<Event>,
    own_queue: Option<String>,
    worker_pid: Option<u32>,
    dates: DateFlags,
    frozen: bool,
    terminating: bool,
}

impl DispatchContext {
    /// Creates a context for `app_name`.
    #[must_use]
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            pending: None,
            own_queue: None,
            worker_pid: None,
            dates: DateFlags::default(),
            frozen: false,
            terminating: false,
        }
    }

    /// Application name stamped on generated results.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LoopState {
        if self.terminating {
            LoopState::Terminating
        } else if self.frozen {
            LoopState::Frozen
        } else {
            LoopState::Running
        }
    }

    /// Reports whether regular tasks are suspended.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Reports whether the loop will exit after this iteration.
    #[must_use]
    pub const fn is_terminating(&self) -> bool {
        self.terminating
    }

    /// Asks the loop to exit once the current iteration completes.
    pub const fn request_termination(&mut self) {
        self.terminating = true;
    }

    pub(crate) const fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Result that will be written for the request being processed.
    #[must_use]
    pub const fn pending_result(&self) -> Option<&Event> {
        self.pending.as_ref()
    }

    /// Mutable access to the pending result, for handlers that report
    /// details back to the requester.
    pub const fn pending_result_mut(&mut self) -> Option<&mut Event> {
        self.pending.as_mut()
    }

    /// Replaces the pending result.
    pub fn set_pending_result(&mut self, result: Event) {
        self.pending = Some(result);
    }

    pub(crate) const fn take_pending_result(&mut self) -> Option<Event> {
        self.pending.take()
    }

    /// Queue name the broker assigned to this worker.
    #[must_use]
    pub fn own_queue(&self) -> Option<&str> {
        self.own_queue.as_deref()
    }

    /// Worker process id reported by the broker.
    #[must_use]
    pub const fn worker_pid(&self) -> Option<u32> {
        self.worker_pid
    }

    pub(crate) fn record_startup_info(&mut self, own_queue: Option<String>, worker_pid: Option<u32>) {
        self.own_queue = own_queue;
        self.worker_pid = worker_pid;
    }

    /// Consumes the minutely roll-over flag.
    pub const fn take_minutely(&mut self) -> bool {
        std::mem::replace(&mut self.dates.minutely, false)
    }

    /// Consumes the hourly roll-over flag.
    pub const fn take_hourly(&mut self) -> bool {
        std::mem::replace(&mut self.dates.hourly, false)
    }

    /// Consumes the daily roll-over flag.
    pub const fn take_daily(&mut self) -> bool {
        std::mem::replace(&mut self.dates.daily, false)
    }

    /// Consumes the monthly roll-over flag.
    pub const fn take_monthly(&mut self) -> bool {
        std::mem::replace(&mut self.dates.monthly, false)
    }

    pub(crate) const fn date_flags_mut(&mut self) -> &mut DateFlags {
        &mut self.dates
    }

    /// Builds an `EV_RESULT` event answering `inbound` on its destination
    /// queue, with `result` as the result text and a `generatedby`
    /// parameter naming this application. A non-empty `error` is added as
    /// the `error` parameter.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] if a parameter cannot be attached.
    pub fn return_event(&self, inbound: &Event, result: &str, error: &str) -> Result<Event, EventError> {
        let mut event = Event::new(EventType::Result);
        event.set_dest_queue(inbound.dest_queue());
        event.set_reference(inbound.reference());
        event.set_result(result)?;
        event.add_param("generatedby", &self.app_name)?;
        if !error.is_empty() {
            event.add_param("error", error)?;
        }
        Ok(event)
    }

    /// Builds the default reply for `inbound`: a successful `EV_RESULT`
    /// carrying the inbound reference, addressed to the inbound
    /// `resultQueue` parameter when present.
    pub(crate) fn default_result(&self, inbound: &Event) -> Result<Event, EventError> {
        let mut event = Event::new(EventType::Result);
        event.set_success(true)?;
        event.set_reference(inbound.reference());
        if let Ok(queue) = inbound.param("resultQueue") {
            event.set_dest_queue(queue);
        }
        event.add_param("generatedby", &self.app_name)?;
        Ok(event)
    }

    /// Marks the pending result as failed with `message`.
    pub(crate) fn fail_pending(&mut self, message: &str) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        if let Ok(sys) = pending.sys_params_mut() {
            sys.success = false;
            sys.result = "failed".to_owned();
            sys.error_string = message.to_owned();
        }
    }
}

/// A failed `EV_RESULT` carrying `message`.
pub(crate) fn failure_result(reference: &str, message: &str) -> Event {
    let mut event = Event::new(EventType::Result);
    event.set_reference(reference);
    if let Ok(sys) = event.sys_params_mut() {
        sys.success = false;
        sys.error_string = message.to_owned();
    }
    event
}

/// A bare successful `EV_RESULT`, written when no result was prepared.
pub(crate) fn generic_success() -> Event {
    let mut event = Event::new(EventType::Result);
    if let Ok(sys) = event.sys_params_mut() {
        sys.success = true;
    }
    event
}
