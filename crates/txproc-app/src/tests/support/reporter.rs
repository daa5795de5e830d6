//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::sync::Mutex;

use txproc_config::{BrokerEndpoints, Config};

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;
use crate::transport::{Greeting, TransportError};

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    BrokerConnecting,
    BrokerConnected { max_datagram: usize },
    BrokerDetached,
    BrokerFailed(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn broker_connecting(&self, _endpoints: &BrokerEndpoints) {
        self.record(HealthEvent::BrokerConnecting);
    }

    fn broker_connected(&self, greeting: &Greeting) {
        self.record(HealthEvent::BrokerConnected {
            max_datagram: greeting.max_datagram(),
        });
    }

    fn broker_detached(&self) {
        self.record(HealthEvent::BrokerDetached);
    }

    fn broker_failed(&self, error: &TransportError) {
        self.record(HealthEvent::BrokerFailed(error.to_string()));
    }
}
