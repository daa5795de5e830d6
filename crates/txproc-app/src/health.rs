//! Structured health reporting for application lifecycle events.

use std::sync::Arc;

use txproc_config::{BrokerEndpoints, Config};

use crate::bootstrap::BootstrapError;
use crate::transport::{Greeting, TransportError};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before the broker sockets are dialled.
    fn broker_connecting(&self, endpoints: &BrokerEndpoints);

    /// Invoked once the stream greeting has been accepted.
    fn broker_connected(&self, greeting: &Greeting);

    /// Invoked when no broker paths are configured.
    fn broker_detached(&self);

    /// Invoked when dialling the broker fails.
    fn broker_failed(&self, error: &TransportError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn broker_connecting(&self, endpoints: &BrokerEndpoints) {
        (**self).broker_connecting(endpoints);
    }

    fn broker_connected(&self, greeting: &Greeting) {
        (**self).broker_connected(greeting);
    }

    fn broker_detached(&self) {
        (**self).broker_detached();
    }

    fn broker_failed(&self, error: &TransportError) {
        (**self).broker_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting application bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            log_dir = %config.log_dir(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            check_date_changes = config.check_date_changes,
            "application bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "application bootstrap failed"
        );
    }

    fn broker_connecting(&self, endpoints: &BrokerEndpoints) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "broker_connecting",
            datagram = %endpoints.datagram,
            stream = %endpoints.stream,
            "dialling broker sockets"
        );
    }

    fn broker_connected(&self, greeting: &Greeting) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "broker_connected",
            protocol_version = %greeting.protocol_version(),
            max_datagram = greeting.max_datagram(),
            "broker greeting accepted"
        );
    }

    fn broker_detached(&self) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "broker_detached",
            "no broker sockets configured; follow-up events will be dropped"
        );
    }

    fn broker_failed(&self, error: &TransportError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "broker_failed",
            error = %error,
            "failed to connect to the broker"
        );
    }
}
