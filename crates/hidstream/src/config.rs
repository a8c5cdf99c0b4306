//! Stream configuration

use crate::report::{DEFAULT_REPORT_SIZE, ReportFraming};
use crate::{HidStreamError, HidStreamResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-call bound for a blocking report read under the direct strategy.
pub const DEFAULT_DIRECT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// How the stream obtains reports from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessStrategy {
    /// The transport's own read call blocks, bounded by `read_timeout`.
    Direct { read_timeout: Duration },
    /// A registered waitable is polled before reports are pulled.
    EventDriven,
}

impl AccessStrategy {
    pub fn direct() -> Self {
        Self::Direct {
            read_timeout: DEFAULT_DIRECT_READ_TIMEOUT,
        }
    }

    pub fn is_event_driven(&self) -> bool {
        matches!(self, Self::EventDriven)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::EventDriven => "event-driven",
        }
    }
}

impl Default for AccessStrategy {
    fn default() -> Self {
        Self::direct()
    }
}

/// Configuration for a [`HidStream`](crate::HidStream).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Payload bytes per report.
    pub report_size: usize,
    /// Byte prefixed to every outgoing report.
    pub send_report_id: u8,
    /// Drop a leading `0x00` from incoming reports.
    pub input_strip_leading_zero: bool,
    pub strategy: AccessStrategy,
    /// Initial per-wait timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            report_size: DEFAULT_REPORT_SIZE,
            send_report_id: 0,
            input_strip_leading_zero: true,
            strategy: AccessStrategy::default(),
            timeout: None,
        }
    }
}

impl StreamConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> HidStreamResult<()> {
        if self.report_size == 0 {
            return Err(HidStreamError::invalid_configuration(
                "report_size must be greater than 0",
            ));
        }
        if matches!(self.strategy, AccessStrategy::Direct { read_timeout } if read_timeout.is_zero())
        {
            return Err(HidStreamError::invalid_configuration(
                "direct read_timeout must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Framing rules derived from this configuration.
    pub fn framing(&self) -> ReportFraming {
        ReportFraming::new(self.report_size)
            .with_report_id(self.send_report_id)
            .with_strip_leading_zero(self.input_strip_leading_zero)
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::default()
    }
}

/// Builder for `StreamConfig`.
#[derive(Debug, Default)]
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    #[must_use]
    pub fn report_size(mut self, size: usize) -> Self {
        self.config.report_size = size;
        self
    }

    #[must_use]
    pub fn send_report_id(mut self, report_id: u8) -> Self {
        self.config.send_report_id = report_id;
        self
    }

    #[must_use]
    pub fn input_strip_leading_zero(mut self, strip: bool) -> Self {
        self.config.input_strip_leading_zero = strip;
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: AccessStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Use the direct strategy with the given per-call read bound.
    #[must_use]
    pub fn direct(self, read_timeout: Duration) -> Self {
        self.strategy(AccessStrategy::Direct { read_timeout })
    }

    #[must_use]
    pub fn event_driven(self) -> Self {
        self.strategy(AccessStrategy::EventDriven)
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> HidStreamResult<StreamConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
