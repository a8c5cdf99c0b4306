//! Common imports for stream users.
//!
//! ```
//! use hidstream::prelude::*;
//!
//! fn configure() -> HidStreamResult<StreamConfig> {
//!     StreamConfig::builder().report_size(32).event_driven().build()
//! }
//! # assert!(configure().is_ok());
//! ```

pub use crate::{
    AccessStrategy, DeviceAddress, DeviceIdentity, DeviceOpener, HidStream, HidStreamError,
    HidStreamResult, ReportTransport, StreamConfig, WakeSignal, Waitable,
};
