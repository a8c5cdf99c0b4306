use crate::HidApiTransport;
use hidapi::HidApi;
use hidstream::{DeviceAddress, DeviceOpener, HidStreamError, HidStreamResult, ReportTransport};
use std::ffi::CString;
use tracing::info;

/// Opens devices through hidapi, by identity or by platform path.
pub struct HidApiOpener {
    api: HidApi,
}

impl HidApiOpener {
    /// Initialise hidapi without enumerating; opening by identity lets
    /// hidapi search on demand.
    pub fn new() -> HidStreamResult<Self> {
        let api = HidApi::new_without_enumerate()
            .map_err(|e| HidStreamError::transport(format!("hidapi init failed: {e}")))?;
        Ok(Self { api })
    }
}

impl DeviceOpener for HidApiOpener {
    fn open_device(&self, address: &DeviceAddress) -> HidStreamResult<Box<dyn ReportTransport>> {
        let name = address.to_string();
        let device = match address {
            DeviceAddress::Identity(identity) => match identity.serial_number {
                Some(serial) => self.api.open_serial(
                    identity.vendor_id,
                    identity.product_id,
                    &serial.to_string(),
                ),
                None => self.api.open(identity.vendor_id, identity.product_id),
            },
            DeviceAddress::Path(path) => {
                let path = CString::new(path.as_str())
                    .map_err(|e| HidStreamError::open_failed(name.clone(), e.to_string()))?;
                self.api.open_path(&path)
            }
        }
        .map_err(|e| HidStreamError::open_failed(name.clone(), e.to_string()))?;

        info!(device = %name, "Opened device through hidapi");
        Ok(Box::new(HidApiTransport::new(device, name)))
    }
}
