use crate::HidrawDevice;
use hidstream::{DeviceAddress, DeviceOpener, HidStreamError, HidStreamResult, ReportTransport};

/// Opens `/dev/hidraw*` nodes by path.
///
/// Identities are rejected: mapping vendor/product to a node needs device
/// enumeration, which callers do before constructing the stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct HidrawOpener;

impl HidrawOpener {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceOpener for HidrawOpener {
    fn open_device(&self, address: &DeviceAddress) -> HidStreamResult<Box<dyn ReportTransport>> {
        let path = address.as_path().ok_or_else(|| {
            HidStreamError::open_failed(address.to_string(), "hidraw needs a device path")
        })?;
        let device = HidrawDevice::open(path)
            .map_err(|e| HidStreamError::open_failed(path, e.to_string()))?;
        Ok(Box::new(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hidstream::DeviceIdentity;

    #[test]
    fn test_identity_is_rejected() {
        let opener = HidrawOpener::new();
        let address = DeviceAddress::from(DeviceIdentity::new(0x1209, 0xf1d0));
        let result = opener.open_device(&address);
        assert!(matches!(
            result,
            Err(HidStreamError::DeviceOpenFailed { ref device, .. }) if device == "1209:f1d0"
        ));
    }

    #[test]
    fn test_missing_path_is_open_failure() {
        let opener = HidrawOpener::new();
        let result = opener.open_device(&DeviceAddress::path("/dev/hidraw-missing"));
        assert!(matches!(
            result,
            Err(HidStreamError::DeviceOpenFailed { ref device, .. }) if device == "/dev/hidraw-missing"
        ));
    }
}
