//! Device selectors handed to a [`DeviceOpener`](crate::DeviceOpener)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vendor/product/serial triple identifying a device.
///
/// The stream never interprets it; resolving it to a handle is the opener's
/// job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<u64>,
}

impl DeviceIdentity {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            serial_number: None,
        }
    }

    pub fn with_serial(mut self, serial: u64) -> Self {
        self.serial_number = Some(serial);
        self
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)?;
        if let Some(serial) = self.serial_number {
            write!(f, ":{serial}")?;
        }
        Ok(())
    }
}

/// Either an identity or a platform device path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceAddress {
    Identity(DeviceIdentity),
    Path(String),
}

impl DeviceAddress {
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn as_identity(&self) -> Option<&DeviceIdentity> {
        match self {
            Self::Identity(identity) => Some(identity),
            Self::Path(_) => None,
        }
    }

    pub fn as_path(&self) -> Option<&str> {
        match self {
            Self::Identity(_) => None,
            Self::Path(path) => Some(path),
        }
    }
}

impl From<DeviceIdentity> for DeviceAddress {
    fn from(identity: DeviceIdentity) -> Self {
        Self::Identity(identity)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity(identity) => identity.fmt(f),
            Self::Path(path) => f.write_str(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_creation() {
        let identity = DeviceIdentity::new(0x1234, 0x5678);
        assert_eq!(identity.vendor_id, 0x1234);
        assert_eq!(identity.product_id, 0x5678);
        assert_eq!(identity.serial_number, None);
        assert!(identity.matches(0x1234, 0x5678));
        assert!(!identity.matches(0x1234, 0x9999));
    }

    #[test]
    fn test_address_display() {
        let address = DeviceAddress::from(DeviceIdentity::new(0x1209, 0xf1d0));
        assert_eq!(address.to_string(), "1209:f1d0");

        let address = DeviceAddress::from(DeviceIdentity::new(0x1209, 0xf1d0).with_serial(42));
        assert_eq!(address.to_string(), "1209:f1d0:42");

        let address = DeviceAddress::path("/dev/hidraw0");
        assert_eq!(address.to_string(), "/dev/hidraw0");
        assert_eq!(address.as_path(), Some("/dev/hidraw0"));
        assert!(address.as_identity().is_none());
    }
}
