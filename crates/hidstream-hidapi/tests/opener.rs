//! Opener behaviour that does not need real hardware.

use hidstream::{DeviceAddress, DeviceIdentity, HidStream, HidStreamError, StreamConfig};
use hidstream_hidapi::HidApiOpener;

#[test]
fn path_with_nul_byte_is_open_failure() {
    // hidapi may be unavailable in sandboxes; nothing to check then.
    let Ok(opener) = HidApiOpener::new() else {
        return;
    };
    let result = HidStream::new(DeviceAddress::path("bad\0path"), StreamConfig::default(), opener)
        .and_then(|mut stream| stream.open());
    assert!(matches!(
        result,
        Err(HidStreamError::DeviceOpenFailed { ref device, .. }) if device == "bad\0path"
    ));
}

#[test]
fn unknown_identity_is_open_failure() {
    let Ok(opener) = HidApiOpener::new() else {
        return;
    };
    // Vendor 0x0000 is reserved and never assigned.
    let identity = DeviceIdentity::new(0x0000, 0x0000).with_serial(1);
    let result = HidStream::new(identity, StreamConfig::default(), opener)
        .and_then(|mut stream| stream.open());
    assert!(matches!(
        result,
        Err(HidStreamError::DeviceOpenFailed { .. })
    ));
}
