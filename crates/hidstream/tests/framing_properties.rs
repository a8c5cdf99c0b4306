//! Property-based tests for report framing and stream ordering.

use hidstream::transport::mock::{MockOpener, MockReportDevice};
use hidstream::{DeviceAddress, HidStream, HidStreamError, ReportFraming, StreamConfig};
use proptest::prelude::*;

fn open_stream(
    device: &MockReportDevice,
    config: StreamConfig,
) -> Result<HidStream, HidStreamError> {
    let address = DeviceAddress::path("/dev/hidraw0");
    let opener = MockOpener::new().with_device(address.clone(), device.clone());
    let mut stream = HidStream::new(address, config, opener)?;
    stream.open()?;
    Ok(stream)
}

proptest! {
    #[test]
    fn test_framed_reports_have_fixed_length(
        report_size in 1usize..=128,
        report_id in any::<u8>(),
        chunk in proptest::collection::vec(any::<u8>(), 0..=128),
    ) {
        let framing = ReportFraming::new(report_size).with_report_id(report_id);
        let chunk = &chunk[..chunk.len().min(report_size)];
        let report = framing.frame_output(chunk);
        prop_assert!(report.is_ok());
        let report = report.unwrap_or_default();

        prop_assert_eq!(report.len(), report_size + 1);
        prop_assert_eq!(report[0], report_id);
        prop_assert_eq!(&report[1..=chunk.len()], chunk);
        prop_assert!(report[chunk.len() + 1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_normalize_strips_only_leading_zero(raw in proptest::collection::vec(any::<u8>(), 0..=65)) {
        let stripping = ReportFraming::default();
        let keeping = ReportFraming::default().with_strip_leading_zero(false);

        let normalized = stripping.normalize_input(&raw);
        match raw.first() {
            Some(0) => prop_assert_eq!(normalized, &raw[1..]),
            _ => prop_assert_eq!(normalized, raw.as_slice()),
        }
        prop_assert_eq!(keeping.normalize_input(&raw), raw.as_slice());
    }

    #[test]
    fn test_write_produces_ceil_reports(
        report_size in 1usize..=32,
        payload in proptest::collection::vec(any::<u8>(), 0..=256),
    ) {
        let device = MockReportDevice::new();
        let config = StreamConfig::builder().report_size(report_size).send_report_id(0x11).build();
        prop_assert!(config.is_ok());
        let stream = config.and_then(|config| open_stream(&device, config));
        prop_assert!(stream.is_ok());
        if let Ok(mut stream) = stream {
            prop_assert!(stream.write(&payload).is_ok());
        }

        let reports = device.get_write_history();
        prop_assert_eq!(reports.len(), payload.len().div_ceil(report_size));

        let mut carried = Vec::new();
        for report in &reports {
            prop_assert_eq!(report.len(), report_size + 1);
            prop_assert_eq!(report[0], 0x11);
            carried.extend_from_slice(&report[1..]);
        }
        prop_assert_eq!(&carried[..payload.len()], payload.as_slice());
    }

    #[test]
    fn test_reads_preserve_report_order(
        reports in proptest::collection::vec(proptest::collection::vec(1u8..=255, 1..=16), 1..=8),
        read_size in 1usize..=24,
    ) {
        let device = MockReportDevice::new();
        let mut expected = Vec::new();
        for payload in &reports {
            let mut raw = vec![0x00];
            raw.extend_from_slice(payload);
            device.queue_read(raw);
            expected.extend_from_slice(payload);
        }

        let config = StreamConfig::builder()
            .event_driven()
            .timeout(Some(std::time::Duration::from_millis(1)))
            .build();
        let stream = config.and_then(|config| open_stream(&device, config));
        prop_assert!(stream.is_ok());

        let mut received = Vec::new();
        if let Ok(mut stream) = stream {
            while received.len() + read_size <= expected.len() {
                let chunk = stream.read(read_size);
                prop_assert!(chunk.is_ok());
                let chunk = chunk.unwrap_or_default();
                prop_assert_eq!(chunk.len(), read_size);
                received.extend(chunk);
            }
            let rest = stream.receive();
            prop_assert!(rest.is_ok());
            received.extend(rest.unwrap_or_default());
        }

        prop_assert_eq!(received, expected);
    }
}
