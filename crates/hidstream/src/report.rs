//! HID report framing
//!
//! Outbound: `[report id][payload <= report_size][zero padding]`, always
//! `report_size + 1` bytes. Inbound: an optional leading `0x00` is dropped.

use crate::{HidStreamError, HidStreamResult};

/// Payload bytes per report on the devices this crate was built for.
pub const DEFAULT_REPORT_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportFraming {
    report_size: usize,
    report_id: u8,
    strip_leading_zero: bool,
}

impl ReportFraming {
    /// A zero `report_size` is bumped to one so chunking stays well defined.
    pub fn new(report_size: usize) -> Self {
        Self {
            report_size: report_size.max(1),
            report_id: 0,
            strip_leading_zero: true,
        }
    }

    pub fn with_report_id(mut self, report_id: u8) -> Self {
        self.report_id = report_id;
        self
    }

    pub fn with_strip_leading_zero(mut self, strip: bool) -> Self {
        self.strip_leading_zero = strip;
        self
    }

    pub fn report_size(&self) -> usize {
        self.report_size
    }

    /// Length of every framed outbound report, report-ID byte included.
    pub fn output_report_length(&self) -> usize {
        self.report_size + 1
    }

    pub fn report_id(&self) -> u8 {
        self.report_id
    }

    pub fn set_report_id(&mut self, report_id: u8) {
        self.report_id = report_id;
    }

    pub fn strips_leading_zero(&self) -> bool {
        self.strip_leading_zero
    }

    /// Number of reports needed to carry `payload_len` bytes.
    pub fn report_count(&self, payload_len: usize) -> usize {
        payload_len.div_ceil(self.report_size)
    }

    /// Split a payload into report-sized chunks.
    pub fn chunks<'a>(&self, payload: &'a [u8]) -> std::slice::Chunks<'a, u8> {
        payload.chunks(self.report_size)
    }

    /// Build one fixed-length outbound report around `chunk`.
    pub fn frame_output(&self, chunk: &[u8]) -> HidStreamResult<Vec<u8>> {
        if chunk.len() > self.report_size {
            return Err(HidStreamError::InvalidReport {
                len: chunk.len(),
                max: self.report_size,
            });
        }

        let mut report = Vec::with_capacity(self.output_report_length());
        report.push(self.report_id);
        report.extend_from_slice(chunk);
        report.resize(self.output_report_length(), 0);
        Ok(report)
    }

    /// Strip the `0x00` pad byte report-ID-less devices put in front.
    pub fn normalize_input<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        match raw.split_first() {
            Some((0, rest)) if self.strip_leading_zero => rest,
            _ => raw,
        }
    }
}

impl Default for ReportFraming {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_output_pads_to_fixed_length() -> HidStreamResult<()> {
        let framing = ReportFraming::new(8).with_report_id(0x02);
        let report = framing.frame_output(&[0xAA, 0xBB])?;

        assert_eq!(report, vec![0x02, 0xAA, 0xBB, 0, 0, 0, 0, 0, 0]);
        assert_eq!(report.len(), framing.output_report_length());
        Ok(())
    }

    #[test]
    fn test_frame_output_full_chunk_has_no_padding() -> HidStreamResult<()> {
        let framing = ReportFraming::new(4);
        let report = framing.frame_output(&[1, 2, 3, 4])?;
        assert_eq!(report, vec![0x00, 1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_frame_output_rejects_oversized_chunk() {
        let framing = ReportFraming::new(4);
        let result = framing.frame_output(&[0; 5]);
        assert!(matches!(
            result,
            Err(HidStreamError::InvalidReport { len: 5, max: 4 })
        ));
    }

    #[test]
    fn test_normalize_input_strips_zero() {
        let framing = ReportFraming::default();
        assert_eq!(framing.normalize_input(&[0x00, 0x01, 0x02]), &[0x01, 0x02]);
        assert_eq!(
            framing.normalize_input(&[0x05, 0x01, 0x02]),
            &[0x05, 0x01, 0x02]
        );
        assert_eq!(framing.normalize_input(&[]), &[] as &[u8]);
    }

    #[test]
    fn test_normalize_input_keeps_zero_when_disabled() {
        let framing = ReportFraming::default().with_strip_leading_zero(false);
        assert_eq!(
            framing.normalize_input(&[0x00, 0x01, 0x02]),
            &[0x00, 0x01, 0x02]
        );
    }

    #[test]
    fn test_report_count() {
        let framing = ReportFraming::new(64);
        assert_eq!(framing.report_count(0), 0);
        assert_eq!(framing.report_count(1), 1);
        assert_eq!(framing.report_count(64), 1);
        assert_eq!(framing.report_count(65), 2);
        assert_eq!(framing.report_count(128), 2);
    }

    #[test]
    fn test_zero_report_size_is_clamped() {
        let framing = ReportFraming::new(0);
        assert_eq!(framing.report_size(), 1);
        assert_eq!(framing.chunks(&[1, 2, 3]).count(), 3);
    }
}
