//! Size reduction with a before/after report

use super::open_input;
use crate::document::{SaveOptions, MAX_GARBAGE};
use crate::error::Result;
use crate::session::Session;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressOptions {
    /// Garbage collection level, see [`SaveOptions::garbage`]
    pub garbage: u8,
    pub deflate: bool,
    pub clean: bool,
    pub password: Option<String>,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            garbage: MAX_GARBAGE,
            deflate: true,
            clean: true,
            password: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionReport {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub original_size: usize,
    pub compressed_size: usize,
    /// Negative when the output grew
    pub savings: i64,
    /// Percentage with one decimal
    pub savings_percent: f64,
    pub page_count: usize,
}

/// `round((original - compressed) / original * 1000) / 10`, zero for an
/// empty original
pub fn savings_percent(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let ratio = (original as f64 - compressed as f64) / original as f64;
    (ratio * 1000.0).round() / 10.0
}

pub fn compress_document(
    session: &Session,
    input: &[u8],
    options: &CompressOptions,
) -> Result<CompressionReport> {
    let original_size = input.len();
    let doc = open_input(session, input, options.password.as_deref())?;
    let page_count = doc.page_count()?;
    let data = doc.save(&SaveOptions {
        garbage: options.garbage,
        deflate: options.deflate,
        clean: options.clean,
        encryption: None,
    })?;

    let compressed_size = data.len();
    let report = CompressionReport {
        original_size,
        compressed_size,
        savings: original_size as i64 - compressed_size as i64,
        savings_percent: savings_percent(original_size, compressed_size),
        page_count,
        data,
    };
    info!(
        original = report.original_size,
        compressed = report.compressed_size,
        percent = report.savings_percent,
        "compression complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PdfError;
    use crate::geometry::Point;
    use crate::page::TextStyle;
    use proptest::prelude::*;

    #[test]
    fn test_savings_percent_rounding() {
        assert_eq!(savings_percent(1000, 750), 25.0);
        assert_eq!(savings_percent(3, 2), 33.3);
        assert_eq!(savings_percent(3, 1), 66.7);
        assert_eq!(savings_percent(100, 150), -50.0);
        assert_eq!(savings_percent(0, 10), 0.0);
    }

    #[test]
    fn test_report_for_ten_pages() {
        let session = Session::default();
        let mut doc = session.create().unwrap();
        for i in 0..10 {
            doc.new_page(None, 200.0, 200.0).unwrap();
            doc.page(i)
                .unwrap()
                .insert_text(Point::new(10.0, 100.0), &"repeat ".repeat(40), &TextStyle::default())
                .unwrap();
        }
        let input = doc.to_bytes().unwrap();

        let report = compress_document(&session, &input, &CompressOptions::default()).unwrap();
        assert_eq!(report.page_count, 10);
        assert_eq!(report.original_size, input.len());
        assert_eq!(report.compressed_size, report.data.len());
        assert_eq!(
            report.savings,
            input.len() as i64 - report.data.len() as i64
        );
        assert_eq!(
            report.savings_percent,
            savings_percent(input.len(), report.data.len())
        );
        assert!(report.compressed_size < report.original_size);
        assert_eq!(session.open(report.data).unwrap().page_count().unwrap(), 10);
    }

    #[test]
    fn test_invalid_garbage_level() {
        let session = Session::default();
        let mut doc = session.create().unwrap();
        doc.new_page(None, 10.0, 10.0).unwrap();
        let options = CompressOptions {
            garbage: 9,
            ..Default::default()
        };
        assert!(matches!(
            compress_document(&session, &doc.to_bytes().unwrap(), &options),
            Err(PdfError::InvalidOptions(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_savings_percent_formula(original in 1usize..10_000_000, compressed in 0usize..20_000_000) {
            let expected = ((original as f64 - compressed as f64) / original as f64 * 1000.0).round() / 10.0;
            prop_assert_eq!(savings_percent(original, compressed), expected);
            // One decimal place at most
            let scaled = savings_percent(original, compressed) * 10.0;
            prop_assert!((scaled - scaled.round()).abs() < 1e-6);
        }
    }
}
