//! Test suite for pdfkiln
//!
//! Fixture generators, proptest strategies and a reference model of the
//! `/Order` hierarchy used by the integration tests under `tests/`.

pub mod generators;
pub mod inspect;
pub mod model;

pub use generators::{LayerSpec, LayeredPdfBuilder, OrderItem};
pub use model::{expected_positions, ExpectedPosition};

/// Common test utilities
pub mod utils {
    use pdfkiln::{Document, Session};

    /// Create a temporary directory for test outputs
    pub fn create_test_output_dir() -> anyhow::Result<tempfile::TempDir> {
        Ok(tempfile::tempdir()?)
    }

    /// Media box widths of every page, a cheap page identity for tests
    pub fn page_widths(doc: &mut Document) -> anyhow::Result<Vec<f32>> {
        let mut widths = Vec::new();
        for index in 0..doc.page_count()? {
            widths.push(doc.page(index)?.media_box()?.width());
        }
        Ok(widths)
    }

    /// Session whose scratch directory lives in `dir`
    pub fn session_in(dir: &tempfile::TempDir) -> Session {
        init_tracing();
        Session::new(pdfkiln::SessionConfig::default().with_scratch_root(dir.path()))
    }

    /// Route library logs to the test harness; `RUST_LOG` picks the level
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}
