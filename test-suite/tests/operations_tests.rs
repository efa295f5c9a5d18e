//! Stand-alone operations driven through the session facade

use pdfkiln::color::{FailingConverter, PassthroughConverter};
use pdfkiln::operations::savings_percent;
use pdfkiln::{
    ChunkOptions, CompressOptions, MarkdownOptions, MergeInput, MergeOptions, MetadataMode,
    MockRenderer, PageRange, PdfError, RasterizeOptions, Session, SessionConfig, SplitMode,
    SplitOptions, TextToPdfOptions,
};
use pdfkiln_test_suite::generators::documents::{numbered_pages, text_pages};
use pdfkiln_test_suite::utils::{create_test_output_dir, page_widths, session_in};
use pdfkiln_test_suite::{LayeredPdfBuilder, OrderItem};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn pages_bytes(session: &Session, count: usize) -> Vec<u8> {
    numbered_pages(session, count).unwrap().to_bytes().unwrap()
}

#[test]
fn test_compress_report_for_ten_pages() {
    let session = Session::default();
    let texts: Vec<String> = (1..=10).map(|i| format!("Page {i} {}", "lorem ".repeat(30))).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let input = text_pages(&session, &refs).unwrap();

    let report = session.compress(&input, &CompressOptions::default()).unwrap();
    assert_eq!(report.page_count, 10);
    assert_eq!(report.original_size, input.len());
    assert_eq!(report.compressed_size, report.data.len());
    assert_eq!(
        report.savings_percent,
        ((input.len() as f64 - report.data.len() as f64) / input.len() as f64 * 1000.0).round()
            / 10.0
    );
    assert_eq!(session.open(report.data).unwrap().page_count().unwrap(), 10);
}

#[test]
fn test_compress_may_grow_tiny_input() {
    let session = Session::default();
    let input = pages_bytes(&session, 10);
    let report = session
        .compress(
            &input,
            &CompressOptions {
                garbage: 0,
                deflate: false,
                clean: false,
                password: None,
            },
        )
        .unwrap();
    assert_eq!(report.page_count, 10);
    assert_eq!(report.savings, input.len() as i64 - report.compressed_size as i64);
    assert_eq!(
        report.savings_percent,
        savings_percent(input.len(), report.compressed_size)
    );
}

proptest! {
    #[test]
    fn prop_savings_percent_has_one_decimal(original in 1usize..5_000_000, compressed in 0usize..10_000_000) {
        let percent = savings_percent(original, compressed);
        prop_assert!((percent * 10.0 - (percent * 10.0).round()).abs() < 1e-6);
        if compressed >= original {
            prop_assert!(percent <= 0.0);
        }
    }
}

#[test]
fn test_merge_then_split_restores_parts() {
    let session = Session::default();
    let first = pages_bytes(&session, 3);
    let mut second = numbered_pages(&session, 2).unwrap();
    second.page(0).unwrap().set_rotation(90).unwrap();
    let second = second.to_bytes().unwrap();

    let merged = session
        .merge(
            &[
                MergeInput::new(first.clone()).with_pages(PageRange::Range(1, 2)),
                MergeInput::new(second),
            ],
            &MergeOptions {
                metadata_mode: MetadataMode::Custom {
                    title: Some("Combined".to_string()),
                    author: None,
                    subject: None,
                    keywords: None,
                },
                ..Default::default()
            },
        )
        .unwrap();

    let mut doc = session.open(merged.clone()).unwrap();
    assert_eq!(page_widths(&mut doc).unwrap(), vec![101.0, 102.0, 100.0, 101.0]);
    assert_eq!(doc.page(2).unwrap().rotation().unwrap(), 90);
    assert_eq!(doc.metadata().unwrap().title.as_deref(), Some("Combined"));

    let parts = session
        .split(&merged, &SplitOptions::new(SplitMode::SplitAt(vec![2])))
        .unwrap();
    assert_eq!(parts.len(), 2);
    let mut tail = session.open(parts[1].clone()).unwrap();
    assert_eq!(page_widths(&mut tail).unwrap(), vec![100.0, 101.0]);
    assert_eq!(tail.metadata().unwrap().title.as_deref(), Some("Combined"));
}

#[test]
fn test_merge_needs_input_and_password() {
    let session = Session::default();
    assert!(matches!(
        session.merge(&[], &MergeOptions::default()),
        Err(PdfError::NoInput)
    ));

    let locked = pdfkiln_test_suite::generators::documents::encrypted(
        &session,
        "owner",
        Some("user"),
        Default::default(),
    )
    .unwrap();
    assert!(matches!(
        session.merge(&[MergeInput::new(locked.clone())], &MergeOptions::default()),
        Err(PdfError::NeedsPassword)
    ));
    let merged = session
        .merge(
            &[MergeInput::new(locked).with_password("user")],
            &MergeOptions::default(),
        )
        .unwrap();
    let doc = session.open(merged).unwrap();
    assert!(!doc.is_encrypted().unwrap());
}

#[test]
fn test_split_chunks_cover_every_page() {
    let session = Session::default();
    let input = pages_bytes(&session, 7);
    let parts = session
        .split(&input, &SplitOptions::new(SplitMode::Chunks(3)))
        .unwrap();
    let mut widths = Vec::new();
    for part in parts.iter() {
        widths.extend(page_widths(&mut session.open(part.clone()).unwrap()).unwrap());
    }
    assert_eq!(parts.len(), 3);
    assert_eq!(widths, (0..7).map(|i| 100.0 + i as f32).collect::<Vec<_>>());
}

#[test]
fn test_layers_survive_split() {
    let session = Session::default();
    let pdf = LayeredPdfBuilder::new()
        .add_empty_page(300.0, 300.0)
        .add_empty_page(400.0, 400.0)
        .with_layers(2)
        .with_order(OrderItem::with_children(0, vec![OrderItem::Layer(1)]).into())
        .build();
    let parts = session
        .split(&pdf, &SplitOptions::new(SplitMode::EachPage))
        .unwrap();
    assert_eq!(parts.len(), 2);
    let layers = session.open(parts[1].clone()).unwrap().layers().unwrap();
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[1].depth, 1);
}

#[test]
fn test_text_round_trip_through_markdown_and_chunks() {
    let session = Session::default();
    let text = "First paragraph of the note.\n\nSecond paragraph follows here.";
    let pdf = session
        .text_to_pdf(text, &TextToPdfOptions::default())
        .unwrap();

    let pages = session.extract_text(&pdf, &PageRange::All).unwrap();
    assert_eq!(pages.len(), 1);
    assert!(pages[0].text.contains("First paragraph of the note."));

    let markdown = session
        .to_markdown(&pdf, &MarkdownOptions::default())
        .unwrap();
    assert!(markdown.contains("First paragraph of the note."));
    assert!(markdown.ends_with('\n'));

    let chunks = session
        .to_llm_chunks(
            &pdf,
            &ChunkOptions {
                max_chars: 40,
                overlap: 10,
                ..Default::default()
            },
        )
        .unwrap();
    assert!(chunks.len() >= 2);
    for (index, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, index);
        assert_eq!(chunk.char_count, chunk.text.chars().count());
        assert!(chunk.char_count <= 40);
        assert_eq!(chunk.pages, vec![0]);
    }

    let json = serde_json::to_value(&chunks).unwrap();
    assert_eq!(json[0]["index"], 0);
    assert_eq!(json[0]["pages"], serde_json::json!([0]));
}

#[test]
fn test_rasterize_with_mock_renderer_and_cleanup() {
    let dir = create_test_output_dir().unwrap();
    let renderer = MockRenderer::new();
    let session = Session::builder(
        SessionConfig::default().with_scratch_root(dir.path()),
    )
    .renderer(Box::new(renderer.clone()))
    .color_converter(Box::new(PassthroughConverter))
    .build();
    let input = pages_bytes(&session, 2);

    let pages = session
        .rasterize(
            &input,
            &RasterizeOptions {
                dpi: Some(144),
                normalize_colors: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(
        pages.iter().map(|p| (p.width, p.height)).collect::<Vec<_>>(),
        vec![(200, 200), (202, 200)]
    );
    assert_eq!(renderer.call_count(), 2);
    assert_eq!(session.engine().unwrap().workspace().entry_count(), 0);
}

#[test]
fn test_failed_colour_conversion_leaves_no_scratch_files() {
    let dir = create_test_output_dir().unwrap();
    let session = Session::builder(SessionConfig::default().with_scratch_root(dir.path()))
        .renderer(Box::new(MockRenderer::new()))
        .color_converter(Box::new(FailingConverter))
        .build();
    let input = pages_bytes(&session, 1);

    assert!(matches!(
        session.convert_to_rgb(&input),
        Err(PdfError::ColorConversion(_))
    ));
    assert_eq!(session.engine().unwrap().workspace().entry_count(), 0);

    // Rasterizing falls back to the unconverted input
    let pages = session
        .rasterize(
            &input,
            &RasterizeOptions {
                dpi: Some(72),
                normalize_colors: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(pages.len(), 1);
}

#[test]
fn test_engine_initialises_once_across_threads() {
    let dir = create_test_output_dir().unwrap();
    let session = session_in(&dir);
    assert!(!session.is_initialized());

    let addresses: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                scope.spawn(move || session.engine().ok().map(|e| e as *const _ as usize))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });
    assert!(addresses.windows(2).all(|w| w[0] == w[1]));
    assert!(session.is_initialized());
}

#[test]
fn test_operation_errors_are_preconditions() {
    let session = Session::default();
    let input = pages_bytes(&session, 2);
    let err = session
        .split(&input, &SplitOptions::new(SplitMode::Chunks(0)))
        .unwrap_err();
    assert!(err.is_precondition());
    let err = session
        .extract_text(&input, &PageRange::parse("3").unwrap())
        .unwrap_err();
    assert!(matches!(err, PdfError::PageIndexOutOfBounds { index: 2, count: 2 }));
    assert!(!session.is_initialized());
}
