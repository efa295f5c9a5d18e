use super::*;
use crate::config::SessionConfig;
use crate::encryption::{EncryptionOptions, PermissionOptions};
use crate::ocg::AddLayerOptions;
use crate::render::MockRenderer;
use pretty_assertions::assert_eq;

fn mock_session() -> (Session, MockRenderer) {
    let renderer = MockRenderer::new();
    let session = Session::builder(SessionConfig::default())
        .renderer(Box::new(renderer.clone()))
        .build();
    (session, renderer)
}

fn document_with_pages(session: &Session, count: usize) -> Document {
    let mut doc = session.create().unwrap();
    for i in 0..count {
        doc.new_page(None, 100.0 + i as f32, 100.0).unwrap();
    }
    doc
}

fn page_widths(doc: &mut Document) -> Vec<f32> {
    (0..doc.page_count().unwrap())
        .map(|i| doc.page(i).unwrap().media_box().unwrap().width())
        .collect()
}

#[test]
fn test_close_is_idempotent_and_final() {
    let session = Session::default();
    let mut doc = document_with_pages(&session, 2);
    assert!(!doc.is_closed());

    doc.close();
    doc.close();
    assert!(doc.is_closed());

    assert!(matches!(doc.page_count(), Err(PdfError::DocumentClosed)));
    assert!(matches!(doc.version(), Err(PdfError::DocumentClosed)));
    assert!(matches!(doc.is_pdf(), Err(PdfError::DocumentClosed)));
    assert!(matches!(doc.needs_pass(), Err(PdfError::DocumentClosed)));
    assert!(matches!(doc.metadata(), Err(PdfError::DocumentClosed)));
    assert!(matches!(doc.toc(), Err(PdfError::DocumentClosed)));
    assert!(matches!(doc.layers(), Err(PdfError::DocumentClosed)));
    assert!(matches!(doc.text(), Err(PdfError::DocumentClosed)));
    assert!(matches!(doc.to_bytes(), Err(PdfError::DocumentClosed)));
    assert!(matches!(doc.authenticate(""), Err(PdfError::DocumentClosed)));
    assert!(matches!(doc.page(0), Err(PdfError::DocumentClosed)));
    assert!(matches!(
        doc.new_page(None, 10.0, 10.0),
        Err(PdfError::DocumentClosed)
    ));
    assert!(matches!(
        doc.add_layer("x", &AddLayerOptions::default()),
        Err(PdfError::DocumentClosed)
    ));
}

#[test]
fn test_closed_document_never_reaches_renderer() {
    let (session, renderer) = mock_session();
    let mut doc = document_with_pages(&session, 1);
    doc.close();
    assert!(matches!(
        doc.render_page(0, &RenderOptions::default()),
        Err(PdfError::DocumentClosed)
    ));
    assert_eq!(renderer.call_count(), 0);
}

#[test]
fn test_page_bounds() {
    let session = Session::default();
    let mut doc = document_with_pages(&session, 2);
    assert!(matches!(
        doc.page(2),
        Err(PdfError::PageIndexOutOfBounds { index: 2, count: 2 })
    ));
    assert_eq!(doc.page(1).unwrap().index(), 1);
}

#[test]
fn test_plain_document_properties() {
    let session = Session::default();
    let mut doc = document_with_pages(&session, 1);
    assert!(doc.is_pdf().unwrap());
    assert!(!doc.is_encrypted().unwrap());
    assert!(!doc.needs_pass().unwrap());
    assert_eq!(doc.permissions().unwrap(), Permissions::all());
    assert_eq!(doc.authenticate("anything").unwrap(), AuthResult::Owner);
    assert_eq!(doc.version().unwrap(), "1.7");
}

#[test]
fn test_document_ids_are_unique_within_session() {
    let session = Session::default();
    let a = session.create().unwrap();
    let b = session.create().unwrap();
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_locked_document_rejects_rendering_until_authenticated() {
    let (session, renderer) = mock_session();
    let plain = document_with_pages(&session, 1);
    let encryption = EncryptionOptions::new("x")
        .with_user_password("u")
        .with_permissions(PermissionOptions {
            print: false,
            ..Default::default()
        });
    let bytes = plain
        .save(&SaveOptions::default().with_encryption(encryption))
        .unwrap();

    let mut doc = session.open(bytes).unwrap();
    assert!(doc.needs_pass().unwrap());
    assert_eq!(doc.page_count().unwrap(), 1);
    assert!(matches!(
        doc.render_page(0, &RenderOptions::default()),
        Err(PdfError::NeedsPassword)
    ));
    assert_eq!(renderer.call_count(), 0);

    assert_eq!(doc.authenticate("x").unwrap(), AuthResult::Owner);
    let page = doc
        .render_page(0, &RenderOptions::default().with_dpi(72))
        .unwrap();
    assert_eq!((page.width, page.height), (100, 100));
    assert_eq!(renderer.call_count(), 1);
}

#[test]
fn test_render_uses_configured_default_dpi() {
    let (session, renderer) = mock_session();
    let doc = document_with_pages(&session, 1);
    let page = doc.render_page(0, &RenderOptions::default()).unwrap();
    assert_eq!(page.dpi, session.config().default_dpi);
    assert!(matches!(
        doc.render_page(0, &RenderOptions::default().with_dpi(10_000)),
        Err(PdfError::InvalidOptions(_))
    ));
    assert_eq!(renderer.call_count(), 1);
}

#[test]
fn test_delete_pages_matches_descending_single_deletes() {
    let session = Session::default();
    let mut batch = document_with_pages(&session, 10);
    let mut single = document_with_pages(&session, 10);

    batch.delete_pages(&[5, 2, 7]).unwrap();
    for index in [7, 5, 2] {
        single.delete_page(index).unwrap();
    }

    assert_eq!(batch.page_count().unwrap(), 7);
    assert_eq!(page_widths(&mut batch), page_widths(&mut single));
    assert_eq!(
        page_widths(&mut batch),
        vec![100.0, 101.0, 103.0, 104.0, 106.0, 108.0, 109.0]
    );
}

#[test]
fn test_edits_survive_serialization() {
    let session = Session::default();
    let mut doc = document_with_pages(&session, 3);
    doc.move_page(2, 0).unwrap();
    let layer = doc.add_layer("Notes", &AddLayerOptions::default()).unwrap();

    let mut reopened = session.open(doc.to_bytes().unwrap()).unwrap();
    assert_eq!(page_widths(&mut reopened), vec![102.0, 100.0, 101.0]);
    let layers = reopened.layers().unwrap();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].xref, layer.xref);
    assert_eq!(layers[0].name, "Notes");
}

#[test]
fn test_open_rejects_garbage() {
    let session = Session::default();
    assert!(session.open(b"definitely not a pdf".to_vec()).is_err());
}
