//! Fixtures built through the public API

use pdfkiln::{
    AddLayerOptions, Document, EncryptionOptions, PermissionOptions, Point, Result, SaveOptions,
    Session, TextStyle,
};

/// `count` blank pages, page `i` being `100 + i` points wide
pub fn numbered_pages(session: &Session, count: usize) -> Result<Document> {
    let mut doc = session.create()?;
    for i in 0..count {
        doc.new_page(None, 100.0 + i as f32, 100.0)?;
    }
    Ok(doc)
}

/// One page per entry carrying that text
pub fn text_pages(session: &Session, texts: &[&str]) -> Result<Vec<u8>> {
    let mut doc = session.create()?;
    for (index, text) in texts.iter().enumerate() {
        doc.new_page(None, 595.0, 842.0)?;
        doc.page(index)?
            .insert_text(Point::new(72.0, 760.0), text, &TextStyle::default())?;
    }
    doc.to_bytes()
}

/// A single-page document encrypted with the given passwords
pub fn encrypted(
    session: &Session,
    owner: &str,
    user: Option<&str>,
    permissions: PermissionOptions,
) -> Result<Vec<u8>> {
    let doc = numbered_pages(session, 1)?;
    let mut encryption = EncryptionOptions::new(owner).with_permissions(permissions);
    if let Some(user) = user {
        encryption = encryption.with_user_password(user);
    }
    doc.save(&SaveOptions::default().with_encryption(encryption))
}

/// Layer `A` at the root with `B` nested under it; returns their object
/// numbers
pub fn parent_and_child(doc: &mut Document) -> Result<(u32, u32)> {
    let a = doc.add_layer("A", &AddLayerOptions::default())?;
    let b = doc.add_layer("B", &AddLayerOptions::under(a.xref))?;
    Ok((a.xref, b.xref))
}
