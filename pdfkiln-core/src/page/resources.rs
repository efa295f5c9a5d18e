//! Page resource dictionaries and content stream appends

use crate::error::Result;
use crate::objects;
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId, Stream};

/// Register `object` under a fresh name in the page's `category`
/// resources (`Font`, `XObject`, ...) and return the name. Inherited or
/// shared resource dictionaries are copied onto the page first.
pub fn add_resource(
    doc: &mut LoDocument,
    page: ObjectId,
    category: &str,
    prefix: &str,
    object: Object,
) -> Result<String> {
    let mut resources = match objects::inherited_attribute(doc, page, b"Resources")? {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };
    let mut entries = match objects::resolve_key(doc, &resources, category.as_bytes()) {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    let mut n = entries.len() + 1;
    let name = loop {
        let candidate = format!("{prefix}{n}");
        if !entries.has(candidate.as_bytes()) {
            break candidate;
        }
        n += 1;
    };
    entries.set(name.as_str(), object);
    resources.set(category, Object::Dictionary(entries));
    objects::page_dict_mut(doc, page)?.set("Resources", Object::Dictionary(resources));
    Ok(name)
}

/// Append drawing operators to the page. Existing content is wrapped in
/// `q`/`Q` so its graphics state cannot leak into the new operators.
pub fn append_content(doc: &mut LoDocument, page: ObjectId, content: Vec<u8>) -> Result<()> {
    let existing: Vec<Object> = match objects::page_dict(doc, page)?.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    if !existing.is_empty() {
        let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        contents.push(Object::Reference(open));
        contents.extend(existing);
    }
    // Streams are concatenated without separators when the page is read
    let mut tail = Vec::with_capacity(content.len() + 4);
    if !contents.is_empty() {
        tail.extend_from_slice(b"\nQ\n");
    }
    tail.extend_from_slice(&content);
    tail.push(b'\n');
    let appended = doc.add_object(Stream::new(Dictionary::new(), tail));
    contents.push(Object::Reference(appended));

    objects::page_dict_mut(doc, page)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// Escape a byte string for a literal `( ... )` string operand
pub fn literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push('\\');
                out.push(b as char);
            }
            b'\r' => out.push_str("\\r"),
            b'\n' => out.push_str("\\n"),
            0x20..=0x7E => out.push(b as char),
            other => out.push_str(&format!("\\{other:03o}")),
        }
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn single_page() -> (LoDocument, ObjectId) {
        let mut doc = LoDocument::with_version("1.7");
        let pages = doc.new_object_id();
        let shared = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => dictionary! { "BaseFont" => "Courier" } },
        });
        let page = doc.add_object(dictionary! { "Type" => "Page", "Parent" => pages });
        doc.objects.insert(
            pages,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page.into()],
                "Count" => 1,
                "Resources" => shared,
            }),
        );
        (doc, page)
    }

    #[test]
    fn test_add_resource_picks_free_name() {
        let (mut doc, page) = single_page();
        let name = add_resource(&mut doc, page, "Font", "F", Object::Null).unwrap();
        assert_eq!(name, "F2");
        let resources = objects::page_dict(&doc, page).unwrap().get(b"Resources").unwrap();
        let fonts = resources.as_dict().unwrap().get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(b"F2"));
    }

    #[test]
    fn test_append_wraps_existing_content() {
        let (mut doc, page) = single_page();
        append_content(&mut doc, page, b"0 0 m 1 1 l S".to_vec()).unwrap();
        append_content(&mut doc, page, b"BT ET".to_vec()).unwrap();
        let content = doc.get_page_content(page).unwrap();
        let text = String::from_utf8(content).unwrap();
        assert!(text.starts_with("q"));
        assert!(text.contains("Q\nBT ET"));
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(literal(b"a(b)\\"), "(a\\(b\\)\\\\)");
        assert_eq!(literal(&[0xE9]), "(\\351)");
    }
}
