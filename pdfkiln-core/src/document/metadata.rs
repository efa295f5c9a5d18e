use super::{Document, Security};
use crate::error::Result;
use crate::objects;
use chrono::{DateTime, FixedOffset};
use lopdf::{Dictionary, Document as LoDocument, Object};
use serde::{Deserialize, Serialize};

/// Document information dictionary plus format details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    /// Raw PDF date string (`D:YYYYMMDDHHmmSS...`)
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
    /// e.g. `PDF 1.7`; read-only
    pub format: String,
    /// Encryption method, `None` when unencrypted; read-only
    pub encryption: Option<String>,
}

impl Metadata {
    pub fn created(&self) -> Option<DateTime<FixedOffset>> {
        self.creation_date.as_deref().and_then(objects::parse_pdf_date)
    }

    pub fn modified(&self) -> Option<DateTime<FixedOffset>> {
        self.mod_date.as_deref().and_then(objects::parse_pdf_date)
    }

    /// Information dictionary keys paired with their fields
    fn entries(&self) -> [(&'static str, &Option<String>); 8] {
        [
            ("Title", &self.title),
            ("Author", &self.author),
            ("Subject", &self.subject),
            ("Keywords", &self.keywords),
            ("Creator", &self.creator),
            ("Producer", &self.producer),
            ("CreationDate", &self.creation_date),
            ("ModDate", &self.mod_date),
        ]
    }

    fn entries_mut(&mut self) -> [(&'static str, &mut Option<String>); 8] {
        [
            ("Title", &mut self.title),
            ("Author", &mut self.author),
            ("Subject", &mut self.subject),
            ("Keywords", &mut self.keywords),
            ("Creator", &mut self.creator),
            ("Producer", &mut self.producer),
            ("CreationDate", &mut self.creation_date),
            ("ModDate", &mut self.mod_date),
        ]
    }
}

impl Document {
    /// Information dictionary entries. For a locked document only the
    /// format and encryption fields are filled in.
    pub fn metadata(&self) -> Result<Metadata> {
        let state = self.state()?;
        let mut metadata = Metadata {
            format: format!("PDF {}", state.doc.version),
            ..Default::default()
        };
        metadata.encryption = match &state.security {
            Security::Plain => None,
            Security::Locked(handler) | Security::Unlocked { handler, .. } => {
                let bits = if handler.revision() == 2 { 40 } else { 128 };
                Some(format!("Standard RC4 {bits}-bit (R{})", handler.revision()))
            }
            Security::Unsupported(reason) => Some(reason.clone()),
        };
        if self.lo().is_err() {
            return Ok(metadata);
        }

        if let Some(info) = info_dict(&state.doc) {
            for (key, slot) in metadata.entries_mut() {
                *slot = objects::dict_text(&state.doc, info, key.as_bytes());
            }
        }
        Ok(metadata)
    }

    /// Replace the information dictionary fields. `None` removes an entry;
    /// `format` and `encryption` are ignored.
    pub fn set_metadata(&mut self, metadata: &Metadata) -> Result<()> {
        let doc = self.lo_mut()?;
        let info = info_dict_mut(doc)?;
        for (key, field) in metadata.entries() {
            match field {
                Some(value) => info.set(key, objects::text_string(value)),
                None => {
                    info.remove(key.as_bytes());
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn info_dict(doc: &LoDocument) -> Option<&Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    objects::resolve(doc, info).ok()?.as_dict().ok()
}

/// The information dictionary, created as an indirect object if missing
pub(crate) fn info_dict_mut(doc: &mut LoDocument) -> Result<&mut Dictionary> {
    let id = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) if doc.get_object(*id).is_ok() => *id,
        Ok(Object::Dictionary(inline)) => {
            let inline = inline.clone();
            let id = doc.add_object(inline);
            doc.trailer.set("Info", Object::Reference(id));
            id
        }
        _ => {
            let id = doc.add_object(Dictionary::new());
            doc.trailer.set("Info", Object::Reference(id));
            id
        }
    };
    Ok(doc.get_object_mut(id)?.as_dict_mut()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_metadata_roundtrip_through_save() {
        let session = Session::default();
        let mut doc = session.create().unwrap();
        doc.new_page(None, 100.0, 100.0).unwrap();

        let metadata = Metadata {
            title: Some("Quarterly Ü report".to_string()),
            author: Some("Finance".to_string()),
            creation_date: Some("D:20240102030405+01'00'".to_string()),
            ..Default::default()
        };
        doc.set_metadata(&metadata).unwrap();

        let reopened = session.open(doc.to_bytes().unwrap()).unwrap();
        let read = reopened.metadata().unwrap();
        assert_eq!(read.title, metadata.title);
        assert_eq!(read.author, metadata.author);
        assert_eq!(read.subject, None);
        assert_eq!(read.format, "PDF 1.7");
        assert_eq!(read.encryption, None);
        assert_eq!(
            read.created().unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2024-01-02 03:04"
        );
    }

    #[test]
    fn test_none_removes_entries() {
        let session = Session::default();
        let mut doc = session.create().unwrap();
        doc.set_metadata(&Metadata {
            title: Some("x".to_string()),
            ..Default::default()
        })
        .unwrap();
        doc.set_metadata(&Metadata::default()).unwrap();
        assert_eq!(doc.metadata().unwrap().title, None);
    }
}
