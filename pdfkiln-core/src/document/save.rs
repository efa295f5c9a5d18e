//! Serialization with optional cleanup, compression and encryption

use super::metadata::info_dict_mut;
use super::Document;
use crate::encryption::{encrypt_document, EncryptionOptions, Permissions, SecurityHandler};
use crate::error::{PdfError, Result};
use crate::objects;
use lopdf::content::Content;
use lopdf::{Document as LoDocument, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Highest supported garbage collection level
pub const MAX_GARBAGE: u8 = 4;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    /// 0: keep everything; 1: drop unreachable objects; 2: also renumber
    /// objects compactly; 3: also merge identical objects; 4: also merge
    /// identical streams
    pub garbage: u8,
    /// Flate-compress streams that carry no filter
    pub deflate: bool,
    /// Rewrite each page's content as one normalized stream
    pub clean: bool,
    pub encryption: Option<EncryptionOptions>,
}

impl SaveOptions {
    pub fn compact() -> Self {
        Self {
            garbage: MAX_GARBAGE,
            deflate: true,
            clean: true,
            encryption: None,
        }
    }

    pub fn with_encryption(mut self, encryption: EncryptionOptions) -> Self {
        self.encryption = Some(encryption);
        self
    }
}

impl Document {
    pub fn save(&self, options: &SaveOptions) -> Result<Vec<u8>> {
        if options.garbage > MAX_GARBAGE {
            return Err(PdfError::InvalidOptions(format!(
                "garbage level {} exceeds {MAX_GARBAGE}",
                options.garbage
            )));
        }
        let mut doc = self.lo()?.clone();
        let page_ids = self.page_ids()?;

        let producer = &self.session.config().producer;
        let info = info_dict_mut(&mut doc)?;
        if !info.has(b"Producer") {
            info.set("Producer", objects::text_string(producer));
        }

        if options.clean {
            clean_contents(&mut doc, &page_ids);
        }
        if options.garbage >= 1 {
            let pruned = doc.prune_objects();
            debug!(objects = pruned.len(), "pruned unreachable objects");
        }
        if options.garbage >= 3 {
            let merged = merge_duplicates(&mut doc, options.garbage >= 4);
            debug!(objects = merged, "merged duplicate objects");
        }
        if options.garbage >= 2 {
            doc.renumber_objects();
        }
        if options.deflate {
            doc.compress();
        }
        if let Some(encryption) = &options.encryption {
            encrypt(&mut doc, encryption)?;
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        debug!(document = self.id, bytes = bytes.len(), "saved document");
        Ok(bytes)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>, options: &SaveOptions) -> Result<()> {
        let bytes = self.save(options)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

fn encrypt(doc: &mut LoDocument, options: &EncryptionOptions) -> Result<()> {
    let mut seed = Vec::new();
    seed.extend_from_slice(objects::now_pdf_date().as_bytes());
    seed.extend_from_slice(&doc.max_id.to_le_bytes());
    seed.extend_from_slice(options.owner_password.as_bytes());
    let file_id = md5::compute(&seed).to_vec();

    let permissions: Permissions = options.permissions.into();
    let handler = SecurityHandler::create(
        options.method,
        &options.owner_password,
        &options.user_password,
        permissions,
        file_id.clone(),
    );
    encrypt_document(doc, &handler, &options.user_password, &file_id)
}

/// Replace each page's content streams with one re-encoded stream
fn clean_contents(doc: &mut LoDocument, pages: &[ObjectId]) {
    for &page in pages {
        let content = match doc.get_page_content(page) {
            Ok(content) => content,
            Err(err) => {
                warn!(page = ?page, error = %err, "skipping unreadable content");
                continue;
            }
        };
        let encoded = match Content::decode(&content).and_then(|c| c.encode()) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(page = ?page, error = %err, "skipping unparsable content");
                continue;
            }
        };
        let stream = doc.add_object(Stream::new(lopdf::Dictionary::new(), encoded));
        if let Ok(dict) = objects::page_dict_mut(doc, page) {
            dict.set("Contents", Object::Reference(stream));
        }
    }
}

/// Fold byte-identical indirect objects into their lowest-numbered copy.
/// Returns the number of objects removed.
fn merge_duplicates(doc: &mut LoDocument, include_streams: bool) -> usize {
    let mut keepers: HashMap<[u8; 32], ObjectId> = HashMap::new();
    let mut replaced: HashMap<ObjectId, ObjectId> = HashMap::new();
    let catalog = objects::catalog_id(doc).ok();

    for (id, object) in &doc.objects {
        if Some(*id) == catalog {
            continue;
        }
        let fingerprint = match object {
            Object::Stream(stream) if include_streams => {
                let mut hasher = Sha256::new();
                hasher.update(format!("{:?}", stream.dict).as_bytes());
                hasher.update(&stream.content);
                hasher.finalize().into()
            }
            // Page dictionaries must stay distinct even when identical
            Object::Dictionary(dict) if objects::dict_name(dict, b"Type") != Some("Page") => {
                Sha256::digest(format!("{object:?}").as_bytes()).into()
            }
            Object::Array(_) => Sha256::digest(format!("{object:?}").as_bytes()).into(),
            _ => continue,
        };
        match keepers.get(&fingerprint) {
            Some(keeper) => {
                replaced.insert(*id, *keeper);
            }
            None => {
                keepers.insert(fingerprint, *id);
            }
        }
    }

    if replaced.is_empty() {
        return 0;
    }
    for object in doc.objects.values_mut() {
        objects::rewrite_references(object, &replaced);
    }
    let mut trailer = Object::Dictionary(std::mem::take(&mut doc.trailer));
    objects::rewrite_references(&mut trailer, &replaced);
    if let Object::Dictionary(dict) = trailer {
        doc.trailer = dict;
    }
    for id in replaced.keys() {
        doc.objects.remove(id);
    }
    replaced.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::{AuthResult, PermissionOptions};
    use crate::session::Session;
    use lopdf::dictionary;

    #[test]
    fn test_garbage_level_bounds() {
        let session = Session::default();
        let doc = session.create().unwrap();
        let options = SaveOptions {
            garbage: 5,
            ..Default::default()
        };
        assert!(matches!(doc.save(&options), Err(PdfError::InvalidOptions(_))));
    }

    #[test]
    fn test_garbage_drops_unreachable_and_merges_duplicates() {
        let session = Session::default();
        let mut doc = session.create().unwrap();
        doc.new_page(None, 100.0, 100.0).unwrap();
        doc.new_page(None, 100.0, 100.0).unwrap();
        {
            let lo = doc.lo_mut().unwrap();
            lo.add_object(dictionary! { "Orphan" => true });
        }

        let plain = session.open(doc.save(&SaveOptions::default()).unwrap()).unwrap();
        let compact = session.open(doc.save(&SaveOptions::compact()).unwrap()).unwrap();
        let plain_count = plain.lo().unwrap().objects.len();
        let compact_count = compact.lo().unwrap().objects.len();
        assert!(compact_count < plain_count);
        assert_eq!(compact.page_count().unwrap(), 2);
    }

    #[test]
    fn test_clean_merges_content_streams() {
        let session = Session::default();
        let mut doc = session.create().unwrap();
        doc.new_page(None, 100.0, 100.0).unwrap();
        doc.page(0)
            .unwrap()
            .insert_text(
                crate::geometry::Point::new(10.0, 50.0),
                "hello",
                &Default::default(),
            )
            .unwrap();

        let bytes = doc
            .save(&SaveOptions {
                clean: true,
                ..Default::default()
            })
            .unwrap();
        let reopened = session.open(bytes).unwrap();
        let lo = reopened.lo().unwrap();
        let page = reopened.page_ids().unwrap()[0];
        let contents = lo.get_dictionary(page).unwrap().get(b"Contents").unwrap();
        assert!(contents.as_reference().is_ok());
        assert_eq!(reopened.text().unwrap().trim(), "hello");
    }

    #[test]
    fn test_encrypted_save_needs_password() {
        let session = Session::default();
        let mut doc = session.create().unwrap();
        doc.new_page(None, 100.0, 100.0).unwrap();

        let encryption = EncryptionOptions::new("x")
            .with_user_password("reader")
            .with_permissions(PermissionOptions {
                print: false,
                ..Default::default()
            });
        let bytes = doc
            .save(&SaveOptions::default().with_encryption(encryption))
            .unwrap();

        let mut locked = session.open(bytes).unwrap();
        assert!(locked.is_encrypted().unwrap());
        assert!(locked.needs_pass().unwrap());
        assert!(!locked.permissions().unwrap().contains(Permissions::PRINT));
        assert!(matches!(locked.text(), Err(PdfError::NeedsPassword)));

        assert_eq!(locked.authenticate("nope").unwrap(), AuthResult::Denied);
        assert_eq!(locked.authenticate("reader").unwrap(), AuthResult::User);
        assert!(!locked.needs_pass().unwrap());
        assert_eq!(locked.page_count().unwrap(), 1);
    }

    #[test]
    fn test_owner_only_password_opens_without_prompt() {
        let session = Session::default();
        let mut doc = session.create().unwrap();
        doc.new_page(None, 100.0, 100.0).unwrap();
        doc.set_metadata(&crate::document::Metadata {
            title: Some("Secret plans".to_string()),
            ..Default::default()
        })
        .unwrap();

        let bytes = doc
            .save(&SaveOptions::default().with_encryption(EncryptionOptions::new("owner")))
            .unwrap();
        let reopened = session.open(bytes).unwrap();
        assert!(reopened.is_encrypted().unwrap());
        assert!(!reopened.needs_pass().unwrap());
        assert_eq!(
            reopened.metadata().unwrap().title.as_deref(),
            Some("Secret plans")
        );
    }
}
