//! Apply the RC4 cipher to every string and stream of a document

use super::rc4::rc4;
use super::standard_security::SecurityHandler;
use crate::error::{PdfError, Result};
use lopdf::{Document as LoDocument, Object, ObjectId, StringFormat};
use tracing::debug;

/// Encrypt `doc` in place and attach the encryption dictionary.
///
/// `doc` must not already be encrypted. The `/ID` entry of the trailer is
/// replaced by `file_id`, which has to be the same id the handler was
/// created with.
pub fn encrypt_document(
    doc: &mut LoDocument,
    handler: &SecurityHandler,
    user_password: &str,
    file_id: &[u8],
) -> Result<()> {
    if doc.trailer.has(b"Encrypt") {
        return Err(PdfError::Encryption(
            "document is already encrypted".to_string(),
        ));
    }
    let (_, key) = handler.authenticate(user_password);
    let key = key.ok_or_else(|| {
        PdfError::Encryption("handler rejects its own user password".to_string())
    })?;

    let count = apply_to_objects(doc, handler, &key, None);
    let encrypt_id = doc.add_object(Object::Dictionary(handler.to_dictionary()));
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    let id = Object::String(file_id.to_vec(), StringFormat::Hexadecimal);
    doc.trailer.set("ID", Object::Array(vec![id.clone(), id]));

    debug!(objects = count, revision = handler.revision(), "encrypted document");
    Ok(())
}

/// Decrypt `doc` in place with an already authenticated file key and drop
/// the `/Encrypt` entry.
pub fn decrypt_document(doc: &mut LoDocument, handler: &SecurityHandler, key: &[u8]) -> Result<()> {
    let encrypt_id = match doc.trailer.get(b"Encrypt") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(_) => None,
        Err(_) => {
            return Err(PdfError::Encryption(
                "document is not encrypted".to_string(),
            ))
        }
    };

    let count = apply_to_objects(doc, handler, key, encrypt_id);
    doc.trailer.remove(b"Encrypt");
    if let Some(id) = encrypt_id {
        doc.objects.remove(&id);
    }
    debug!(objects = count, "decrypted document");
    Ok(())
}

/// Read the first element of the trailer `/ID` array
pub fn trailer_file_id(doc: &LoDocument) -> Vec<u8> {
    match doc.trailer.get(b"ID") {
        Ok(Object::Array(ids)) => match ids.first() {
            Some(Object::String(bytes, _)) => bytes.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn apply_to_objects(
    doc: &mut LoDocument,
    handler: &SecurityHandler,
    key: &[u8],
    skip: Option<ObjectId>,
) -> usize {
    let mut count = 0;
    for (id, object) in doc.objects.iter_mut() {
        if Some(*id) == skip || is_xref_stream(object) {
            continue;
        }
        let object_key = handler.object_key(key, *id);
        crypt_object(object, &object_key);
        count += 1;
    }
    count
}

fn is_xref_stream(object: &Object) -> bool {
    match object {
        Object::Stream(stream) => matches!(
            stream.dict.get(b"Type"),
            Ok(Object::Name(name)) if name == b"XRef"
        ),
        _ => false,
    }
}

fn crypt_object(object: &mut Object, key: &[u8]) {
    match object {
        Object::String(bytes, format) => {
            *bytes = rc4(key, bytes);
            // Ciphertext is arbitrary binary; keep it out of literal syntax
            *format = StringFormat::Hexadecimal;
        }
        Object::Array(items) => {
            for item in items {
                crypt_object(item, key);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                crypt_object(value, key);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                crypt_object(value, key);
            }
            let content = rc4(key, &stream.content);
            stream.set_content(content);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::{EncryptionMethod, Permissions};
    use lopdf::{dictionary, Stream};

    fn sample() -> (LoDocument, ObjectId, ObjectId) {
        let mut doc = LoDocument::with_version("1.7");
        let info = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Quarterly report"),
        });
        let content = doc.add_object(Stream::new(dictionary! {}, b"BT (Hi) Tj ET".to_vec()));
        doc.trailer.set("Info", info);
        (doc, info, content)
    }

    #[test]
    fn test_encrypt_then_decrypt_restores_objects() {
        let (mut doc, info, content) = sample();
        let file_id = md5::compute(b"id").to_vec();
        let handler = SecurityHandler::create(
            EncryptionMethod::Rc4_128,
            "owner",
            "user",
            Permissions::all(),
            file_id.clone(),
        );

        encrypt_document(&mut doc, &handler, "user", &file_id).unwrap();
        assert!(doc.trailer.has(b"Encrypt"));
        let title = doc.get_dictionary(info).unwrap().get(b"Title").unwrap();
        assert_ne!(title.as_str().unwrap(), b"Quarterly report");
        let stream = doc.get_object(content).unwrap().as_stream().unwrap();
        assert_ne!(stream.content, b"BT (Hi) Tj ET");

        let (_, key) = handler.authenticate("owner");
        decrypt_document(&mut doc, &handler, &key.unwrap()).unwrap();
        assert!(!doc.trailer.has(b"Encrypt"));
        let title = doc.get_dictionary(info).unwrap().get(b"Title").unwrap();
        assert_eq!(title.as_str().unwrap(), b"Quarterly report");
        let stream = doc.get_object(content).unwrap().as_stream().unwrap();
        assert_eq!(stream.content, b"BT (Hi) Tj ET");
    }

    #[test]
    fn test_encrypting_twice_is_rejected() {
        let (mut doc, _, _) = sample();
        let handler = SecurityHandler::create(
            EncryptionMethod::Rc4_40,
            "o",
            "",
            Permissions::all(),
            vec![1; 16],
        );
        encrypt_document(&mut doc, &handler, "", &[1; 16]).unwrap();
        assert!(matches!(
            encrypt_document(&mut doc, &handler, "", &[1; 16]),
            Err(PdfError::Encryption(_))
        ));
        assert_eq!(trailer_file_id(&doc), vec![1; 16]);
    }
}
