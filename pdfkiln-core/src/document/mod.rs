//! Open document handle
//!
//! A [`Document`] owns a parsed PDF until [`Document::close`] is called;
//! afterwards every method except `close` and `is_closed` fails with
//! [`PdfError::DocumentClosed`]. Encrypted documents that do not open with
//! an empty password stay locked until [`Document::authenticate`] succeeds.

mod layers;
mod metadata;
mod outline;
mod pages;
mod save;

pub use metadata::Metadata;
pub use outline::TocEntry;
pub use pages::InsertOptions;
pub use save::{SaveOptions, MAX_GARBAGE};

use crate::encryption::{
    decrypt_document, trailer_file_id, AuthResult, Permissions, SecurityHandler,
};
use crate::error::{PdfError, Result};
use crate::objects;
use crate::page::Page;
use crate::render::{RenderOptions, RenderedPage};
use crate::session::Session;
use crate::text::{self, SearchHit};
use lopdf::{dictionary, Document as LoDocument, Object, ObjectId};
use tracing::{debug, warn};

#[derive(Debug)]
enum Security {
    Plain,
    Locked(SecurityHandler),
    Unlocked {
        handler: SecurityHandler,
        access: AuthResult,
    },
    /// Encrypted with a handler this crate cannot open
    Unsupported(String),
}

#[derive(Debug)]
struct OpenState {
    doc: LoDocument,
    security: Security,
}

#[derive(Debug)]
pub struct Document {
    session: Session,
    id: u64,
    state: Option<OpenState>,
}

impl Document {
    pub(crate) fn from_bytes(session: Session, bytes: Vec<u8>) -> Result<Self> {
        let mut doc = LoDocument::load_mem(&bytes)?;
        let security = detect_security(&mut doc)?;
        let id = session.next_document_id();
        debug!(
            document = id,
            bytes = bytes.len(),
            pages = doc.get_pages().len(),
            "opened document"
        );
        Ok(Self {
            session,
            id,
            state: Some(OpenState { doc, security }),
        })
    }

    pub(crate) fn new_empty(session: Session) -> Self {
        let mut doc = LoDocument::with_version("1.7");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let id = session.next_document_id();
        debug!(document = id, "created document");
        Self {
            session,
            id,
            state: Some(OpenState {
                doc,
                security: Security::Plain,
            }),
        }
    }

    /// Session-unique handle number
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Release the document. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.state.take().is_some() {
            debug!(document = self.id, "closed document");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_none()
    }

    fn state(&self) -> Result<&OpenState> {
        self.state.as_ref().ok_or(PdfError::DocumentClosed)
    }

    fn state_mut(&mut self) -> Result<&mut OpenState> {
        self.state.as_mut().ok_or(PdfError::DocumentClosed)
    }

    /// The object model, once the document is open and readable
    pub(crate) fn lo(&self) -> Result<&LoDocument> {
        let state = self.state()?;
        match state.security {
            Security::Locked(_) | Security::Unsupported(_) => Err(PdfError::NeedsPassword),
            _ => Ok(&state.doc),
        }
    }

    pub(crate) fn lo_mut(&mut self) -> Result<&mut LoDocument> {
        let state = self.state_mut()?;
        match state.security {
            Security::Locked(_) | Security::Unsupported(_) => Err(PdfError::NeedsPassword),
            _ => Ok(&mut state.doc),
        }
    }

    pub fn page_count(&self) -> Result<usize> {
        Ok(self.state()?.doc.get_pages().len())
    }

    pub fn version(&self) -> Result<String> {
        Ok(self.state()?.doc.version.clone())
    }

    pub fn is_pdf(&self) -> Result<bool> {
        self.state().map(|_| true)
    }

    pub fn is_encrypted(&self) -> Result<bool> {
        Ok(!matches!(self.state()?.security, Security::Plain))
    }

    /// Whether a password is still required to read the document
    pub fn needs_pass(&self) -> Result<bool> {
        Ok(matches!(
            self.state()?.security,
            Security::Locked(_) | Security::Unsupported(_)
        ))
    }

    /// Try `password` as user, then owner password. On success the document
    /// is decrypted in memory and becomes readable.
    pub fn authenticate(&mut self, password: &str) -> Result<AuthResult> {
        let id = self.id;
        let state = self.state_mut()?;
        let handler = match &state.security {
            Security::Plain => return Ok(AuthResult::Owner),
            Security::Unlocked { handler, access } => {
                if *access == AuthResult::Owner {
                    return Ok(AuthResult::Owner);
                }
                // An opened file can still be promoted by its owner password
                let promoted = handler.authenticate(password).0 == AuthResult::Owner;
                if promoted {
                    debug!(document = id, "owner password accepted");
                    if let Security::Unlocked { access, .. } = &mut state.security {
                        *access = AuthResult::Owner;
                    }
                    return Ok(AuthResult::Owner);
                }
                return Ok(*access);
            }
            Security::Unsupported(reason) => return Err(PdfError::Encryption(reason.clone())),
            Security::Locked(handler) => handler.clone(),
        };

        let (access, key) = handler.authenticate(password);
        match key {
            Some(key) => {
                decrypt_document(&mut state.doc, &handler, &key)?;
                debug!(document = id, ?access, "authenticated");
                state.security = Security::Unlocked { handler, access };
            }
            None => debug!(document = id, "password rejected"),
        }
        Ok(access)
    }

    /// Permissions granted by the encryption dictionary; everything for
    /// unencrypted documents
    pub fn permissions(&self) -> Result<Permissions> {
        Ok(match &self.state()?.security {
            Security::Plain | Security::Unsupported(_) => Permissions::all(),
            Security::Locked(handler) => handler.permissions(),
            Security::Unlocked { handler, access } => match access {
                AuthResult::Owner => Permissions::all(),
                _ => handler.permissions(),
            },
        })
    }

    /// Page object ids in document order
    pub(crate) fn page_ids(&self) -> Result<Vec<ObjectId>> {
        Ok(self.lo()?.get_pages().into_values().collect())
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<()> {
        let count = self.page_count()?;
        if index >= count {
            return Err(PdfError::PageIndexOutOfBounds { index, count });
        }
        Ok(())
    }

    pub fn page(&mut self, index: usize) -> Result<Page<'_>> {
        self.check_index(index)?;
        let id = self.page_ids()?[index];
        Ok(Page::new(self, index, id))
    }

    /// Plain text of every page, separated by form feeds
    pub fn text(&self) -> Result<String> {
        let doc = self.lo()?;
        let pages: Vec<String> = self
            .page_ids()?
            .into_iter()
            .map(|id| text::page_text(doc, id))
            .collect::<Result<_>>()?;
        Ok(pages.join("\n\x0c"))
    }

    /// Case-insensitive search over all pages
    pub fn search(&self, needle: &str) -> Result<Vec<SearchHit>> {
        let doc = self.lo()?;
        let mut hits = Vec::new();
        for (index, id) in self.page_ids()?.into_iter().enumerate() {
            hits.extend(text::search_page(doc, id, index, needle)?);
        }
        Ok(hits)
    }

    /// Rasterize one page through the session renderer
    pub fn render_page(&self, index: usize, options: &RenderOptions) -> Result<RenderedPage> {
        self.lo()?;
        self.check_index(index)?;
        let dpi = self.session.config().effective_dpi(options.dpi)?;
        let bytes = self.to_bytes()?;
        self.session.engine()?.render(&bytes, index, dpi, options)
    }

    /// Serialize without any cleanup
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.save(&SaveOptions::default())
    }
}

fn detect_security(doc: &mut LoDocument) -> Result<Security> {
    let encrypt = match doc.trailer.get(b"Encrypt") {
        Ok(object) => objects::resolve(doc, object)?.clone(),
        Err(_) => return Ok(Security::Plain),
    };
    let dict = match encrypt.as_dict() {
        Ok(dict) => dict,
        Err(_) => {
            return Ok(Security::Unsupported(
                "encryption dictionary is not a dictionary".to_string(),
            ))
        }
    };

    let handler = match SecurityHandler::from_dictionary(dict, trailer_file_id(doc)) {
        Ok(handler) => handler,
        Err(err) => {
            warn!(error = %err, "cannot open encrypted document");
            return Ok(Security::Unsupported(err.to_string()));
        }
    };
    match handler.authenticate("") {
        (access, Some(key)) => {
            decrypt_document(doc, &handler, &key)?;
            Ok(Security::Unlocked { handler, access })
        }
        _ => Ok(Security::Locked(handler)),
    }
}

#[cfg(test)]
mod tests;
