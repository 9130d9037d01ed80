//! Multi-page contract documents with stable page identities.
//!
//! Pages live in an arena keyed by [`PageId`]; the display order is a separate
//! list of ids. Signature overlays refer to pages by id only, so inserting or
//! removing other pages never moves a signature onto the wrong page.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::error::{ContractError, TransitionRejection};
use super::paginate::paginate;
use super::signature::SignatureImage;

/// Separator inserted between pages when the document is assembled.
pub const PAGE_SEPARATOR: &str = "\n\n";

static PAGE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Stable page identity, never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(u64);

impl PageId {
    fn next() -> Self {
        PageId(PAGE_SEQUENCE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub content: String,
}

/// Signature image bound to one page by id. Does not own the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureOverlay {
    pub page: PageId,
    pub image: SignatureImage,
    pub signer_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDocument {
    pages: HashMap<PageId, Page>,
    order: Vec<PageId>,
    overlays: Vec<SignatureOverlay>,
}

impl Default for ContractDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractDocument {
    /// A document with a single empty page.
    pub fn new() -> Self {
        Self::from_pages(std::iter::empty::<String>())
    }

    /// Paginate filled contract text into a new document.
    pub fn from_text(text: &str, max_chars_per_page: usize) -> Self {
        Self::from_pages(paginate(text, max_chars_per_page))
    }

    /// Build from already-split page contents; an empty iterator yields one blank page.
    pub fn from_pages<I, S>(contents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut document = Self {
            pages: HashMap::new(),
            order: Vec::new(),
            overlays: Vec::new(),
        };
        for content in contents {
            document.push_page(content.into());
        }
        if document.order.is_empty() {
            document.push_page(String::new());
        }
        document
    }

    pub fn page_count(&self) -> usize {
        self.order.len()
    }

    /// Pages in display order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> + '_ {
        self.order.iter().filter_map(|id| self.pages.get(id))
    }

    pub fn page(&self, index: usize) -> Result<&Page, ContractError> {
        let id = self.id_at(index)?;
        self.pages.get(&id).ok_or(ContractError::IndexOutOfRange {
            index,
            len: self.order.len(),
        })
    }

    pub fn index_of(&self, id: PageId) -> Option<usize> {
        self.order.iter().position(|candidate| *candidate == id)
    }

    pub fn add_page(&mut self) -> PageId {
        self.push_page(String::new())
    }

    /// Remove the page at `index`, discarding any signature bound to it.
    pub fn remove_page(&mut self, index: usize) -> Result<Page, ContractError> {
        let id = self.id_at(index)?;
        if self.order.len() == 1 {
            return Err(TransitionRejection::LastPage.into());
        }

        self.order.remove(index);
        self.overlays.retain(|overlay| overlay.page != id);
        self.pages.remove(&id).ok_or(ContractError::IndexOutOfRange {
            index,
            len: self.order.len() + 1,
        })
    }

    pub fn update_page_content(
        &mut self,
        index: usize,
        content: impl Into<String>,
    ) -> Result<(), ContractError> {
        let id = self.id_at(index)?;
        let len = self.order.len();
        let page = self
            .pages
            .get_mut(&id)
            .ok_or(ContractError::IndexOutOfRange { index, len })?;
        page.content = content.into();
        Ok(())
    }

    /// Bind a signature to whichever page is last right now. A previous
    /// signature on that page is replaced.
    pub fn bind_signature(
        &mut self,
        image: SignatureImage,
        signer_label: impl Into<String>,
    ) -> Result<PageId, ContractError> {
        let page = *self
            .order
            .last()
            .ok_or(ContractError::IndexOutOfRange { index: 0, len: 0 })?;
        self.overlays.retain(|overlay| overlay.page != page);
        self.overlays.push(SignatureOverlay {
            page,
            image,
            signer_label: signer_label.into(),
        });
        Ok(page)
    }

    pub fn overlays(&self) -> &[SignatureOverlay] {
        &self.overlays
    }

    pub fn overlay_for(&self, index: usize) -> Option<&SignatureOverlay> {
        let id = self.order.get(index)?;
        self.overlays.iter().find(|overlay| overlay.page == *id)
    }

    /// The exact text presented for signing: pages joined by [`PAGE_SEPARATOR`].
    pub fn full_text(&self) -> String {
        self.pages()
            .map(|page| page.content.as_str())
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR)
    }

    fn push_page(&mut self, content: String) -> PageId {
        let id = PageId::next();
        self.pages.insert(id, Page { id, content });
        self.order.push(id);
        id
    }

    fn id_at(&self, index: usize) -> Result<PageId, ContractError> {
        self.order
            .get(index)
            .copied()
            .ok_or(ContractError::IndexOutOfRange {
                index,
                len: self.order.len(),
            })
    }
}
