//! In-memory document store.
//!
//! The whole store is one id -> text mapping held in process memory; it
//! does not survive a restart. The only mutation is exact-match substring
//! replacement via [`DocumentStore::edit`].

use crate::error::StoreError;
use std::collections::HashMap;

/// Mapping from document id to text content.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    docs: HashMap<String, String>,
}

impl DocumentStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical six seeded documents.
    pub fn seeded() -> Self {
        let mut store = Self::new();
        store.insert(
            "deposition.md",
            "This deposition covers the testimony of Angela Smith, P.E.",
        );
        store.insert(
            "report.pdf",
            "The report details the state of a 20m condenser tower.",
        );
        store.insert(
            "financials.docx",
            "These financials outline the project's budget and expenditures.",
        );
        store.insert(
            "outlook.pdf",
            "This document presents the projected future performance of the system.",
        );
        store.insert(
            "plan.md",
            "The plan outlines the steps for the project's implementation.",
        );
        store.insert(
            "spec.txt",
            "These specifications define the technical requirements for the equipment.",
        );
        store
    }

    /// Insert or overwrite a document.
    pub fn insert(&mut self, id: impl Into<String>, content: impl Into<String>) {
        self.docs.insert(id.into(), content.into());
    }

    /// Read a document's content.
    pub fn read(&self, id: &str) -> Result<&str, StoreError> {
        self.docs
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    /// Replace every occurrence of `old` with `new` in a document.
    ///
    /// The match is exact: case- and whitespace-sensitive. Zero occurrences
    /// is a legal no-op, not an error. The replacement is all-or-nothing;
    /// no partially-applied content is ever observable.
    pub fn edit(&mut self, id: &str, old: &str, new: &str) -> Result<(), StoreError> {
        let content = self
            .docs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        *content = content.replace(old, new);
        Ok(())
    }

    /// All current document ids. Order is unspecified.
    pub fn list(&self) -> Vec<&str> {
        self.docs.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
