//! Lets the selector engine query a live page through a [`Backend`].

use async_trait::async_trait;
use rowpilot_common::error::BackendError;
use rowpilot_core::selector::{DocumentQuery, MatchSet, QueryError};

use crate::backend::Backend;

pub struct BackendDocumentQuery<'a, B: Backend + ?Sized> {
    backend: &'a mut B,
}

impl<'a, B: Backend + ?Sized> BackendDocumentQuery<'a, B> {
    pub fn new(backend: &'a mut B) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: Backend + ?Sized> DocumentQuery for BackendDocumentQuery<'_, B> {
    async fn query(&mut self, selector: &str) -> Result<MatchSet, QueryError> {
        self.backend.query(selector).await.map_err(|e| match e {
            BackendError::SelectorInvalid { selector } => QueryError::InvalidSelector(selector),
            other => QueryError::Backend(other.to_string()),
        })
    }
}
