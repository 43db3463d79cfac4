use std::collections::HashMap;

use tokio::sync::RwLock;

use coverquote_core::ports::{
    ApplicationStore, NewQuote, QuoteProgress, QuoteStore, RepositoryError, ZipCode, ZipCodeLookup,
};
use coverquote_core::{AggregatedStatus, ApplicationId, ApplicationState, QuoteId, QuoteRecord};

#[derive(Default)]
pub struct InMemoryZipCodes {
    zips: RwLock<HashMap<String, ZipCode>>,
}

impl InMemoryZipCodes {
    pub async fn insert(&self, zip: ZipCode) {
        self.zips.write().await.insert(zip.zip.clone(), zip);
    }
}

#[async_trait::async_trait]
impl ZipCodeLookup for InMemoryZipCodes {
    async fn lookup(&self, zip: &str) -> Result<Option<ZipCode>, RepositoryError> {
        Ok(self.zips.read().await.get(zip.trim()).cloned())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ApplicationRow {
    state: ApplicationState,
    progress: Option<QuoteProgress>,
}

/// Unknown ids are created on first touch in the `new` state.
#[derive(Default)]
pub struct InMemoryApplicationStore {
    rows: RwLock<HashMap<ApplicationId, ApplicationRow>>,
}

impl InMemoryApplicationStore {
    pub async fn state(&self, id: ApplicationId) -> Option<ApplicationState> {
        self.rows.read().await.get(&id).map(|row| row.state)
    }

    pub async fn progress(&self, id: ApplicationId) -> Option<QuoteProgress> {
        self.rows.read().await.get(&id).and_then(|row| row.progress)
    }
}

#[async_trait::async_trait]
impl ApplicationStore for InMemoryApplicationStore {
    async fn update_progress(
        &self,
        id: ApplicationId,
        progress: QuoteProgress,
    ) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().await;
        rows.entry(id)
            .or_insert(ApplicationRow { state: ApplicationState::New, progress: None })
            .progress = Some(progress);
        Ok(())
    }

    async fn transition_state(
        &self,
        id: ApplicationId,
        from: ApplicationState,
        to: ApplicationState,
    ) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.write().await;
        let row =
            rows.entry(id).or_insert(ApplicationRow { state: ApplicationState::New, progress: None });
        if row.state != from {
            return Ok(false);
        }
        row.state = to;
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryQuoteStore {
    quotes: RwLock<HashMap<QuoteId, QuoteRecord>>,
    next_id: RwLock<u64>,
}

impl InMemoryQuoteStore {
    pub async fn list(&self) -> Vec<QuoteRecord> {
        let mut quotes: Vec<_> = self.quotes.read().await.values().cloned().collect();
        quotes.sort_by_key(|quote| quote.id);
        quotes
    }
}

#[async_trait::async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn record_quote(&self, quote: NewQuote) -> Result<QuoteId, RepositoryError> {
        let id = {
            let mut next_id = self.next_id.write().await;
            *next_id += 1;
            QuoteId(*next_id)
        };
        self.quotes.write().await.insert(
            id,
            QuoteRecord {
                id,
                application_id: quote.application_id,
                agency_location_id: quote.agency_location_id,
                insurer_id: quote.insurer_id,
                policy_type: quote.policy_type,
                amount: quote.amount,
                status: quote.status,
                bound: false,
            },
        );
        Ok(id)
    }

    async fn find_quote(&self, id: QuoteId) -> Result<Option<QuoteRecord>, RepositoryError> {
        Ok(self.quotes.read().await.get(&id).cloned())
    }

    async fn mark_bound(&self, id: QuoteId) -> Result<bool, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        match quotes.get_mut(&id) {
            Some(quote) if !quote.bound => {
                quote.bound = true;
                quote.status = AggregatedStatus::Bound;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_bind_requested(&self, id: QuoteId) -> Result<bool, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        match quotes.get_mut(&id) {
            Some(quote) if !quote.bound => {
                quote.status = AggregatedStatus::BindRequested;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
