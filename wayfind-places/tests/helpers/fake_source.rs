//! Scripted stand-in for a provider client

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use wayfind_places::sources::PlaceSource;
use wayfind_places::types::{PlaceConcept, SourceRecord};
use wayfind_places::{ProviderError, SourceName};

type Response = Result<Vec<SourceRecord>, ProviderError>;

/// Replies with scripted responses in order, then repeats `fallback`
pub struct FakeSource {
    name: SourceName,
    ttl: Duration,
    delay: Option<Duration>,
    scripted: Mutex<VecDeque<Response>>,
    fallback: Response,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn ok(name: SourceName, records: Vec<SourceRecord>) -> Self {
        Self::with_fallback(name, Ok(records))
    }

    pub fn failing(name: SourceName, error: ProviderError) -> Self {
        Self::with_fallback(name, Err(error))
    }

    fn with_fallback(name: SourceName, fallback: Response) -> Self {
        Self {
            name,
            ttl: Duration::from_secs(3600),
            delay: None,
            scripted: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Answer the next call with `response` before falling back
    pub fn then(self, response: Response) -> Self {
        self.scripted.lock().unwrap().push_back(response);
        self
    }

    /// Number of upstream calls (cache hits do not count)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaceSource for FakeSource {
    fn name(&self) -> SourceName {
        self.name
    }

    fn cache_key(&self, concept: &PlaceConcept) -> String {
        format!("fake:{}:{}", self.name, concept.signature())
    }

    fn cache_ttl(&self) -> Duration {
        self.ttl
    }

    async fn fetch(&self, _concept: &PlaceConcept) -> Result<Vec<SourceRecord>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.scripted.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}
