use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{
    domain::{DemandQuote, Order, Product},
    protocol::{ListEnvelope, PaginationMeta},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    events::{ClientEvent, ListKind, Toast},
    transport::ApiFailure,
};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Server-side filters understood by the list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Filter {
    Status,
    ProjectType,
    Search,
    StartDate,
    EndDate,
}

impl Filter {
    pub fn param(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::ProjectType => "typeOfProject",
            Self::Search => "search",
            Self::StartDate => "startDate",
            Self::EndDate => "endDate",
        }
    }
}

/// Filters with a non-default value. Setting a filter to `""` or `"all"`
/// removes it, so defaults never reach the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    values: BTreeMap<Filter, String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the stored value changed.
    pub fn set(&mut self, filter: Filter, value: impl AsRef<str>) -> bool {
        let value = value.as_ref().trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            return self.values.remove(&filter).is_some();
        }
        if self.values.get(&filter).map(String::as_str) == Some(value) {
            return false;
        }
        self.values.insert(filter, value.to_string());
        true
    }

    pub fn set_date(&mut self, filter: Filter, date: Option<NaiveDate>) -> bool {
        let value = date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        self.set(filter, value)
    }

    pub fn get(&self, filter: Filter) -> Option<&str> {
        self.values.get(&filter).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Filter, &str)> {
        self.values
            .iter()
            .map(|(filter, value)| (*filter, value.as_str()))
    }

    fn date(&self, filter: Filter) -> Option<NaiveDate> {
        self.get(filter)
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
    }

    fn search_hits<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> bool {
        let Some(term) = self.get(Filter::Search) else {
            return true;
        };
        let term = term.to_lowercase();
        fields
            .into_iter()
            .any(|field| field.to_lowercase().contains(&term))
    }

    fn status_is(&self, status: &str) -> bool {
        self.get(Filter::Status)
            .map_or(true, |wanted| wanted.eq_ignore_ascii_case(status))
    }

    fn within_dates(&self, date: Option<NaiveDate>) -> bool {
        let start = self.date(Filter::StartDate);
        let end = self.date(Filter::EndDate);
        if start.is_none() && end.is_none() {
            return true;
        }
        date.is_some_and(|date| {
            start.map_or(true, |start| date >= start) && end.map_or(true, |end| date <= end)
        })
    }
}

/// Filtering applied locally when an endpoint answers with its whole
/// collection instead of a server-filtered page.
pub trait ListItem {
    fn matches(&self, filters: &FilterSet) -> bool;
}

impl ListItem for Order {
    fn matches(&self, filters: &FilterSet) -> bool {
        let customer = self.customer.as_ref().map(|customer| customer.name.as_str());
        filters.search_hits(std::iter::once(self.id.as_str()).chain(customer))
            && filters.status_is(self.status.as_str())
            && filters.within_dates(Some(self.date.date_naive()))
    }
}

impl ListItem for Product {
    fn matches(&self, filters: &FilterSet) -> bool {
        let status = match filters.get(Filter::Status) {
            Some(wanted) if wanted.eq_ignore_ascii_case("active") => self.is_active,
            Some(wanted) if wanted.eq_ignore_ascii_case("inactive") => !self.is_active,
            _ => true,
        };
        status && filters.search_hits([self.name_en.as_str(), self.name_ar.as_str()])
    }
}

impl ListItem for DemandQuote {
    fn matches(&self, filters: &FilterSet) -> bool {
        let project_type = match filters.get(Filter::ProjectType) {
            Some(wanted) => self
                .type_of_project
                .as_deref()
                .is_some_and(|kind| kind.eq_ignore_ascii_case(wanted)),
            None => true,
        };
        let text = [self.project_name.as_deref(), self.description.as_deref()];
        project_type
            && filters.status_is(self.status.as_str())
            && filters.search_hits(text.into_iter().flatten())
            && filters.within_dates(self.date_of_request.map(|date| date.date_naive()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    page: u32,
    limit: u32,
    pub filters: FilterSet,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

impl ListQuery {
    /// Page and limit are clamped to at least 1.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
            filters: FilterSet::default(),
        }
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn at_page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        pairs.extend(
            self.filters
                .iter()
                .map(|(filter, value)| (filter.param().to_string(), value.to_string())),
        );
        pairs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    pub items: Vec<R>,
    pub page: u32,
    pub limit: u32,
    pub total_count: u64,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl<R> Page<R> {
    pub fn new(items: Vec<R>, page: u32, limit: u32, total_count: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = total_count.div_ceil(u64::from(limit));
        let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);
        Self::with_total_pages(items, page, limit, total_count, total_pages)
    }

    fn with_total_pages(
        items: Vec<R>,
        page: u32,
        limit: u32,
        total_count: u64,
        total_pages: u32,
    ) -> Self {
        let page = page.max(1);
        Self {
            items,
            page,
            limit,
            total_count,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }

    pub fn empty(query: &ListQuery) -> Self {
        Self::new(Vec::new(), query.page(), query.limit(), 0)
    }

    /// Uses the server's counts but recomputes the navigation flags from them.
    pub fn from_meta(items: Vec<R>, meta: &PaginationMeta, query: &ListQuery) -> Self {
        let page = if meta.current_page > 0 {
            meta.current_page
        } else {
            query.page()
        };
        let limit = if meta.limit > 0 {
            meta.limit
        } else {
            query.limit()
        };
        if meta.total_pages == 0 && meta.total_count > 0 {
            return Self::new(items, page, limit, meta.total_count);
        }
        Self::with_total_pages(items, page, limit, meta.total_count, meta.total_pages)
    }

    /// Pages a complete, unpaginated collection on the client.
    pub fn from_unpaged(all: Vec<R>, query: &ListQuery) -> Self {
        let total_count = all.len() as u64;
        let start = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = all
            .into_iter()
            .skip(start)
            .take(query.limit() as usize)
            .collect();
        Self::new(items, query.page(), query.limit(), total_count)
    }
}

impl<R: ListItem> Page<R> {
    pub fn from_envelope(envelope: ListEnvelope<R>, query: &ListQuery) -> Self {
        match envelope {
            ListEnvelope::Paged {
                data,
                pagination: Some(meta),
            }
            | ListEnvelope::Products {
                products: data,
                pagination: Some(meta),
            } => Self::from_meta(data, &meta, query),
            // Paged by the server without counts; a full page may have a successor.
            ListEnvelope::Paged {
                data,
                pagination: None,
            } => {
                let total_count = query.offset() + data.len() as u64;
                let total_pages = if data.len() >= query.limit() as usize {
                    query.page().saturating_add(1)
                } else {
                    query.page()
                };
                Self::with_total_pages(data, query.page(), query.limit(), total_count, total_pages)
            }
            ListEnvelope::Products {
                products: all,
                pagination: None,
            }
            | ListEnvelope::Bare(all) => {
                let matching = all
                    .into_iter()
                    .filter(|item| item.matches(&query.filters))
                    .collect();
                Self::from_unpaged(matching, query)
            }
        }
    }
}

#[async_trait]
pub trait ListSource<R>: Send + Sync {
    async fn fetch(&self, query: &ListQuery) -> Result<ListEnvelope<R>, ApiFailure>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListState<R> {
    pub page: Page<R>,
    pub query: ListQuery,
    pub loading: bool,
    pub error: Option<String>,
    /// Generation of the response currently shown; 0 before the first one.
    pub generation: u64,
}

impl<R> ListState<R> {
    fn new(query: ListQuery) -> Self {
        Self {
            page: Page::empty(&query),
            query,
            loading: false,
            error: None,
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Failed(String),
    /// A newer request was issued before this one completed.
    Superseded,
}

pub struct ListController<R> {
    kind: ListKind,
    source: Arc<dyn ListSource<R>>,
    events: broadcast::Sender<ClientEvent>,
    debounce: Duration,
    request_generation: AtomicU64,
    search_generation: AtomicU64,
    state: Mutex<ListState<R>>,
}

impl<R> ListController<R>
where
    R: ListItem + Clone + Send + Sync + 'static,
{
    pub fn new(
        kind: ListKind,
        source: Arc<dyn ListSource<R>>,
        events: broadcast::Sender<ClientEvent>,
        page_size: u32,
        debounce: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            source,
            events,
            debounce,
            request_generation: AtomicU64::new(0),
            search_generation: AtomicU64::new(0),
            state: Mutex::new(ListState::new(ListQuery::new(1, page_size))),
        })
    }

    pub async fn snapshot(&self) -> ListState<R> {
        self.state.lock().await.clone()
    }

    pub async fn load_page(&self, page: u32) -> FetchOutcome {
        let query = self.state.lock().await.query.at_page(page);
        self.fetch(query).await
    }

    /// Re-fetches the page currently shown.
    pub async fn refresh(&self) -> FetchOutcome {
        let query = self.state.lock().await.query.clone();
        self.fetch(query).await
    }

    /// Applies a filter and fetches page 1 right away. Any pending debounced
    /// search is cancelled since this fetch already carries the latest term.
    pub async fn set_filter(&self, filter: Filter, value: &str) -> FetchOutcome {
        self.search_generation.fetch_add(1, Ordering::SeqCst);
        let query = {
            let mut state = self.state.lock().await;
            state.query.filters.set(filter, value);
            state.query.at_page(1)
        };
        self.fetch(query).await
    }

    pub async fn set_date_range(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> FetchOutcome {
        self.search_generation.fetch_add(1, Ordering::SeqCst);
        let query = {
            let mut state = self.state.lock().await;
            state.query.filters.set_date(Filter::StartDate, start);
            state.query.filters.set_date(Filter::EndDate, end);
            state.query.at_page(1)
        };
        self.fetch(query).await
    }

    /// Replaces every filter at once and fetches `page` with a single request.
    pub async fn apply(&self, filters: FilterSet, page: u32) -> FetchOutcome {
        self.search_generation.fetch_add(1, Ordering::SeqCst);
        let query = {
            let mut state = self.state.lock().await;
            state.query.filters = filters;
            state.query.at_page(page)
        };
        self.fetch(query).await
    }

    /// Records the search term and schedules a page-1 fetch after the
    /// debounce delay. Clearing the term fetches immediately. The returned
    /// task resolves to `None` when a later change cancelled this search.
    pub async fn set_search(self: &Arc<Self>, term: &str) -> JoinHandle<Option<FetchOutcome>> {
        let ticket = self.search_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let immediate = {
            let mut state = self.state.lock().await;
            state.query.filters.set(Filter::Search, term);
            state.query.filters.get(Filter::Search).is_none()
        };

        let delay = if immediate { Duration::ZERO } else { self.debounce };
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if controller.search_generation.load(Ordering::SeqCst) != ticket {
                debug!(list = ?controller.kind, "search superseded before firing");
                return None;
            }
            let query = controller.state.lock().await.query.at_page(1);
            Some(controller.fetch(query).await)
        })
    }

    async fn fetch(&self, query: ListQuery) -> FetchOutcome {
        let generation = self.request_generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock().await;
            state.loading = true;
            state.query = query.clone();
        }
        debug!(list = ?self.kind, generation, page = query.page(), "fetching list page");

        let result = self.source.fetch(&query).await;

        let mut state = self.state.lock().await;
        if self.request_generation.load(Ordering::SeqCst) != generation {
            debug!(list = ?self.kind, generation, "discarding stale list response");
            return FetchOutcome::Superseded;
        }
        state.loading = false;

        let page = match result {
            Ok(envelope) => Page::from_envelope(envelope, &query),
            Err(ApiFailure::NotFound(_)) => Page::empty(&query),
            Err(err) => {
                warn!(list = ?self.kind, generation, error = %err, "list fetch failed");
                let message = err.user_message();
                state.error = Some(message.clone());
                drop(state);
                let _ = self.events.send(ClientEvent::ListFailed {
                    list: self.kind,
                    generation,
                    message: message.clone(),
                });
                let _ = self.events.send(ClientEvent::Toast(Toast::error(message.clone())));
                return FetchOutcome::Failed(message);
            }
        };

        state.page = page;
        state.error = None;
        state.generation = generation;
        drop(state);
        let _ = self.events.send(ClientEvent::ListUpdated {
            list: self.kind,
            generation,
        });
        FetchOutcome::Applied
    }
}

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod tests;
