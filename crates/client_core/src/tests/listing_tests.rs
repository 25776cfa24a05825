use super::*;
use std::{
    collections::HashMap,
    sync::atomic::AtomicBool,
};

use chrono::{TimeZone, Utc};
use shared::{
    domain::{CustomerRef, OrderId, OrderStatus, ProductId},
    error::{ApiError, ErrorCode},
};

// Rows are "<status>-<n>"; search matches anywhere in the row.
impl ListItem for String {
    fn matches(&self, filters: &FilterSet) -> bool {
        let status = self.split('-').next().unwrap_or_default();
        filters.status_is(status) && filters.search_hits([self.as_str()])
    }
}

fn order(id: &str, customer: &str, status: OrderStatus, day: u32) -> Order {
    Order {
        id: OrderId::new(id),
        date: Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap(),
        amount: 100.0,
        status,
        customer: Some(CustomerRef {
            name: customer.to_string(),
        }),
        shipping_address: None,
    }
}

fn product(id: &str, name: &str, is_active: bool) -> Product {
    Product {
        id: ProductId::new(id),
        name_en: name.to_string(),
        name_ar: String::new(),
        category: None,
        measurement_unit: None,
        price: 10.0,
        stock_quantity: 5,
        is_active,
        images: Vec::new(),
        created_at: None,
    }
}

struct ScriptedSource {
    total: u64,
    calls: Mutex<Vec<ListQuery>>,
    delays: HashMap<&'static str, Duration>,
    fail: AtomicBool,
    missing: AtomicBool,
}

impl ScriptedSource {
    fn new(total: u64) -> Self {
        Self {
            total,
            calls: Mutex::new(Vec::new()),
            delays: HashMap::new(),
            fail: AtomicBool::new(false),
            missing: AtomicBool::new(false),
        }
    }

    fn with_delay(mut self, status: &'static str, delay: Duration) -> Self {
        self.delays.insert(status, delay);
        self
    }

    async fn calls(&self) -> Vec<ListQuery> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ListSource<String> for ScriptedSource {
    async fn fetch(&self, query: &ListQuery) -> Result<ListEnvelope<String>, ApiFailure> {
        self.calls.lock().await.push(query.clone());
        let status = query.filters.get(Filter::Status).unwrap_or("all");
        if let Some(delay) = self.delays.get(status) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiFailure::Server(ApiError::new(
                ErrorCode::Internal,
                500,
                "Failed to fetch quotes",
            )));
        }
        if self.missing.load(Ordering::SeqCst) {
            return Err(ApiFailure::NotFound(ApiError::new(
                ErrorCode::NotFound,
                404,
                "No orders found",
            )));
        }

        let start = query.offset();
        let end = (start + u64::from(query.limit())).min(self.total);
        let data = (start..end).map(|i| format!("{status}-{i}")).collect();
        let limit = query.limit();
        let total_pages = self.total.div_ceil(u64::from(limit)) as u32;
        Ok(ListEnvelope::Paged {
            data,
            pagination: Some(PaginationMeta {
                current_page: query.page(),
                total_pages,
                total_count: self.total,
                limit,
                has_next_page: query.page() < total_pages,
                has_prev_page: query.page() > 1,
            }),
        })
    }
}

fn controller(
    source: Arc<ScriptedSource>,
) -> (
    Arc<ListController<String>>,
    broadcast::Receiver<ClientEvent>,
) {
    let (events, rx) = broadcast::channel(64);
    let controller = ListController::new(
        ListKind::Quotes,
        source,
        events,
        DEFAULT_PAGE_SIZE,
        SEARCH_DEBOUNCE,
    );
    (controller, rx)
}

#[test]
fn total_pages_and_next_flag_follow_total_count() {
    for page in 1..=10 {
        let result = Page::<u8>::new(Vec::new(), page, 10, 95);
        assert_eq!(result.total_pages, 10);
        assert_eq!(result.has_next_page, page < 10, "page {page}");
        assert_eq!(result.has_prev_page, page > 1, "page {page}");
    }
    let empty = Page::<u8>::new(Vec::new(), 1, 10, 0);
    assert_eq!(empty.total_pages, 0);
    assert!(!empty.has_next_page);
}

#[test]
fn server_flags_are_recomputed_from_counts() {
    let meta = PaginationMeta {
        current_page: 4,
        total_pages: 4,
        total_count: 40,
        limit: 10,
        has_next_page: true,
        has_prev_page: false,
    };
    let page = Page::from_meta(vec![1, 2, 3], &meta, &ListQuery::default());
    assert_eq!(page.page, 4);
    assert!(!page.has_next_page);
    assert!(page.has_prev_page);
}

#[test]
fn unpaged_collections_are_sliced_locally() {
    let all: Vec<u32> = (0..25).collect();
    let page = Page::from_unpaged(all, &ListQuery::new(3, 10));
    assert_eq!(page.items, vec![20, 21, 22, 23, 24]);
    assert_eq!(page.total_count, 25);
    assert_eq!(page.total_pages, 3);
    assert!(!page.has_next_page);
}

#[test]
fn unpaged_collections_are_filtered_before_slicing() {
    let rows = vec![
        "processing-1".to_string(),
        "shipped-2".to_string(),
        "cancelled-3".to_string(),
        "shipped-4".to_string(),
    ];
    let mut query = ListQuery::new(1, 10);
    query.filters.set(Filter::Status, "shipped");

    let page = Page::from_envelope(ListEnvelope::Bare(rows.clone()), &query);
    assert_eq!(page.items, vec!["shipped-2", "shipped-4"]);
    assert_eq!(page.total_count, 2);

    query.filters.set(Filter::Search, "4");
    let page = Page::from_envelope(
        ListEnvelope::Products {
            products: rows,
            pagination: None,
        },
        &query,
    );
    assert_eq!(page.items, vec!["shipped-4"]);
}

#[test]
fn orders_match_on_id_customer_status_and_date() {
    let orders = vec![
        order("ORD-100", "Salem Trading", OrderStatus::Shipped, 2),
        order("ORD-101", "Noura", OrderStatus::Processing, 10),
        order("ORD-102", "Salem Builders", OrderStatus::Shipped, 20),
    ];
    let mut query = ListQuery::new(1, 10);
    query.filters.set(Filter::Search, "salem");
    query.filters.set(Filter::Status, "shipped");
    query
        .filters
        .set_date(Filter::StartDate, NaiveDate::from_ymd_opt(2025, 3, 5));

    let page = Page::from_envelope(ListEnvelope::Bare(orders.clone()), &query);
    let ids: Vec<_> = page.items.iter().map(|order| order.id.as_str()).collect();
    assert_eq!(ids, vec!["ORD-102"]);

    let mut by_id = ListQuery::new(1, 10);
    by_id.filters.set(Filter::Search, "ord-101");
    let page = Page::from_envelope(ListEnvelope::Bare(orders), &by_id);
    assert_eq!(page.items.len(), 1);
}

#[test]
fn products_match_on_name_and_active_flag() {
    let products = vec![
        product("p1", "Cement bag", true),
        product("p2", "Cement mixer", false),
        product("p3", "Steel rod", true),
    ];
    let mut query = ListQuery::new(1, 10);
    query.filters.set(Filter::Status, "active");
    query.filters.set(Filter::Search, "CEMENT");

    let page = Page::from_envelope(
        ListEnvelope::Products {
            products,
            pagination: None,
        },
        &query,
    );
    let ids: Vec<_> = page.items.iter().map(|product| product.id.as_str()).collect();
    assert_eq!(ids, vec!["p1"]);
}

#[test]
fn full_page_without_counts_offers_a_next_page() {
    let query = ListQuery::new(2, 3);
    let full = Page::from_envelope(
        ListEnvelope::Paged {
            data: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            pagination: None,
        },
        &query,
    );
    assert!(full.has_next_page);
    assert!(full.has_prev_page);

    let short = Page::from_envelope(
        ListEnvelope::Paged {
            data: vec!["d".to_string()],
            pagination: None,
        },
        &query,
    );
    assert!(!short.has_next_page);
    assert_eq!(short.total_count, 4);
}

#[test]
fn query_is_clamped_and_skips_default_filters() {
    let mut query = ListQuery::new(0, 0);
    assert_eq!((query.page(), query.limit(), query.offset()), (1, 1, 0));

    query = ListQuery::new(3, 10);
    assert_eq!(query.offset(), 20);
    query.filters.set(Filter::Status, "all");
    query.filters.set(Filter::ProjectType, "");
    query.filters.set(Filter::Search, " roof ");
    query
        .filters
        .set_date(Filter::StartDate, NaiveDate::from_ymd_opt(2025, 1, 1));
    assert_eq!(
        query.to_query_pairs(),
        vec![
            ("page".to_string(), "3".to_string()),
            ("limit".to_string(), "10".to_string()),
            ("search".to_string(), "roof".to_string()),
            ("startDate".to_string(), "2025-01-01".to_string()),
        ]
    );

    assert!(query.filters.set(Filter::Search, "all"));
    assert!(query.filters.get(Filter::Search).is_none());
}

#[tokio::test]
async fn load_page_replaces_items_and_metadata() {
    let source = Arc::new(ScriptedSource::new(95));
    let (controller, mut rx) = controller(source.clone());

    assert_eq!(controller.load_page(10).await, FetchOutcome::Applied);
    let state = controller.snapshot().await;
    assert_eq!(state.page.items.len(), 5);
    assert_eq!(state.page.total_pages, 10);
    assert!(!state.page.has_next_page);
    assert!(!state.loading);
    assert!(state.error.is_none());
    assert!(matches!(
        rx.recv().await.unwrap(),
        ClientEvent::ListUpdated {
            list: ListKind::Quotes,
            generation: 1
        }
    ));
}

#[tokio::test]
async fn filter_change_fetches_page_one_immediately() {
    let source = Arc::new(ScriptedSource::new(95));
    let (controller, _rx) = controller(source.clone());
    controller.load_page(4).await;

    controller.set_filter(Filter::Status, "open").await;
    let calls = source.calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].page(), 1);
    assert_eq!(calls[1].filters.get(Filter::Status), Some("open"));

    controller
        .set_date_range(NaiveDate::from_ymd_opt(2025, 1, 1), None)
        .await;
    let calls = source.calls().await;
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2].filters.get(Filter::StartDate), Some("2025-01-01"));
    assert_eq!(calls[2].filters.get(Filter::EndDate), None);
}

#[tokio::test(start_paused = true)]
async fn search_keystrokes_within_debounce_fetch_once_with_final_term() {
    let source = Arc::new(ScriptedSource::new(3));
    let (controller, _rx) = controller(source.clone());

    let first = controller.set_search("r").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = controller.set_search("ro").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let third = controller.set_search("roo").await;

    assert_eq!(first.await.unwrap(), None);
    assert_eq!(second.await.unwrap(), None);
    assert_eq!(third.await.unwrap(), Some(FetchOutcome::Applied));

    let calls = source.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].filters.get(Filter::Search), Some("roo"));
    assert_eq!(calls[0].page(), 1);
}

#[tokio::test(start_paused = true)]
async fn clearing_search_fetches_without_delay() {
    let source = Arc::new(ScriptedSource::new(3));
    let (controller, _rx) = controller(source.clone());

    let pending = controller.set_search("roof").await;
    let cleared = controller.set_search("").await;
    let started = tokio::time::Instant::now();
    assert_eq!(cleared.await.unwrap(), Some(FetchOutcome::Applied));
    assert!(started.elapsed() < SEARCH_DEBOUNCE);
    assert_eq!(pending.await.unwrap(), None);

    let calls = source.calls().await;
    assert_eq!(calls.len(), 1);
    assert!(calls[0].filters.get(Filter::Search).is_none());
}

#[tokio::test(start_paused = true)]
async fn filter_change_cancels_pending_search() {
    let source = Arc::new(ScriptedSource::new(3));
    let (controller, _rx) = controller(source.clone());

    let pending = controller.set_search("roof").await;
    controller.set_filter(Filter::Status, "open").await;
    assert_eq!(pending.await.unwrap(), None);

    let calls = source.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].filters.get(Filter::Search), Some("roof"));
    assert_eq!(calls[0].filters.get(Filter::Status), Some("open"));
}

#[tokio::test(start_paused = true)]
async fn slow_stale_response_never_overwrites_newer_one() {
    let source = Arc::new(
        ScriptedSource::new(5)
            .with_delay("slow", Duration::from_millis(300))
            .with_delay("fast", Duration::from_millis(10)),
    );
    let (controller, _rx) = controller(source.clone());

    let (stale, fresh) = tokio::join!(controller.set_filter(Filter::Status, "slow"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.set_filter(Filter::Status, "fast").await
    });

    assert_eq!(stale, FetchOutcome::Superseded);
    assert_eq!(fresh, FetchOutcome::Applied);
    let state = controller.snapshot().await;
    assert_eq!(state.page.items[0], "fast-0");
    assert_eq!(state.generation, 2);
    assert!(!state.loading);
}

#[tokio::test]
async fn failure_keeps_last_good_items_and_notifies() {
    let source = Arc::new(ScriptedSource::new(12));
    let (controller, mut rx) = controller(source.clone());
    controller.load_page(1).await;
    let good = controller.snapshot().await.page;
    rx.recv().await.unwrap();

    source.fail.store(true, Ordering::SeqCst);
    let outcome = controller.load_page(2).await;
    assert_eq!(
        outcome,
        FetchOutcome::Failed("Failed to fetch quotes".to_string())
    );

    let state = controller.snapshot().await;
    assert_eq!(state.page, good);
    assert_eq!(state.error.as_deref(), Some("Failed to fetch quotes"));
    assert!(!state.loading);

    assert!(matches!(
        rx.recv().await.unwrap(),
        ClientEvent::ListFailed { generation: 2, .. }
    ));
    match rx.recv().await.unwrap() {
        ClientEvent::Toast(toast) => assert_eq!(toast, Toast::error("Failed to fetch quotes")),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn not_found_is_an_empty_page() {
    let source = Arc::new(ScriptedSource::new(12));
    let (controller, _rx) = controller(source.clone());
    controller.load_page(1).await;

    source.missing.store(true, Ordering::SeqCst);
    assert_eq!(controller.refresh().await, FetchOutcome::Applied);
    let state = controller.snapshot().await;
    assert!(state.page.items.is_empty());
    assert_eq!(state.page.total_count, 0);
    assert!(state.error.is_none());
}
