//! Operation routing: first-match dispatch over an ordered route list.
//!
//! Routes are `(key, filter, handler)` entries evaluated in registration
//! order. The first route whose filter matches and whose handler accepts
//! the operation wins. An optional default route is tried last.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use hookwatch_core::sample::round4;
use hookwatch_core::{ChainEvent, Operation, OperationFilter, SampleWindow};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::time::Instant;

use crate::logging::SharedLogger;

/// Key under which default-route hits are counted.
pub const DEFAULT_ROUTE_KEY: &str = "default";

// ---------------------------------------------------------------------------
// Handler trait
// ---------------------------------------------------------------------------

/// Where an operation came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteContext {
    pub event_id: Option<String>,
    pub block_height: Option<u64>,
    pub tx_id: Option<String>,
    pub chainhook_uuid: Option<String>,
}

impl RouteContext {
    #[must_use]
    pub fn from_event(event: &ChainEvent) -> Self {
        Self {
            event_id: Some(event.event_id.clone()),
            block_height: Some(event.block_height),
            tx_id: Some(event.tx_id.clone()),
            chainhook_uuid: event.chainhook_uuid.clone(),
        }
    }
}

/// Handles operations for one route.
///
/// `Ok(true)` claims the operation and stops routing. `Ok(false)` passes it
/// on to the next matching route. An error is logged and counted, and
/// routing continues as if the handler had returned `Ok(false)`.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn handle(&self, op: &Operation, ctx: &RouteContext) -> anyhow::Result<bool>;
}

/// Adapter turning a synchronous closure into an [`OperationHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> OperationHandler for FnHandler<F>
where
    F: Fn(&Operation, &RouteContext) -> anyhow::Result<bool> + Send + Sync,
{
    async fn handle(&self, op: &Operation, ctx: &RouteContext) -> anyhow::Result<bool> {
        (self.0)(op, ctx)
    }
}

/// Accepts every operation and logs it at info level.
pub struct LoggingHandler {
    logger: SharedLogger,
}

impl LoggingHandler {
    #[must_use]
    pub fn new(logger: SharedLogger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl OperationHandler for LoggingHandler {
    async fn handle(&self, op: &Operation, ctx: &RouteContext) -> anyhow::Result<bool> {
        self.logger.info(&format!(
            "{} operation in block {} (tx {})",
            op.op_type().unwrap_or("untyped"),
            ctx.block_height.map_or_else(|| "-".to_string(), |h| h.to_string()),
            ctx.tx_id.as_deref().unwrap_or("-"),
        ));
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Routing counters reported by [`OperationRouter::get_metrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteMetrics {
    /// Every call to `route_operation`, including rejected ones.
    pub total_operations: u64,
    pub routed: u64,
    /// Route evaluations skipped because the filter did not match.
    pub filtered: u64,
    /// Valid operations no route accepted.
    pub unrouted: u64,
    /// Operations rejected for lacking a `type`.
    pub invalid: u64,
    pub errors: u64,
    pub average_routing_time_ms: f64,
    pub routes_by_key: BTreeMap<String, u64>,
    pub sample_count: usize,
}

struct MetricsState {
    counters: RouteMetrics,
    routing_times: SampleWindow,
}

impl MetricsState {
    fn new(sample_capacity: usize) -> Self {
        Self {
            counters: RouteMetrics::default(),
            routing_times: SampleWindow::new(sample_capacity),
        }
    }
}

// ---------------------------------------------------------------------------
// OperationRouter
// ---------------------------------------------------------------------------

struct Route {
    key: String,
    filter: OperationFilter,
    handler: Arc<dyn OperationHandler>,
}

#[derive(Default)]
struct RouteTable {
    routes: Vec<Arc<Route>>,
    default: Option<Arc<dyn OperationHandler>>,
}

/// Ordered first-match dispatch table for chain operations.
pub struct OperationRouter {
    table: RwLock<RouteTable>,
    metrics: Mutex<MetricsState>,
    sample_capacity: usize,
    logger: SharedLogger,
}

impl OperationRouter {
    #[must_use]
    pub fn new(logger: SharedLogger) -> Self {
        Self::with_sample_capacity(logger, hookwatch_core::sample::DEFAULT_SAMPLE_CAPACITY)
    }

    #[must_use]
    pub fn with_sample_capacity(logger: SharedLogger, sample_capacity: usize) -> Self {
        Self {
            table: RwLock::new(RouteTable::default()),
            metrics: Mutex::new(MetricsState::new(sample_capacity)),
            sample_capacity,
            logger,
        }
    }

    /// Registers a route. Re-registering a key replaces its handler and
    /// filter without changing its position.
    pub fn register_route(
        &self,
        key: impl Into<String>,
        handler: Arc<dyn OperationHandler>,
        filter: Option<OperationFilter>,
    ) {
        let route = Arc::new(Route {
            key: key.into(),
            filter: filter.unwrap_or_default(),
            handler,
        });
        let mut table = self.table.write();
        if let Some(slot) = table.routes.iter_mut().find(|r| r.key == route.key) {
            self.logger
                .debug(&format!("replacing handler for route {}", route.key));
            *slot = route;
        } else {
            self.logger.debug(&format!("registered route {}", route.key));
            table.routes.push(route);
        }
    }

    /// Removes a route. Returns `false` if no route had that key.
    pub fn unregister_route(&self, key: &str) -> bool {
        let mut table = self.table.write();
        let before = table.routes.len();
        table.routes.retain(|r| r.key != key);
        table.routes.len() != before
    }

    /// Sets the handler tried when no registered route accepts an operation.
    pub fn set_default_route(&self, handler: Arc<dyn OperationHandler>) {
        self.table.write().default = Some(handler);
    }

    pub fn clear_default_route(&self) {
        self.table.write().default = None;
    }

    #[must_use]
    pub fn has_default_route(&self) -> bool {
        self.table.read().default.is_some()
    }

    /// Route keys in evaluation order.
    #[must_use]
    pub fn route_keys(&self) -> Vec<String> {
        self.table.read().routes.iter().map(|r| r.key.clone()).collect()
    }

    /// Dispatches one operation. Returns `true` if a handler claimed it.
    pub async fn route_operation(&self, op: &Operation, ctx: &RouteContext) -> bool {
        self.metrics.lock().counters.total_operations += 1;

        let Some(op_type) = op.op_type() else {
            self.metrics.lock().counters.invalid += 1;
            self.logger.warn(&format!(
                "operation rejected: missing type field (event {})",
                ctx.event_id.as_deref().unwrap_or("-")
            ));
            return false;
        };

        let started = Instant::now();
        let (routes, default) = {
            let table = self.table.read();
            (table.routes.clone(), table.default.clone())
        };

        let mut filtered = 0u64;
        let mut errors = 0u64;
        let mut claimed_by: Option<String> = None;

        for route in &routes {
            if !route.filter.matches(op) {
                filtered += 1;
                continue;
            }
            match route.handler.handle(op, ctx).await {
                Ok(true) => {
                    claimed_by = Some(route.key.clone());
                    break;
                }
                Ok(false) => {}
                Err(err) => {
                    errors += 1;
                    self.logger.error(&format!(
                        "route {} failed on {op_type} operation: {err:#}",
                        route.key
                    ));
                }
            }
        }

        if claimed_by.is_none() {
            if let Some(default) = default {
                match default.handle(op, ctx).await {
                    Ok(true) => claimed_by = Some(DEFAULT_ROUTE_KEY.to_string()),
                    Ok(false) => {}
                    Err(err) => {
                        errors += 1;
                        self.logger.error(&format!(
                            "default route failed on {op_type} operation: {err:#}"
                        ));
                    }
                }
            }
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut metrics = self.metrics.lock();
        metrics.counters.filtered += filtered;
        metrics.counters.errors += errors;
        metrics.routing_times.push(elapsed_ms);
        match &claimed_by {
            Some(key) => {
                metrics.counters.routed += 1;
                *metrics.counters.routes_by_key.entry(key.clone()).or_insert(0) += 1;
            }
            None => metrics.counters.unrouted += 1,
        }
        drop(metrics);

        if claimed_by.is_none() {
            self.logger
                .debug(&format!("no route accepted {op_type} operation"));
        }
        claimed_by.is_some()
    }

    /// Routes each operation in order. Returns how many were claimed.
    pub async fn route_operation_batch(&self, ops: &[Operation], ctx: &RouteContext) -> usize {
        let mut routed = 0;
        for op in ops {
            if self.route_operation(op, ctx).await {
                routed += 1;
            }
        }
        routed
    }

    #[must_use]
    pub fn get_metrics(&self) -> RouteMetrics {
        let metrics = self.metrics.lock();
        RouteMetrics {
            average_routing_time_ms: round4(metrics.routing_times.average()),
            sample_count: metrics.routing_times.len(),
            ..metrics.counters.clone()
        }
    }

    pub fn reset_metrics(&self) {
        *self.metrics.lock() = MetricsState::new(self.sample_capacity);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;
    use crate::logging::{LogLevel, MemoryLogger};

    /// Counts invocations and returns a fixed answer.
    struct CountingHandler {
        calls: AtomicU32,
        answer: bool,
    }

    impl CountingHandler {
        fn new(answer: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                answer,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OperationHandler for CountingHandler {
        async fn handle(&self, _op: &Operation, _ctx: &RouteContext) -> anyhow::Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    fn op(value: serde_json::Value) -> Operation {
        Operation::new(value)
    }

    fn router() -> (OperationRouter, Arc<MemoryLogger>) {
        let logger = MemoryLogger::new();
        (OperationRouter::new(logger.clone()), logger)
    }

    #[tokio::test]
    async fn missing_type_is_rejected_without_invoking_handlers() {
        let (router, logger) = router();
        let handler = CountingHandler::new(true);
        router.register_route("all", handler.clone(), None);
        router.set_default_route(handler.clone());

        let routed = router
            .route_operation(&op(json!({ "method": "mint" })), &RouteContext::default())
            .await;

        assert!(!routed);
        assert_eq!(handler.calls(), 0);
        let metrics = router.get_metrics();
        assert_eq!(metrics.invalid, 1);
        assert_eq!(metrics.total_operations, 1);
        assert!(logger.contains(LogLevel::Warn, "missing type"));
    }

    #[tokio::test]
    async fn filtered_route_falls_through_to_default() {
        let (router, _) = router();
        let badge = CountingHandler::new(true);
        let fallback = CountingHandler::new(true);
        router.register_route("badge", badge.clone(), Some(OperationFilter::by_type("badge_mint")));
        router.set_default_route(fallback.clone());

        let routed = router
            .route_operation(&op(json!({ "type": "community_creation" })), &RouteContext::default())
            .await;

        assert!(routed);
        assert_eq!(badge.calls(), 0);
        assert_eq!(fallback.calls(), 1);
        let metrics = router.get_metrics();
        assert_eq!(metrics.filtered, 1);
        assert_eq!(metrics.routed, 1);
        assert_eq!(metrics.routes_by_key.get(DEFAULT_ROUTE_KEY), Some(&1));
    }

    #[tokio::test]
    async fn typed_route_then_catch_all_invokes_only_matching() {
        let (router, _) = router();
        let a = CountingHandler::new(true);
        let b = CountingHandler::new(true);
        router.register_route("a", a.clone(), Some(OperationFilter::by_type("x")));
        router.register_route("b", b.clone(), None);

        assert!(router.route_operation(&op(json!({ "type": "y" })), &RouteContext::default()).await);
        assert_eq!(a.calls(), 0);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn first_accepting_match_short_circuits() {
        let (router, _) = router();
        let declines = CountingHandler::new(false);
        let accepts = CountingHandler::new(true);
        let never = CountingHandler::new(true);
        router.register_route("declines", declines.clone(), None);
        router.register_route("accepts", accepts.clone(), None);
        router.register_route("never", never.clone(), None);

        assert!(router.route_operation(&op(json!({ "type": "t" })), &RouteContext::default()).await);
        assert_eq!(declines.calls(), 1);
        assert_eq!(accepts.calls(), 1);
        assert_eq!(never.calls(), 0);
        assert_eq!(router.get_metrics().routes_by_key.get("accepts"), Some(&1));
    }

    #[tokio::test]
    async fn handler_error_continues_to_next_route() {
        let (router, logger) = router();
        let fallback = CountingHandler::new(true);
        router.register_route(
            "broken",
            Arc::new(FnHandler(|_: &Operation, _: &RouteContext| -> anyhow::Result<bool> {
                anyhow::bail!("contract decode failed")
            })),
            None,
        );
        router.register_route("next", fallback.clone(), None);

        assert!(router.route_operation(&op(json!({ "type": "t" })), &RouteContext::default()).await);
        assert_eq!(fallback.calls(), 1);
        assert_eq!(router.get_metrics().errors, 1);
        assert!(logger.contains(LogLevel::Error, "contract decode failed"));
    }

    #[tokio::test]
    async fn unmatched_without_default_is_unrouted() {
        let (router, _) = router();
        router.register_route("only-x", CountingHandler::new(true), Some(OperationFilter::by_type("x")));

        assert!(!router.route_operation(&op(json!({ "type": "z" })), &RouteContext::default()).await);
        let metrics = router.get_metrics();
        assert_eq!(metrics.unrouted, 1);
        assert_eq!(metrics.routed, 0);
        assert_eq!(metrics.filtered, 1);
    }

    #[tokio::test]
    async fn reregistering_key_keeps_position() {
        let (router, _) = router();
        let old = CountingHandler::new(true);
        let replacement = CountingHandler::new(true);
        router.register_route("first", old.clone(), None);
        router.register_route("second", CountingHandler::new(true), None);
        router.register_route("first", replacement.clone(), None);

        assert_eq!(router.route_keys(), vec!["first", "second"]);
        router.route_operation(&op(json!({ "type": "t" })), &RouteContext::default()).await;
        assert_eq!(old.calls(), 0);
        assert_eq!(replacement.calls(), 1);

        assert!(router.unregister_route("first"));
        assert!(!router.unregister_route("first"));
        assert_eq!(router.route_keys(), vec!["second"]);
    }

    #[tokio::test]
    async fn contract_and_method_filters() {
        let (router, _) = router();
        let mint = CountingHandler::new(true);
        router.register_route(
            "mint",
            mint.clone(),
            Some(OperationFilter::any().with_contract("SP1.passport").with_method("mint")),
        );

        let hit = op(json!({ "type": "call", "contractAddress": "SP1.passport", "method": "mint" }));
        let miss = op(json!({ "type": "call", "contractAddress": "SP2.other", "method": "mint" }));
        assert!(router.route_operation(&hit, &RouteContext::default()).await);
        assert!(!router.route_operation(&miss, &RouteContext::default()).await);
        assert_eq!(mint.calls(), 1);
    }

    #[tokio::test]
    async fn batch_counts_routed_and_totals_match() {
        let (router, _) = router();
        router.register_route("x", CountingHandler::new(true), Some(OperationFilter::by_type("x")));

        let ops = vec![
            op(json!({ "type": "x" })),
            op(json!({ "type": "y" })),
            op(json!({})),
            op(json!({ "type": "x" })),
        ];
        let routed = router.route_operation_batch(&ops, &RouteContext::default()).await;
        assert_eq!(routed, 2);

        let metrics = router.get_metrics();
        assert_eq!(metrics.total_operations, 4);
        assert_eq!(metrics.routed, 2);
        assert_eq!(metrics.unrouted, 1);
        assert_eq!(metrics.invalid, 1);
    }

    #[tokio::test]
    async fn fresh_and_reset_metrics_are_zero() {
        let (router, _) = router();
        assert_eq!(router.get_metrics(), RouteMetrics::default());

        router.register_route("all", CountingHandler::new(true), None);
        router.route_operation(&op(json!({ "type": "t" })), &RouteContext::default()).await;
        assert_eq!(router.get_metrics().sample_count, 1);

        router.reset_metrics();
        assert_eq!(router.get_metrics(), RouteMetrics::default());
    }

    #[test]
    fn context_from_event() {
        let event = ChainEvent {
            event_id: "0xt".to_string(),
            block_height: 9,
            block_hash: "0xb".to_string(),
            tx_id: "0xt".to_string(),
            chainhook_uuid: Some("hook".to_string()),
            operations: Vec::new(),
        };
        let ctx = RouteContext::from_event(&event);
        assert_eq!(ctx.block_height, Some(9));
        assert_eq!(ctx.tx_id.as_deref(), Some("0xt"));
        assert_eq!(ctx.chainhook_uuid.as_deref(), Some("hook"));
    }

    #[tokio::test]
    async fn logging_handler_claims_everything() {
        let logger = MemoryLogger::new();
        let router = OperationRouter::new(logger.clone());
        router.set_default_route(Arc::new(LoggingHandler::new(logger.clone())));

        let ctx = RouteContext {
            block_height: Some(5),
            tx_id: Some("0xt".to_string()),
            ..RouteContext::default()
        };
        assert!(router.route_operation(&Operation::new(json!({ "type": "vote" })), &ctx).await);
        assert!(logger.contains(LogLevel::Info, "vote operation in block 5 (tx 0xt)"));
        assert_eq!(router.get_metrics().routes_by_key.get(DEFAULT_ROUTE_KEY), Some(&1));
    }
}
