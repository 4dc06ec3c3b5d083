//! Pending-request bookkeeping for one identifier space.
//!
//! A [`CorrelationTable`] maps an id to the caller waiting on it. Inbound
//! handlers drive it with four operations: [`issue`](CorrelationTable::issue)
//! when a call goes out, [`accumulate`](CorrelationTable::accumulate) for each
//! partial record, [`resolve`](CorrelationTable::resolve) on the terminal
//! event, and [`fail`](CorrelationTable::fail) on an error. Each entry is
//! completed exactly once; later events for the same id find nothing and are
//! ignored.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::error::{GatewayError, Result};

/// Where a caller's result is delivered.
pub type Reply = oneshot::Sender<Result<Value>>;

/// The two independent identifier namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdSpace {
    /// Client-allocated request ids.
    Request,
    /// Server-seeded order ids.
    Order,
}

impl IdSpace {
    /// Key used when a resolution echoes the id back to the caller.
    pub fn key(self) -> &'static str {
        match self {
            IdSpace::Request => "reqId",
            IdSpace::Order => "orderId",
        }
    }
}

impl fmt::Display for IdSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdSpace::Request => f.write_str("request"),
            IdSpace::Order => f.write_str("order"),
        }
    }
}

struct Pending {
    reply: Reply,
    results: Option<Vec<Value>>,
    issued_at: Instant,
    label: &'static str,
}

/// Pending requests and per-id metadata for one [`IdSpace`].
pub struct CorrelationTable {
    space: IdSpace,
    pending: HashMap<i64, Pending>,
    metadata: HashMap<i64, Map<String, Value>>,
}

impl CorrelationTable {
    pub fn new(space: IdSpace) -> Self {
        Self {
            space,
            pending: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn space(&self) -> IdSpace {
        self.space
    }

    /// Register a pending request for `id`.
    ///
    /// With `streaming` set, the entry starts with an empty accumulator, so a
    /// terminal event with no preceding records resolves to `[]`.
    ///
    /// An id that is already pending is refused: the new caller is failed with
    /// [`GatewayError::DuplicateId`] and the existing entry is left untouched.
    pub fn issue(
        &mut self,
        id: i64,
        label: &'static str,
        reply: Reply,
        streaming: bool,
    ) -> Result<()> {
        if self.pending.contains_key(&id) {
            let _ = reply.send(Err(GatewayError::DuplicateId(id)));
            return Err(GatewayError::DuplicateId(id));
        }

        info!(space = %self.space, id, label, "start processing");
        self.pending.insert(
            id,
            Pending {
                reply,
                results: streaming.then(Vec::new),
                issued_at: Instant::now(),
                label,
            },
        );
        Ok(())
    }

    /// Append a partial record to `id`'s accumulator.
    ///
    /// Returns `false` (and drops the record) when nothing is pending for `id`.
    pub fn accumulate(&mut self, id: i64, record: Value) -> bool {
        match self.pending.get_mut(&id) {
            Some(entry) => {
                entry.results.get_or_insert_with(Vec::new).push(record);
                trace!(space = %self.space, id, label = entry.label, "appended partial result");
                true
            }
            None => {
                trace!(space = %self.space, id, "partial result for unknown id dropped");
                false
            }
        }
    }

    /// Complete `id` with its accumulated records, or with `{key: id}` when it
    /// never accumulated anything.
    ///
    /// Silent no-op for an unknown id.
    pub fn resolve(&mut self, id: i64) -> bool {
        let Some(entry) = self.pending.remove(&id) else {
            trace!(space = %self.space, id, "resolve for unknown id ignored");
            return false;
        };

        let value = match entry.results {
            Some(results) => Value::Array(results),
            None => echo_id(self.space, id),
        };
        info!(space = %self.space, id, label = entry.label, "finish processing");
        let _ = entry.reply.send(Ok(value));
        true
    }

    /// Complete `id` with an explicit value.
    pub fn resolve_with(&mut self, id: i64, value: Value) -> bool {
        let Some(entry) = self.pending.remove(&id) else {
            return false;
        };

        info!(space = %self.space, id, label = entry.label, "finish processing");
        let _ = entry.reply.send(Ok(value));
        true
    }

    /// Fail `id` with `error`. No-op for an unknown id.
    pub fn fail(&mut self, id: i64, error: GatewayError) -> bool {
        let Some(entry) = self.pending.remove(&id) else {
            return false;
        };

        debug!(space = %self.space, id, label = entry.label, %error, "request failed");
        let _ = entry.reply.send(Err(error));
        true
    }

    /// Fail every pending entry with `error` and empty the table.
    ///
    /// Metadata is kept: it belongs to subscriptions and orders, which outlive
    /// the connection.
    pub fn fail_all(&mut self, error: &GatewayError) -> Vec<i64> {
        let mut ids: Vec<i64> = self.pending.keys().copied().collect();
        ids.sort_unstable();

        for id in &ids {
            if let Some(entry) = self.pending.remove(id) {
                let _ = entry.reply.send(Err(error.clone()));
            }
        }
        ids
    }

    /// Fail entries that have been pending for at least `timeout`.
    pub fn expire(&mut self, timeout: Duration) -> Vec<i64> {
        let now = Instant::now();
        let mut expired: Vec<i64> = self
            .pending
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.issued_at) >= timeout)
            .map(|(id, _)| *id)
            .collect();
        expired.sort_unstable();

        for id in &expired {
            self.fail(*id, GatewayError::RequestTimedOut(timeout));
        }
        expired
    }

    pub fn contains(&self, id: i64) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending ids in ascending order.
    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.pending.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Attach context that later published events for `id` are merged with.
    pub fn set_metadata(&mut self, id: i64, metadata: Map<String, Value>) {
        self.metadata.insert(id, metadata);
    }

    pub fn metadata(&self, id: i64) -> Option<&Map<String, Value>> {
        self.metadata.get(&id)
    }

    pub fn remove_metadata(&mut self, id: i64) -> Option<Map<String, Value>> {
        self.metadata.remove(&id)
    }
}

fn echo_id(space: IdSpace, id: i64) -> Value {
    let mut echo = Map::new();
    echo.insert(space.key().to_string(), Value::from(id));
    Value::Object(echo)
}

impl fmt::Debug for CorrelationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationTable")
            .field("space", &self.space)
            .field("pending", &self.ids())
            .field("metadata", &self.metadata.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn issue(
        table: &mut CorrelationTable,
        id: i64,
        streaming: bool,
    ) -> oneshot::Receiver<Result<Value>> {
        let (tx, rx) = oneshot::channel();
        table.issue(id, "test", tx, streaming).unwrap();
        rx
    }

    #[tokio::test]
    async fn accumulate_then_resolve_preserves_arrival_order() {
        let mut table = CorrelationTable::new(IdSpace::Request);
        let rx = issue(&mut table, 1, false);

        for n in 0..3 {
            assert!(table.accumulate(1, json!({ "n": n })));
        }
        assert!(table.resolve(1));

        let value = rx.await.unwrap().unwrap();
        assert_eq!(value, json!([{ "n": 0 }, { "n": 1 }, { "n": 2 }]));
        assert!(!table.contains(1));
    }

    #[tokio::test]
    async fn resolve_without_records_echoes_id() {
        let mut table = CorrelationTable::new(IdSpace::Order);
        let rx = issue(&mut table, 1001, false);

        table.resolve(1001);
        assert_eq!(rx.await.unwrap().unwrap(), json!({ "orderId": 1001 }));
    }

    #[tokio::test]
    async fn streaming_entry_resolves_to_empty_list() {
        let mut table = CorrelationTable::new(IdSpace::Request);
        let rx = issue(&mut table, 4, true);

        table.resolve(4);
        assert_eq!(rx.await.unwrap().unwrap(), json!([]));
    }

    #[tokio::test]
    async fn error_then_repeat_is_noop() {
        let mut table = CorrelationTable::new(IdSpace::Request);
        let rx = issue(&mut table, 3, false);
        let api_error = GatewayError::Api {
            id: 3,
            code: 200,
            message: "No security definition has been found".to_string(),
        };

        assert!(table.fail(3, api_error.clone()));
        assert!(!table.fail(3, api_error));
        assert!(!table.resolve(3));

        assert!(matches!(
            rx.await.unwrap(),
            Err(GatewayError::Api { code: 200, .. })
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut table = CorrelationTable::new(IdSpace::Request);

        assert!(!table.accumulate(9, json!({})));
        assert!(!table.resolve(9));
        assert!(!table.resolve_with(9, json!(null)));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn duplicate_issue_is_refused() {
        let mut table = CorrelationTable::new(IdSpace::Request);
        let first = issue(&mut table, 7, false);

        let (tx, second) = oneshot::channel();
        let err = table.issue(7, "dup", tx, false).unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateId(7)));
        assert!(matches!(second.await.unwrap(), Err(GatewayError::DuplicateId(7))));

        table.resolve(7);
        assert_eq!(first.await.unwrap().unwrap(), json!({ "reqId": 7 }));
    }

    #[tokio::test]
    async fn fail_all_sweeps_but_keeps_metadata() {
        let mut table = CorrelationTable::new(IdSpace::Request);
        let a = issue(&mut table, 5, false);
        let b = issue(&mut table, 2, true);
        let mut meta = Map::new();
        meta.insert("symbol".to_string(), json!("AAPL"));
        table.set_metadata(5, meta);

        let swept = table.fail_all(&GatewayError::ConnectionLost("reset".to_string()));

        assert_eq!(swept, vec![2, 5]);
        assert!(table.is_empty());
        assert!(table.metadata(5).is_some());
        assert!(matches!(a.await.unwrap(), Err(GatewayError::ConnectionLost(_))));
        assert!(matches!(b.await.unwrap(), Err(GatewayError::ConnectionLost(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn expire_fails_only_old_entries() {
        let mut table = CorrelationTable::new(IdSpace::Request);
        let old = issue(&mut table, 1, false);
        tokio::time::advance(Duration::from_secs(30)).await;
        let _fresh = issue(&mut table, 2, false);

        let expired = table.expire(Duration::from_secs(20));

        assert_eq!(expired, vec![1]);
        assert_eq!(table.ids(), vec![2]);
        assert!(matches!(old.await.unwrap(), Err(GatewayError::RequestTimedOut(_))));
    }

    #[test]
    fn dropped_caller_does_not_break_resolution() {
        let mut table = CorrelationTable::new(IdSpace::Request);
        let rx = issue(&mut table, 8, false);
        drop(rx);

        assert!(table.resolve(8));
        assert!(!table.contains(8));
    }
}
