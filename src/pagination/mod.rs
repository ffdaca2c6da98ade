//! Lazy iteration over list endpoints.
//!
//! Two server dialects are hidden behind one [`Paginator`]:
//!
//! - [`Dialect::Page`]: 1-based `page` and `pageSize` query parameters; the
//!   body is a bare sequence or a mapping with a `list` key. An empty page
//!   ends the sequence.
//! - [`Dialect::Offset`]: an `offset` token (absent on the first request);
//!   the body carries records under a payload key and the next token under
//!   `next_offset`. A missing or null token ends the sequence.

use crate::client::ServiceClient;
use crate::errors::{ZscalerError, ZscalerResult};
use crate::keycase::KeyCaseTranslator;
use crate::observability::TracingHooks;
use crate::transport::ApiRequest;
use crate::types::Record;
use futures::stream::{self, Stream};
use serde_json::{Map, Value};
use std::collections::VecDeque;

/// Default `pageSize` for the numeric dialect.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest `pageSize` the numeric dialect accepts.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Server paging dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialect {
    /// Numeric `page` / `pageSize`.
    Page,
    /// Opaque `offset` token with `next_offset` in the body.
    Offset {
        /// Body key carrying the page's records, e.g. `users`.
        payload_key: String,
    },
}

impl Dialect {
    /// Offset dialect reading records from `payload_key`.
    pub fn offset(payload_key: impl Into<String>) -> Self {
        Self::Offset {
            payload_key: payload_key.into(),
        }
    }
}

/// Caller arguments for a list call.
///
/// Parameter keys are snake_case and go out in wire case; `max_items`,
/// `max_pages` and `page_size` are consumed by the paginator.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    params: Vec<(String, Value)>,
    max_items: Option<usize>,
    max_pages: Option<u32>,
    page_size: Option<u32>,
}

impl ListParams {
    /// Creates empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds parameters from a mapping of keyword arguments.
    pub fn from_value(kwargs: Value) -> ZscalerResult<Self> {
        let Value::Object(map) = kwargs else {
            return Err(ZscalerError::configuration(
                "List parameters must be a mapping",
            ));
        };

        let mut params = Self::new();
        for (key, value) in map {
            params = match key.as_str() {
                "max_items" => params.max_items(count(&key, &value)?),
                "max_pages" => params.max_pages(count(&key, &value)?),
                "page_size" => params.page_size(count(&key, &value)?),
                _ => params.param(key, value),
            };
        }
        Ok(params)
    }

    /// Adds a query parameter by its snake_case name.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Stops after yielding `n` records.
    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    /// Stops after fetching `n` pages.
    pub fn max_pages(mut self, n: u32) -> Self {
        self.max_pages = Some(n);
        self
    }

    /// Requested page size (numeric dialect only).
    pub fn page_size(mut self, n: u32) -> Self {
        self.page_size = Some(n);
        self
    }

    fn query(&self, translator: &KeyCaseTranslator) -> Vec<(String, String)> {
        self.params
            .iter()
            .filter_map(|(key, value)| {
                query_value(value).map(|v| (translator.key_to_wire(key), v))
            })
            .collect()
    }
}

fn count<T: TryFrom<u64>>(key: &str, value: &Value) -> ZscalerResult<T> {
    let n = value.as_u64().ok_or_else(|| {
        ZscalerError::configuration(format!("'{}' must be a non-negative integer", key))
    })?;
    T::try_from(n)
        .map_err(|_| ZscalerError::configuration(format!("'{}' is out of range: {}", key, n)))
}

/// Renders a JSON scalar for a query string; `null` is omitted.
pub(crate) fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(query_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Active,
    Exhausted,
    Failed,
}

/// Lazy record sequence over a list endpoint.
pub struct Paginator<'a> {
    client: &'a ServiceClient,
    path: String,
    dialect: Dialect,
    query: Vec<(String, String)>,
    page_size: u32,
    max_items: Option<usize>,
    max_pages: Option<u32>,
    page: u32,
    offset: Option<String>,
    more: bool,
    pages_fetched: u32,
    yielded: usize,
    buffer: VecDeque<Record>,
    state: State,
}

impl<'a> Paginator<'a> {
    /// Creates a paginator; nothing is fetched until the first item is requested.
    pub fn new(
        client: &'a ServiceClient,
        path: impl Into<String>,
        dialect: Dialect,
        params: ListParams,
    ) -> Self {
        Self {
            client,
            path: path.into(),
            query: params.query(client.translator()),
            page_size: params
                .page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            dialect,
            max_items: params.max_items,
            max_pages: params.max_pages,
            page: 1,
            offset: None,
            more: true,
            pages_fetched: 0,
            yielded: 0,
            buffer: VecDeque::new(),
            state: State::Active,
        }
    }

    /// Pages fetched so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Records yielded so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Returns the next record, fetching a page when the buffer is empty.
    ///
    /// After an error the paginator is finished and keeps returning `None`.
    pub async fn try_next(&mut self) -> ZscalerResult<Option<Record>> {
        loop {
            if self.state != State::Active {
                return Ok(None);
            }

            if self.max_items.is_some_and(|max| self.yielded >= max) {
                self.state = State::Exhausted;
                return Ok(None);
            }

            if let Some(item) = self.buffer.pop_front() {
                self.yielded += 1;
                return Ok(Some(item));
            }

            if !self.more || self.max_pages.is_some_and(|max| self.pages_fetched >= max) {
                self.state = State::Exhausted;
                return Ok(None);
            }

            if let Err(e) = self.fetch_page().await {
                self.state = State::Failed;
                return Err(e);
            }
        }
    }

    /// Drains every remaining record.
    pub async fn collect_all(mut self) -> ZscalerResult<Vec<Record>> {
        let mut items = Vec::new();
        while let Some(item) = self.try_next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Converts the paginator into a `Stream` of records.
    pub fn into_stream(self) -> impl Stream<Item = ZscalerResult<Record>> + 'a {
        stream::try_unfold(self, |mut paginator| async move {
            let item = paginator.try_next().await?;
            Ok::<_, ZscalerError>(item.map(|item| (item, paginator)))
        })
    }

    async fn fetch_page(&mut self) -> ZscalerResult<()> {
        let mut request = ApiRequest::get(self.path.clone());
        request.query = self.query.clone();

        let request = match self.dialect {
            Dialect::Page => request
                .query("page", self.page)
                .query("pageSize", self.page_size),
            Dialect::Offset { .. } => match self.offset {
                Some(ref offset) => request.query("offset", offset),
                None => request,
            },
        };

        let record = self.client.execute(request).await?.into_record()?;
        self.pages_fetched += 1;

        let items = match self.dialect {
            Dialect::Page => {
                let items = page_items(&record).ok_or_else(|| {
                    ZscalerError::protocol("Page body is neither a sequence nor a 'list' mapping")
                        .with_path(self.path.clone())
                })?;
                self.page += 1;
                if items.is_empty() {
                    self.more = false;
                }
                items
            }
            Dialect::Offset { ref payload_key } => {
                let items = match record.get(payload_key) {
                    Value::Array(items) => items.iter().cloned().map(Record::new).collect(),
                    Value::Null => Vec::new(),
                    _ => {
                        return Err(ZscalerError::protocol(format!(
                            "Payload key '{}' is not a sequence",
                            payload_key
                        ))
                        .with_path(self.path.clone()))
                    }
                };
                let next = query_value(record.get("next_offset")).filter(|s| !s.is_empty());
                self.more = next.is_some() && next != self.offset;
                self.offset = next;
                items
            }
        };

        TracingHooks::on_page_fetch(&self.path, self.pages_fetched, items.len());
        self.buffer.extend(items);
        Ok(())
    }
}

fn page_items(record: &Record) -> Option<Vec<Record>> {
    match record.as_value() {
        Value::Array(_) => Some(record.items()),
        Value::Object(map) => list_of(map),
        Value::Null => Some(Vec::new()),
        _ => None,
    }
}

fn list_of(map: &Map<String, Value>) -> Option<Vec<Record>> {
    match map.get("list") {
        Some(Value::Array(items)) => Some(items.iter().cloned().map(Record::new).collect()),
        Some(Value::Null) | None => Some(Vec::new()),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ZscalerErrorKind;
    use serde_json::json;

    #[test]
    fn test_kwargs_reject_out_of_range_counts() {
        let err = ListParams::from_value(json!({"max_pages": 4_294_967_296u64})).unwrap_err();
        assert_eq!(err.kind(), ZscalerErrorKind::Configuration);
        assert!(ListParams::from_value(json!({"page_size": 4_294_967_296u64})).is_err());
        assert!(ListParams::from_value(json!({"max_items": -1})).is_err());

        let params = ListParams::from_value(json!({"max_pages": 4_294_967_295u64})).unwrap();
        assert_eq!(params.max_pages, Some(u32::MAX));
    }

    #[test]
    fn test_kwargs_consume_caps() {
        let params = ListParams::from_value(json!({
            "search": "eng",
            "max_items": 5,
            "max_pages": 2,
            "page_size": 100,
            "include_disabled": true,
            "routable_ip": null
        }))
        .unwrap();

        assert_eq!(params.max_items, Some(5));
        assert_eq!(params.max_pages, Some(2));
        assert_eq!(params.page_size, Some(100));

        let mut query = params.query(&KeyCaseTranslator::default());
        query.sort();
        assert_eq!(
            query,
            vec![
                ("includeDisabled".to_string(), "true".to_string()),
                ("search".to_string(), "eng".to_string()),
            ]
        );
    }

    #[test]
    fn test_kwargs_must_be_mapping() {
        assert!(ListParams::from_value(json!([1, 2])).is_err());
        assert!(ListParams::from_value(json!({"max_items": -1})).is_err());
    }

    #[test]
    fn test_query_values() {
        assert_eq!(query_value(&json!("a")), Some("a".to_string()));
        assert_eq!(query_value(&json!(2)), Some("2".to_string()));
        assert_eq!(query_value(&json!(["x", 1])), Some("x,1".to_string()));
        assert_eq!(query_value(&Value::Null), None);
    }

    #[test]
    fn test_page_items_shapes() {
        let bare = Record::new(json!([{"id": 1}]));
        assert_eq!(page_items(&bare).unwrap().len(), 1);

        let wrapped = Record::new(json!({"list": [{"id": 1}, {"id": 2}], "total_pages": 1}));
        assert_eq!(page_items(&wrapped).unwrap().len(), 2);

        let empty = Record::new(json!({"total_pages": 0}));
        assert!(page_items(&empty).unwrap().is_empty());

        assert!(page_items(&Record::new(json!("text"))).is_none());
    }
}
