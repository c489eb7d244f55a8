use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use serde_json::{json, Map, Value as JsonValue};
use url::Url;

use crate::error::SharePointResult;

use super::{HttpRequest, HttpResponse, HttpTransport, HttpVerb, RequestBody, REQUEST_DIGEST_HEADER};

const INVALID_DIGEST_MESSAGE: &str = "The security validation for this page is invalid and might be corrupted. Please use your web browser's Back button to try your operation again.";
const DEFAULT_PAGE_SIZE: usize = 100;

/// A request observed by [`InMemoryBackend`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    pub verb: HttpVerb,
    pub url: String,
    pub digest: Option<String>,
    pub body: Option<JsonValue>,
}

/// In-process stand-in for a SharePoint web.
///
/// Serves the context-info, current-user, list creation and list item
/// endpoints with verbose OData payloads, validates request digests on every
/// write, and records each request it receives. Every request yields to the
/// executor once before it is processed, so concurrently awaited calls
/// interleave the way they would against a real server.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

#[derive(Default)]
struct BackendState {
    login_name: Option<String>,
    issued_digests: BTreeSet<String>,
    digest_serial: u64,
    pending_context_info_failures: usize,
    lists: BTreeMap<String, ListState>,
    requests: Vec<RecordedRequest>,
}

struct ListState {
    title: String,
    next_id: u64,
    items: BTreeMap<u64, StoredItem>,
}

struct StoredItem {
    fields: Map<String, JsonValue>,
    version: u64,
}

enum ListRoute {
    Items(String),
    Item(String, u64),
}

enum FilterLiteral {
    Text(String),
    Number(f64),
}

struct EqFilter {
    field: String,
    literal: FilterLiteral,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the login name reported by the current-user endpoint.
    pub fn with_login_name(self, login_name: impl Into<String>) -> Self {
        self.set_login_name(Some(login_name.into()));
        self
    }

    pub fn with_list(self, title: impl Into<String>) -> Self {
        self.create_list(title);
        self
    }

    /// `None` makes the current-user endpoint answer 401.
    pub fn set_login_name(&self, login_name: Option<String>) {
        self.state.lock().unwrap().login_name = login_name;
    }

    pub fn create_list(&self, title: impl Into<String>) {
        let title = title.into();
        self.state
            .lock()
            .unwrap()
            .lists
            .entry(title.to_lowercase())
            .or_insert_with(|| ListState::new(title));
    }

    /// Makes the next `count` context-info calls fail with HTTP 500.
    pub fn fail_next_context_info(&self, count: usize) {
        self.state.lock().unwrap().pending_context_info_failures = count;
    }

    /// Invalidates every digest issued so far.
    pub fn expire_digests(&self) {
        self.state.lock().unwrap().issued_digests.clear();
    }

    /// Rows of `list` as they would be returned by an unfiltered read.
    pub fn items(&self, list: &str) -> Vec<JsonValue> {
        let state = self.state.lock().unwrap();
        state
            .lists
            .get(&list.to_lowercase())
            .map(|list| {
                list.items
                    .iter()
                    .map(|(id, item)| list.entity(*id, item, None))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn issued_digest_count(&self) -> u64 {
        self.state.lock().unwrap().digest_serial
    }

    fn handle(&self, request: HttpRequest) -> HttpResponse {
        let mut state = self.state.lock().unwrap();
        let body = match &request.body {
            RequestBody::Json(value) => Some(value.clone()),
            _ => None,
        };
        let digest = request.header(REQUEST_DIGEST_HEADER).map(str::to_string);
        state.requests.push(RecordedRequest {
            verb: request.verb,
            url: request.url.clone(),
            digest: digest.clone(),
            body: body.clone(),
        });

        let url = match Url::parse(&request.url) {
            Ok(url) => url,
            Err(err) => return error_response(400, &format!("Malformed URL: {err}")),
        };
        let path = percent_decode_str(url.path()).decode_utf8_lossy().into_owned();
        let Some((_, route)) = path.split_once("/_api/") else {
            return error_response(404, "Not a REST endpoint");
        };
        let query: BTreeMap<String, String> = url.query_pairs().into_owned().collect();

        if route == "contextinfo" {
            return match request.verb {
                HttpVerb::Post => state.context_info(),
                _ => error_response(405, "Method not allowed"),
            };
        }

        if request.verb.is_mutating() && !state.digest_is_valid(digest.as_deref()) {
            return error_response(403, INVALID_DIGEST_MESSAGE);
        }

        match (request.verb, route) {
            (HttpVerb::Get, "web/currentuser") => state.current_user(&query),
            (HttpVerb::Post, "web/lists") => state.create_list_from(body),
            _ => match parse_list_route(route) {
                Some(ListRoute::Items(title)) => match request.verb {
                    HttpVerb::Get => state.query_items(&title, &query),
                    HttpVerb::Post => state.add_item(&title, body),
                    _ => error_response(405, "Method not allowed"),
                },
                Some(ListRoute::Item(title, id)) => state.item_request(request.verb, &title, id, body),
                None => error_response(404, &format!("Unsupported endpoint '{route}'")),
            },
        }
    }
}

impl BackendState {
    fn digest_is_valid(&self, digest: Option<&str>) -> bool {
        digest.is_some_and(|digest| self.issued_digests.contains(digest))
    }

    fn context_info(&mut self) -> HttpResponse {
        if self.pending_context_info_failures > 0 {
            self.pending_context_info_failures -= 1;
            return error_response(500, "Context information is temporarily unavailable.");
        }
        self.digest_serial += 1;
        let digest = format!("0x{:040X},{}", self.digest_serial, self.digest_serial);
        self.issued_digests.insert(digest.clone());
        HttpResponse::json(
            200,
            &json!({
                "d": {
                    "GetContextWebInformation": {
                        "__metadata": { "type": "SP.ContextWebInformation" },
                        "FormDigestTimeoutSeconds": 1800,
                        "FormDigestValue": digest,
                    }
                }
            }),
        )
    }

    fn current_user(&self, query: &BTreeMap<String, String>) -> HttpResponse {
        let Some(login_name) = &self.login_name else {
            return error_response(401, "Access denied.");
        };
        let mut user = json!({
            "__metadata": { "type": "SP.User" },
            "Id": 11,
            "LoginName": login_name,
            "Title": login_name,
            "Email": "",
            "IsSiteAdmin": false,
        });
        let expand_groups = query
            .get("$expand")
            .is_some_and(|expand| expand.split(',').any(|part| part.trim() == "Groups"));
        if expand_groups {
            user["Groups"] = json!({ "results": [{ "Id": 3, "Title": "Team Members" }] });
        }
        HttpResponse::json(200, &json!({ "d": user }))
    }

    fn create_list_from(&mut self, body: Option<JsonValue>) -> HttpResponse {
        let Some(title) = body
            .as_ref()
            .and_then(|body| body.get("Title"))
            .and_then(JsonValue::as_str)
        else {
            return error_response(400, "The list title is required.");
        };
        let key = title.to_lowercase();
        if self.lists.contains_key(&key) {
            return error_response(
                500,
                "A list, survey, discussion board, or document library with the specified title already exists in this Web site.",
            );
        }
        self.lists.insert(key, ListState::new(title.to_string()));
        HttpResponse::json(
            201,
            &json!({ "d": { "__metadata": { "type": "SP.List" }, "Title": title, "ItemCount": 0 } }),
        )
    }

    fn query_items(&self, title: &str, query: &BTreeMap<String, String>) -> HttpResponse {
        let Some(list) = self.lists.get(&title.to_lowercase()) else {
            return list_missing(title);
        };
        let filter = match query.get("$filter").map(|raw| parse_eq_filter(raw)).transpose() {
            Ok(filter) => filter,
            Err(message) => return error_response(400, &message),
        };
        let skip = query
            .get("$skip")
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(0);
        let top = query
            .get("$top")
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let select: Option<Vec<String>> = query.get("$select").map(|raw| {
            raw.split(',')
                .map(|field| field.trim().to_string())
                .filter(|field| !field.is_empty())
                .collect()
        });

        let results: Vec<JsonValue> = list
            .items
            .iter()
            .filter(|(id, item)| {
                filter
                    .as_ref()
                    .map_or(true, |filter| filter.matches(**id, &item.fields))
            })
            .skip(skip)
            .take(top)
            .map(|(id, item)| list.entity(*id, item, select.as_deref()))
            .collect();
        HttpResponse::json(200, &json!({ "d": { "results": results } }))
    }

    fn add_item(&mut self, title: &str, body: Option<JsonValue>) -> HttpResponse {
        let Some(list) = self.lists.get_mut(&title.to_lowercase()) else {
            return list_missing(title);
        };
        let Some(JsonValue::Object(mut fields)) = body else {
            return error_response(400, "The request body must be a JSON object.");
        };
        for reserved in ["__metadata", "Id", "ID"] {
            fields.remove(reserved);
        }
        let id = list.next_id;
        list.next_id += 1;
        let item = StoredItem { fields, version: 1 };
        let entity = list.entity(id, &item, None);
        list.items.insert(id, item);
        HttpResponse::json(201, &json!({ "d": entity }))
    }

    fn item_request(
        &mut self,
        verb: HttpVerb,
        title: &str,
        id: u64,
        body: Option<JsonValue>,
    ) -> HttpResponse {
        let Some(list) = self.lists.get_mut(&title.to_lowercase()) else {
            return list_missing(title);
        };
        if !list.items.contains_key(&id) {
            return error_response(
                404,
                "Item does not exist. It may have been deleted by another user.",
            );
        }
        match verb {
            HttpVerb::Get => {
                let entity = list.entity(id, &list.items[&id], None);
                HttpResponse::json(200, &json!({ "d": entity }))
            }
            HttpVerb::Merge | HttpVerb::Put => {
                let Some(JsonValue::Object(update)) = body else {
                    return error_response(400, "The request body must be a JSON object.");
                };
                let Some(item) = list.items.get_mut(&id) else {
                    return error_response(404, "Item does not exist.");
                };
                if verb == HttpVerb::Put {
                    item.fields.clear();
                }
                for (key, value) in update {
                    if !matches!(key.as_str(), "__metadata" | "Id" | "ID") {
                        item.fields.insert(key, value);
                    }
                }
                item.version += 1;
                HttpResponse::empty(204)
            }
            HttpVerb::Delete => {
                list.items.remove(&id);
                HttpResponse::empty(200)
            }
            HttpVerb::Post => error_response(400, "POST to an item requires a verb override."),
        }
    }
}

impl ListState {
    fn new(title: String) -> Self {
        Self {
            title,
            next_id: 1,
            items: BTreeMap::new(),
        }
    }

    fn entity(&self, id: u64, item: &StoredItem, select: Option<&[String]>) -> JsonValue {
        let mut entity = Map::new();
        entity.insert(
            "__metadata".to_string(),
            json!({
                "type": format!("SP.Data.{}ListItem", self.title.replace(' ', "_x0020_")),
                "etag": format!("\"{}\"", item.version),
            }),
        );
        let wants = |field: &str| {
            select.map_or(true, |fields| {
                fields.iter().any(|selected| selected.eq_ignore_ascii_case(field))
            })
        };
        if wants("Id") {
            entity.insert("Id".to_string(), json!(id));
        }
        if wants("ID") && select.is_none() {
            entity.insert("ID".to_string(), json!(id));
        }
        for (key, value) in &item.fields {
            if wants(key) {
                entity.insert(key.clone(), value.clone());
            }
        }
        JsonValue::Object(entity)
    }
}

impl EqFilter {
    fn matches(&self, id: u64, fields: &Map<String, JsonValue>) -> bool {
        let value = if self.field.eq_ignore_ascii_case("Id") {
            Some(json!(id))
        } else {
            fields.get(&self.field).cloned()
        };
        match (&self.literal, value) {
            (FilterLiteral::Text(expected), Some(JsonValue::String(actual))) => {
                actual.to_lowercase() == expected.to_lowercase()
            }
            (FilterLiteral::Number(expected), Some(JsonValue::Number(actual))) => {
                actual.as_f64() == Some(*expected)
            }
            _ => false,
        }
    }
}

/// Parses the single `Field eq literal` form the backend understands.
fn parse_eq_filter(raw: &str) -> Result<EqFilter, String> {
    let (field, literal) = raw
        .split_once(" eq ")
        .ok_or_else(|| format!("Unsupported filter expression '{raw}'"))?;
    let field = field.trim().to_string();
    let literal = literal.trim();
    let literal = if let Some(text) = literal
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        FilterLiteral::Text(text.replace("''", "'"))
    } else {
        literal
            .parse::<f64>()
            .map(FilterLiteral::Number)
            .map_err(|_| format!("Unsupported filter literal '{literal}'"))?
    };
    Ok(EqFilter { field, literal })
}

fn parse_list_route(route: &str) -> Option<ListRoute> {
    let rest = route.strip_prefix("web/lists/GetByTitle('")?;
    let mut title = String::new();
    let mut chars = rest.char_indices().peekable();
    let mut end = None;
    while let Some((index, ch)) = chars.next() {
        if ch == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                title.push('\'');
                continue;
            }
            end = Some(index + 1);
            break;
        }
        title.push(ch);
    }
    let remainder = rest[end?..].strip_prefix(")/items")?;
    if remainder.is_empty() {
        return Some(ListRoute::Items(title));
    }
    let id = remainder
        .strip_prefix('(')?
        .strip_suffix(')')?
        .parse()
        .ok()?;
    Some(ListRoute::Item(title, id))
}

fn error_response(status: u16, message: &str) -> HttpResponse {
    HttpResponse::json(
        status,
        &json!({
            "error": {
                "code": "-2147024809, System.ArgumentException",
                "message": { "lang": "en-US", "value": message }
            }
        }),
    )
}

fn list_missing(title: &str) -> HttpResponse {
    error_response(
        404,
        &format!("List '{title}' does not exist at site with URL ''."),
    )
}

#[derive(Default)]
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl HttpTransport for InMemoryBackend {
    async fn send(&self, request: HttpRequest) -> SharePointResult<HttpResponse> {
        YieldNow::default().await;
        Ok(self.handle(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    const WEB: &str = "https://contoso.sharepoint.com/sites/team/_api";

    fn digest(backend: &InMemoryBackend) -> String {
        let response = block_on(
            backend.send(HttpRequest::new(HttpVerb::Post, format!("{WEB}/contextinfo"))),
        )
        .unwrap();
        let body = response.json_body().unwrap().unwrap();
        body["d"]["GetContextWebInformation"]["FormDigestValue"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn writes_require_an_issued_digest() {
        let backend = InMemoryBackend::new().with_list("Tasks");
        let url = format!("{WEB}/web/lists/GetByTitle('Tasks')/items");
        let body = json!({"Title": "one"});

        let rejected = block_on(
            backend.send(HttpRequest::new(HttpVerb::Post, url.clone()).with_json(body.clone())),
        )
        .unwrap();
        assert_eq!(rejected.status, 403);

        let digest = digest(&backend);
        let accepted = block_on(
            backend.send(
                HttpRequest::new(HttpVerb::Post, url)
                    .with_header(REQUEST_DIGEST_HEADER, digest)
                    .with_json(body),
            ),
        )
        .unwrap();
        assert_eq!(accepted.status, 201);
        assert_eq!(backend.items("Tasks").len(), 1);
    }

    #[test]
    fn filters_on_text_columns_ignore_case() {
        let backend = InMemoryBackend::new().with_list("Settings");
        let digest = digest(&backend);
        for title in ["alice", "bob"] {
            block_on(
                backend.send(
                    HttpRequest::new(
                        HttpVerb::Post,
                        format!("{WEB}/web/lists/GetByTitle('Settings')/items"),
                    )
                    .with_header(REQUEST_DIGEST_HEADER, digest.clone())
                    .with_json(json!({"Title": title})),
                ),
            )
            .unwrap();
        }

        let response = block_on(backend.send(HttpRequest::new(
            HttpVerb::Get,
            format!("{WEB}/web/lists/GetByTitle('Settings')/items?$filter=Title%20eq%20'BOB'&$select=Id,Title"),
        )))
        .unwrap();
        let body = response.json_body().unwrap().unwrap();
        let results = body["d"]["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["Id"], json!(2));
        assert_eq!(results[0]["Title"], json!("bob"));
    }

    #[test]
    fn list_titles_with_quotes_are_routed() {
        match parse_list_route("web/lists/GetByTitle('Bob''s List')/items(4)") {
            Some(ListRoute::Item(title, id)) => {
                assert_eq!(title, "Bob's List");
                assert_eq!(id, 4);
            }
            _ => panic!("expected item route"),
        }
        assert!(parse_list_route("web/lists/GetByTitle('x')/fields").is_none());
    }
}
