use serde_json::Value as JsonValue;

use crate::client::odata::{into_entity, into_results};
use crate::client::SharePointClient;
use crate::error::{internal_error, SharePointResult};
use crate::query::{build_query, QuerySpec};
use crate::transport::{HttpRequest, HttpVerb, IF_MATCH_HEADER};

use super::item::ListItem;
use super::payload::{EntityPayload, EntityType};

/// `BaseTemplate` of a plain custom list.
pub const GENERIC_LIST_TEMPLATE: u32 = 100;

/// CRUD operations against the rows of named lists.
///
/// Writes attach whatever digest the client has cached; nothing here
/// refreshes it. A write sent without a digest that the server rejects fails
/// with `TokenAbsent`, one rejected despite a digest with `Unauthorized`.
/// Failures are never retried at this layer.
#[derive(Clone, Debug)]
pub struct ListClient {
    client: SharePointClient,
}

impl ListClient {
    pub(crate) fn new(client: SharePointClient) -> Self {
        Self { client }
    }

    /// Adds a row to `list` and returns it as stored by the backend.
    pub async fn create(&self, list: &str, payload: &EntityPayload) -> SharePointResult<ListItem> {
        let url = self.client.location().list_items_url(list);
        let request = HttpRequest::new(HttpVerb::Post, url).with_json(payload.to_body());
        let body = self.client.execute(request).await?;
        entity_item(body)
    }

    /// Reads the rows of `list`, optionally narrowed by `spec`.
    pub async fn read(&self, list: &str, spec: Option<&QuerySpec>) -> SharePointResult<Vec<ListItem>> {
        let base = self.client.location().list_items_url(list);
        let url = match spec {
            Some(spec) => build_query(&base, spec),
            None => base,
        };
        let body = self.client.get_json(url).await?;
        into_results(body)?
            .into_iter()
            .map(ListItem::from_value)
            .collect()
    }

    /// Reads a single row; an unknown `id` fails with `NotFound`.
    pub async fn read_one(&self, list: &str, id: u64) -> SharePointResult<ListItem> {
        let url = self.client.location().list_item_url(list, id);
        let body = self.client.get_json(url).await?;
        ListItem::from_value(into_entity(body))
    }

    /// Merges `payload` into row `id`. Sent with `If-Match: *`, so the last
    /// writer wins.
    pub async fn update(&self, list: &str, id: u64, payload: &EntityPayload) -> SharePointResult<()> {
        let url = self.client.location().list_item_url(list, id);
        let request = HttpRequest::new(HttpVerb::Merge, url)
            .with_header(IF_MATCH_HEADER, "*")
            .with_json(payload.to_body());
        self.client.execute(request).await?;
        Ok(())
    }

    pub async fn delete(&self, list: &str, id: u64) -> SharePointResult<()> {
        let url = self.client.location().list_item_url(list, id);
        let request = HttpRequest::new(HttpVerb::Delete, url).with_header(IF_MATCH_HEADER, "*");
        self.client.execute(request).await?;
        Ok(())
    }

    /// Provisions a new list. Returns the list entity.
    pub async fn create_list(
        &self,
        title: &str,
        base_template: u32,
        description: &str,
    ) -> SharePointResult<JsonValue> {
        let payload = EntityPayload::new(EntityType::List)
            .field("BaseTemplate", base_template)
            .field("Description", description)
            .field("Title", title);
        let request = HttpRequest::new(HttpVerb::Post, self.client.location().lists_url())
            .with_json(payload.to_body());
        let body = self.client.execute(request).await?;
        Ok(into_entity(body.unwrap_or(JsonValue::Null)))
    }

    /// Adds a column to `list`. `field_type_kind` is the numeric
    /// `SP.FieldType` (2 = text, 3 = note, 9 = number, ...).
    pub async fn create_field(
        &self,
        list: &str,
        field_name: &str,
        field_type_kind: u32,
    ) -> SharePointResult<JsonValue> {
        let payload = EntityPayload::new(EntityType::Field)
            .field("FieldTypeKind", field_type_kind)
            .field("Title", field_name);
        let request = HttpRequest::new(HttpVerb::Post, self.client.location().list_fields_url(list))
            .with_json(payload.to_body());
        let body = self.client.execute(request).await?;
        Ok(into_entity(body.unwrap_or(JsonValue::Null)))
    }
}

fn entity_item(body: Option<JsonValue>) -> SharePointResult<ListItem> {
    let body = body.ok_or_else(|| internal_error("Create response did not include the new item"))?;
    ListItem::from_value(into_entity(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SharePointErrorCode;
    use crate::test_support::{client_for, client_for_server, start_mock_server};
    use crate::transport::InMemoryBackend;
    use futures::executor::block_on;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::panic::{self, AssertUnwindSafe};

    const ITEMS_PATH: &str = "/_api/web/lists/GetByTitle('Tasks')/items";

    #[tokio::test]
    async fn read_applies_query_spec_and_unwraps_results() {
        let Ok(server) = panic::catch_unwind(AssertUnwindSafe(start_mock_server)) else {
            eprintln!("Skipping read_applies_query_spec_and_unwraps_results: unable to start mock server");
            return;
        };
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(ITEMS_PATH)
                .query_param("$filter", "Status eq 'Open'")
                .query_param("$select", "Id,Title")
                .query_param("$top", "5")
                .header("Accept", "application/json;odata=verbose");
            then.status(200).json_body(json!({
                "d": { "results": [
                    { "__metadata": { "type": "SP.Data.TasksListItem" }, "Id": 1, "Title": "a" },
                    { "__metadata": { "type": "SP.Data.TasksListItem" }, "Id": 2, "Title": "b" }
                ] }
            }));
        });

        let client = client_for_server(&server);
        let spec = QuerySpec::new()
            .filter("Status%20eq%20'Open'")
            .select(["Id", "Title"])
            .top(5);
        let items = client.lists().read("Tasks", Some(&spec)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id(), Some(2));
        assert_eq!(items[1].title(), Some("b"));
    }

    #[tokio::test]
    async fn update_sends_merge_with_digest_and_wildcard_match() {
        let Ok(server) = panic::catch_unwind(AssertUnwindSafe(start_mock_server)) else {
            eprintln!("Skipping update_sends_merge_with_digest_and_wildcard_match: unable to start mock server");
            return;
        };
        let context_info = server.mock(|when, then| {
            when.method(POST).path("/_api/contextinfo");
            then.status(200).json_body(json!({
                "d": { "GetContextWebInformation": { "FormDigestValue": "0xABC,1" } }
            }));
        });
        let merge = server.mock(|when, then| {
            when.method(POST)
                .path(format!("{ITEMS_PATH}(7)"))
                .header("X-HTTP-Method", "MERGE")
                .header("If-Match", "*")
                .header("X-RequestDigest", "0xABC,1")
                .json_body(json!({ "__metadata": { "type": "SP.ListItem" }, "Title": "renamed" }));
            then.status(204);
        });

        let client = client_for_server(&server);
        client.refresh_digest().await.unwrap();
        client
            .lists()
            .update("Tasks", 7, &EntityPayload::list_item().field("Title", "renamed"))
            .await
            .unwrap();

        context_info.assert_async().await;
        merge.assert_async().await;
    }

    #[tokio::test]
    async fn delete_failure_carries_backend_status_and_message() {
        let Ok(server) = panic::catch_unwind(AssertUnwindSafe(start_mock_server)) else {
            eprintln!("Skipping delete_failure_carries_backend_status_and_message: unable to start mock server");
            return;
        };
        server.mock(|when, then| {
            when.method(POST)
                .path(format!("{ITEMS_PATH}(3)"))
                .header("X-HTTP-Method", "DELETE");
            then.status(409).json_body(json!({
                "error": { "message": { "lang": "en-US", "value": "Save conflict." } }
            }));
        });

        let client = client_for_server(&server);
        client.digest().seed(crate::digest::FormDigest::new("0x1"));
        let err = client.lists().delete("Tasks", 3).await.unwrap_err();
        assert_eq!(err.code, SharePointErrorCode::BackendError);
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.message(), "Save conflict.");
    }

    #[test]
    fn crud_round_trip_against_backend() {
        let backend = InMemoryBackend::new().with_list("Tasks");
        let client = client_for(&backend);
        let lists = client.lists();
        block_on(client.refresh_digest()).unwrap();

        let created = block_on(lists.create(
            "Tasks",
            &EntityPayload::list_item().field("Title", "draft").field("Priority", 2),
        ))
        .unwrap();
        let id = created.id().unwrap();

        block_on(lists.update("Tasks", id, &EntityPayload::list_item().field("Title", "final"))).unwrap();
        let fetched = block_on(lists.read_one("Tasks", id)).unwrap();
        assert_eq!(fetched.title(), Some("final"));
        assert_eq!(fetched.get("Priority"), Some(&json!(2)));

        block_on(lists.delete("Tasks", id)).unwrap();
        assert!(block_on(lists.read("Tasks", None)).unwrap().is_empty());
    }

    #[test]
    fn read_one_of_unknown_id_is_not_found() {
        let backend = InMemoryBackend::new().with_list("Tasks");
        let client = client_for(&backend);
        let err = block_on(client.lists().read_one("Tasks", 404)).unwrap_err();
        assert_eq!(err.code, SharePointErrorCode::NotFound);
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn update_without_digest_is_token_absent() {
        let backend = InMemoryBackend::new().with_list("Tasks");
        let client = client_for(&backend);
        block_on(client.refresh_digest()).unwrap();
        let item = block_on(
            client
                .lists()
                .create("Tasks", &EntityPayload::list_item().field("Title", "x")),
        )
        .unwrap();

        let fresh = client_for(&backend);
        let err = block_on(fresh.lists().update(
            "Tasks",
            item.id().unwrap(),
            &EntityPayload::list_item().field("Title", "y"),
        ))
        .unwrap_err();
        assert_eq!(err.code, SharePointErrorCode::TokenAbsent);
        assert_eq!(block_on(fresh.lists().read_one("Tasks", 1)).unwrap().title(), Some("x"));
    }

    #[test]
    fn expired_digest_is_unauthorized() {
        let backend = InMemoryBackend::new().with_list("Tasks");
        let client = client_for(&backend);
        block_on(client.refresh_digest()).unwrap();
        backend.expire_digests();

        let err = block_on(client.lists().delete("Tasks", 1)).unwrap_err();
        assert_eq!(err.code, SharePointErrorCode::Unauthorized);
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn provisioning_creates_lists_through_the_backend() {
        let backend = InMemoryBackend::new();
        let client = client_for(&backend);
        block_on(client.refresh_digest()).unwrap();

        let list = block_on(client.lists().create_list("Notes", GENERIC_LIST_TEMPLATE, "scratch")).unwrap();
        assert_eq!(list["Title"], json!("Notes"));

        let requests = backend.requests();
        let body = requests.last().unwrap().body.clone().unwrap();
        assert_eq!(body["__metadata"]["type"], json!("SP.List"));
        assert_eq!(body["BaseTemplate"], json!(100));
        assert!(block_on(client.lists().read("Notes", None)).unwrap().is_empty());
    }
}
