use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::SharePointClient;
use crate::context::escape_odata_literal;
use crate::error::{internal_error, invalid_argument, SharePointResult};
use crate::identity::PrincipalIdentity;
use crate::lists::{EntityPayload, ListClient, ListItem};
use crate::query::{encode_value, QuerySpec};

use super::record::{DocumentRecord, JsonDocument, JSON_FIELD, TITLE_FIELD};

/// Per-principal JSON documents kept in a list with `Title` and `JSON`
/// columns, one row per principal.
///
/// `set` refreshes the digest, resolves the principal, looks the row up by
/// `Title` and then updates or creates it. Calls through one client (and its
/// clones) are serialized, so they never race each other. Writers on
/// independent clients can still both observe a missing row and each create
/// one; lists have no conditional create to prevent that.
#[derive(Clone, Debug)]
pub struct JsonDocumentStore {
    client: SharePointClient,
}

impl JsonDocumentStore {
    pub(crate) fn new(client: SharePointClient) -> Self {
        Self { client }
    }

    /// Reads the caller's document from `collection`. `None` when the
    /// principal has no row yet. No digest is needed.
    pub async fn get(&self, collection: &str) -> SharePointResult<Option<JsonDocument>> {
        let principal = self.client.identity().resolve_current_principal().await?;
        match self.lookup(collection, &principal).await? {
            Some(record) => JsonDocument::try_from(record).map(Some),
            None => Ok(None),
        }
    }

    /// [`get`](Self::get) decoded into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, collection: &str) -> SharePointResult<Option<T>> {
        match self.get(collection).await? {
            Some(document) => document.deserialize().map(Some),
            None => Ok(None),
        }
    }

    /// Stores `value` as the caller's document in `collection`, replacing any
    /// previous one.
    ///
    /// A failed digest refresh is returned as is; nothing is retried.
    pub async fn set<T>(&self, collection: &str, value: &T) -> SharePointResult<DocumentRecord>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_string(value)
            .map_err(|err| invalid_argument(format!("Document is not serializable: {err}")))?;

        let _writes = self.client.lock_document_writes().await;
        self.client.refresh_digest().await?;
        let principal = self.client.identity().resolve_current_principal().await?;
        let lists = self.client.lists();

        match self.lookup(collection, &principal).await? {
            Some(existing) => {
                log::debug!("updating document row {} for {principal} in {collection}", existing.id);
                let payload = EntityPayload::list_item().field(JSON_FIELD, json.clone());
                lists.update(collection, existing.id, &payload).await?;
                Ok(DocumentRecord {
                    id: existing.id,
                    principal,
                    json,
                })
            }
            None => {
                log::debug!("creating document row for {principal} in {collection}");
                let payload = EntityPayload::list_item()
                    .field(TITLE_FIELD, principal.as_str())
                    .field(JSON_FIELD, json.clone());
                let created = lists.create(collection, &payload).await?;
                let id = created
                    .id()
                    .ok_or_else(|| internal_error("Created document row has no identifier"))?;
                Ok(DocumentRecord { id, principal, json })
            }
        }
    }

    async fn lookup(
        &self,
        collection: &str,
        principal: &PrincipalIdentity,
    ) -> SharePointResult<Option<DocumentRecord>> {
        let rows = lookup_rows(&self.client.lists(), collection, principal).await?;
        rows.first()
            .map(|row| DocumentRecord::from_item(row, principal))
            .transpose()
    }
}

async fn lookup_rows(
    lists: &ListClient,
    collection: &str,
    principal: &PrincipalIdentity,
) -> SharePointResult<Vec<ListItem>> {
    let spec = lookup_spec(principal);
    lists.read(collection, Some(&spec)).await.map_err(|err| {
        log::warn!("document lookup in {collection} failed: {err}");
        err
    })
}

fn lookup_spec(principal: &PrincipalIdentity) -> QuerySpec {
    let filter = format!(
        "{TITLE_FIELD} eq '{}'",
        escape_odata_literal(principal.as_str())
    );
    QuerySpec::new()
        .select([JSON_FIELD, "Id", TITLE_FIELD])
        .filter(encode_value(&filter))
        .top(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SharePointErrorCode;
    use crate::query::build_query;
    use crate::test_support::client_for;
    use crate::transport::{HttpVerb, InMemoryBackend};
    use futures::executor::block_on;
    use serde::Deserialize;
    use serde_json::json;

    const SETTINGS: &str = "JSON-Settings";

    fn backend() -> InMemoryBackend {
        InMemoryBackend::new()
            .with_login_name("CONTOSO\\Alice")
            .with_list(SETTINGS)
    }

    #[test]
    fn lookup_query_selects_payload_of_single_row() {
        let spec = lookup_spec(&PrincipalIdentity::from_login_name("o'brien"));
        assert_eq!(
            build_query("items", &spec),
            "items?$filter=Title%20eq%20%27o%27%27brien%27&$select=JSON,Id,Title&$top=1"
        );
    }

    #[test]
    fn get_without_row_is_absent() {
        let backend = backend();
        let client = client_for(&backend);
        assert_eq!(block_on(client.documents().get(SETTINGS)).unwrap(), None);
        assert_eq!(backend.issued_digest_count(), 0);
    }

    #[test]
    fn set_then_get_round_trips() {
        let backend = backend();
        let documents = client_for(&backend).documents();
        let value = json!({"theme": "dark", "pinned": [1, 2, 3]});

        let record = block_on(documents.set(SETTINGS, &value)).unwrap();
        assert_eq!(record.principal.as_str(), "alice");

        let document = block_on(documents.get(SETTINGS)).unwrap().unwrap();
        assert_eq!(document.value, value);
        assert_eq!(document.id, record.id);
    }

    #[test]
    fn second_set_updates_in_place() {
        let backend = backend();
        let documents = client_for(&backend).documents();

        let first = block_on(documents.set(SETTINGS, &json!({"v": 1}))).unwrap();
        let second = block_on(documents.set(SETTINGS, &json!({"v": 2}))).unwrap();
        assert_eq!(first.id, second.id);

        let rows = backend.items(SETTINGS);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Title"], json!("alice"));
        assert_eq!(rows[0]["JSON"], json!("{\"v\":2}"));

        let merges = backend
            .requests()
            .into_iter()
            .filter(|request| request.verb == HttpVerb::Merge)
            .count();
        assert_eq!(merges, 1);
    }

    #[test]
    fn every_set_refreshes_before_writing() {
        let backend = backend();
        let documents = client_for(&backend).documents();
        block_on(documents.set(SETTINGS, &json!(1))).unwrap();
        block_on(documents.set(SETTINGS, &json!(2))).unwrap();
        assert_eq!(backend.issued_digest_count(), 2);

        let verbs: Vec<HttpVerb> = backend.requests().iter().map(|request| request.verb).collect();
        assert_eq!(
            verbs,
            vec![
                HttpVerb::Post,
                HttpVerb::Get,
                HttpVerb::Get,
                HttpVerb::Post,
                HttpVerb::Post,
                HttpVerb::Get,
                HttpVerb::Get,
                HttpVerb::Merge,
            ]
        );
    }

    #[test]
    fn failed_refresh_is_surfaced_without_writing() {
        let backend = backend();
        backend.fail_next_context_info(1);
        let documents = client_for(&backend).documents();

        let err = block_on(documents.set(SETTINGS, &json!({"v": 1}))).unwrap_err();
        assert_eq!(err.code, SharePointErrorCode::BackendError);
        assert_eq!(err.status(), Some(500));
        assert!(backend.items(SETTINGS).is_empty());

        block_on(documents.set(SETTINGS, &json!({"v": 1}))).unwrap();
        assert_eq!(backend.items(SETTINGS).len(), 1);
    }

    #[test]
    fn unresolvable_principal_fails_set() {
        let backend = InMemoryBackend::new().with_list(SETTINGS);
        let documents = client_for(&backend).documents();
        let err = block_on(documents.set(SETTINGS, &json!({}))).unwrap_err();
        assert_eq!(err.code, SharePointErrorCode::Unauthenticated);
        assert!(backend.items(SETTINGS).is_empty());
    }

    #[test]
    fn malformed_stored_payload_is_internal() {
        let backend = backend();
        let client = client_for(&backend);
        block_on(client.refresh_digest()).unwrap();
        block_on(client.lists().create(
            SETTINGS,
            &EntityPayload::list_item()
                .field("Title", "alice")
                .field("JSON", "{broken"),
        ))
        .unwrap();

        let err = block_on(client.documents().get(SETTINGS)).unwrap_err();
        assert_eq!(err.code, SharePointErrorCode::Internal);
    }

    #[test]
    fn documents_are_scoped_per_principal() {
        let backend = backend();
        let documents = client_for(&backend).documents();
        block_on(documents.set(SETTINGS, &json!("alice's"))).unwrap();

        backend.set_login_name(Some("CONTOSO\\Bob".into()));
        assert_eq!(block_on(documents.get(SETTINGS)).unwrap(), None);
        block_on(documents.set(SETTINGS, &json!("bob's"))).unwrap();

        assert_eq!(backend.items(SETTINGS).len(), 2);
        let bob = block_on(documents.get(SETTINGS)).unwrap().unwrap();
        assert_eq!(bob.value, json!("bob's"));
    }

    #[test]
    fn typed_documents_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Preferences {
            theme: String,
            page_size: u32,
        }

        let backend = backend();
        let documents = client_for(&backend).documents();
        let preferences = Preferences {
            theme: "light".into(),
            page_size: 50,
        };
        block_on(documents.set(SETTINGS, &preferences)).unwrap();
        let read: Option<Preferences> = block_on(documents.get_as(SETTINGS)).unwrap();
        assert_eq!(read, Some(preferences));
    }

    #[test]
    fn concurrent_sets_on_one_client_leave_one_row() {
        let backend = backend();
        let client = client_for(&backend);
        let (first, second) = (client.documents(), client.clone().documents());

        let (va, vb) = (json!({"writer": "a"}), json!({"writer": "b"}));

        let (a, b) = block_on(async { futures::join!(first.set(SETTINGS, &va), second.set(SETTINGS, &vb)) });
        assert_eq!(a.unwrap().id, b.unwrap().id);

        let rows = backend.items(SETTINGS);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["JSON"], json!("{\"writer\":\"b\"}"));
    }
}
