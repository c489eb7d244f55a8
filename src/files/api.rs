use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::client::odata::{into_entity, into_results};
use crate::client::SharePointClient;
use crate::context::{path_literal, segment_literal};
use crate::error::{internal_error, SharePointResult};
use crate::lists::{EntityPayload, EntityType};
use crate::transport::{HttpRequest, HttpVerb};

/// An attachment of a list item.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attachment {
    pub file_name: String,
    pub server_relative_url: String,
}

/// Folder, file and attachment endpoints of the current web.
///
/// Every call is a single request; writes carry the cached digest.
#[derive(Clone, Debug)]
pub struct FileClient {
    client: SharePointClient,
}

impl FileClient {
    pub(crate) fn new(client: SharePointClient) -> Self {
        Self { client }
    }

    /// Creates the folder at `server_relative_url`, e.g.
    /// `/sites/team/Shared Documents/Reports`.
    pub async fn create_folder(&self, server_relative_url: &str) -> SharePointResult<JsonValue> {
        let url = format!("{}/web/folders", self.client.location().api_root());
        let payload =
            EntityPayload::new(EntityType::Folder).field("ServerRelativeUrl", server_relative_url);
        let request = HttpRequest::new(HttpVerb::Post, url).with_json(payload.to_body());
        self.send_for_entity(request).await
    }

    /// Uploads `contents` as `file_name` into `folder`, replacing an existing
    /// file of that name.
    pub async fn upload_file(
        &self,
        folder: &str,
        file_name: &str,
        contents: Vec<u8>,
    ) -> SharePointResult<JsonValue> {
        let url = format!(
            "{}/web/GetFolderByServerRelativeUrl('{}')/files/add(overwrite=true,url='{}')",
            self.client.location().api_root(),
            path_literal(folder),
            segment_literal(file_name)
        );
        let request = HttpRequest::new(HttpVerb::Post, url).with_bytes(contents);
        self.send_for_entity(request).await
    }

    /// Attaches `contents` to item `id` of `list`.
    ///
    /// With `overwrite` the existing attachment's content is replaced (a PUT
    /// on its `$value`); otherwise a new attachment is added and the backend
    /// rejects duplicates.
    pub async fn upload_attachment(
        &self,
        list: &str,
        id: u64,
        file_name: &str,
        contents: Vec<u8>,
        overwrite: bool,
    ) -> SharePointResult<JsonValue> {
        let item_url = self.client.location().list_item_url(list, id);
        let file_name = segment_literal(file_name);
        let request = if overwrite {
            HttpRequest::new(
                HttpVerb::Put,
                format!("{item_url}/AttachmentFiles('{file_name}')/$value"),
            )
        } else {
            HttpRequest::new(
                HttpVerb::Post,
                format!("{item_url}/AttachmentFiles/add(FileName='{file_name}')"),
            )
        };
        self.send_for_entity(request.with_bytes(contents)).await
    }

    pub async fn attachments(&self, list: &str, id: u64) -> SharePointResult<Vec<Attachment>> {
        let url = format!(
            "{}/AttachmentFiles",
            self.client.location().list_item_url(list, id)
        );
        let body = self.client.get_json(url).await?;
        into_results(body)?
            .into_iter()
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|err| internal_error(format!("Malformed attachment entry: {err}")))
            })
            .collect()
    }

    /// Copies a file to `destination`; fails if the destination exists.
    pub async fn copy_file(&self, source: &str, destination: &str) -> SharePointResult<()> {
        let url = format!(
            "{}/web/GetFileByServerRelativeUrl('{}')/copyto(strnewurl='{}',boverwrite=false)",
            self.client.location().api_root(),
            path_literal(source),
            path_literal(destination)
        );
        self.client
            .execute(HttpRequest::new(HttpVerb::Post, url))
            .await?;
        Ok(())
    }

    async fn send_for_entity(&self, request: HttpRequest) -> SharePointResult<JsonValue> {
        let body = self.client.execute(request).await?;
        Ok(body.map(into_entity).unwrap_or(JsonValue::Null))
    }
}
