use serde_json::{json, Value as JsonValue};

use crate::client::odata::{into_entity, unwrap_entity};
use crate::client::SharePointClient;
use crate::context::escape_odata_literal;
use crate::error::{internal_error, unauthenticated, SharePointError, SharePointResult};
use crate::query::encode_value;
use crate::transport::{HttpRequest, HttpVerb};

use super::principal::{PrincipalIdentity, SiteUser};

/// Resolves the calling principal and looks up users and profiles.
///
/// Nothing is cached: every call goes to the backend.
#[derive(Clone, Debug)]
pub struct IdentityResolver {
    client: SharePointClient,
}

impl IdentityResolver {
    pub(crate) fn new(client: SharePointClient) -> Self {
        Self { client }
    }

    /// Reads `LoginName` from the current-user endpoint and normalizes it.
    ///
    /// Any failure, including a response without `LoginName`, is reported as
    /// `Unauthenticated`.
    pub async fn resolve_current_principal(&self) -> SharePointResult<PrincipalIdentity> {
        let url = self.client.location().current_user_url();
        let body = self
            .client
            .get_json(url)
            .await
            .map_err(|err| unauthenticated_from(&err))?;
        let login_name = unwrap_entity(&body)
            .get("LoginName")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| {
                log::warn!("current user response carried no LoginName");
                unauthenticated("Current user response did not include a login name")
            })?;
        Ok(PrincipalIdentity::from_login_name(login_name))
    }

    /// Current user with group membership expanded.
    pub async fn current_user(&self) -> SharePointResult<SiteUser> {
        let url = format!("{}?$expand=Groups", self.client.location().current_user_url());
        let body = self.client.get_json(url).await?;
        SiteUser::from_value(&body)
    }

    /// User profile properties of the caller.
    pub async fn my_profile(&self) -> SharePointResult<JsonValue> {
        let url = format!(
            "{}/SP.UserProfiles.PeopleManager/GetMyProperties",
            self.client.location().api_root()
        );
        Ok(into_entity(self.client.get_json(url).await?))
    }

    /// User profile properties of `login` (a claims or `DOMAIN\user` name).
    pub async fn profile(&self, login: &str) -> SharePointResult<JsonValue> {
        let url = format!(
            "{}/SP.UserProfiles.PeopleManager/GetPropertiesFor(accountName=@v)?@v='{}'",
            self.client.location().api_root(),
            encode_value(&escape_odata_literal(login))
        );
        Ok(into_entity(self.client.get_json(url).await?))
    }

    pub async fn user_info(&self, id: u64) -> SharePointResult<SiteUser> {
        let url = format!("{}/web/getUserById({id})", self.client.location().api_root());
        let body = self.client.get_json(url).await?;
        SiteUser::from_value(&body)
    }

    /// Adds `login` to the site's users if missing. This is a write and
    /// carries the cached digest.
    pub async fn ensure_user(&self, login: &str) -> SharePointResult<SiteUser> {
        let url = format!("{}/web/ensureuser", self.client.location().api_root());
        let request = HttpRequest::new(HttpVerb::Post, url).with_json(json!({ "logonName": login }));
        let body = self
            .client
            .execute(request)
            .await?
            .ok_or_else(|| internal_error("ensureuser returned an empty body"))?;
        SiteUser::from_value(&body)
    }
}

fn unauthenticated_from(err: &SharePointError) -> SharePointError {
    let mapped = unauthenticated(format!("Unable to resolve the current user: {}", err.message()));
    match err.status() {
        Some(status) => mapped.with_status(status),
        None => mapped,
    }
}
