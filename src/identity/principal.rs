use std::fmt::{Display, Formatter};

use serde_json::Value as JsonValue;

use crate::client::odata::{result_titles, unwrap_entity};
use crate::error::{internal_error, SharePointResult};

/// Canonical key of the calling user: the login name lower-cased, with any
/// `DOMAIN\` qualification removed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrincipalIdentity(String);

impl PrincipalIdentity {
    pub fn from_login_name(login_name: &str) -> Self {
        let lowered = login_name.to_lowercase();
        let bare = match lowered.split_once('\\') {
            Some((_, rest)) => rest.to_string(),
            None => lowered,
        };
        Self(bare)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PrincipalIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A member of the site's user information list.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteUser {
    pub id: u64,
    pub login_name: String,
    pub title: String,
    pub email: Option<String>,
    pub is_site_admin: bool,
    /// Titles of the groups the user belongs to; empty unless the response
    /// expanded `Groups`.
    pub groups: Vec<String>,
}

impl SiteUser {
    pub fn from_value(body: &JsonValue) -> SharePointResult<Self> {
        let user = unwrap_entity(body);
        let id = user
            .get("Id")
            .and_then(JsonValue::as_u64)
            .ok_or_else(|| internal_error("User response is missing 'Id'"))?;
        let login_name = user
            .get("LoginName")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| internal_error("User response is missing 'LoginName'"))?
            .to_string();
        let text = |key: &str| user.get(key).and_then(JsonValue::as_str);

        Ok(Self {
            id,
            title: text("Title").unwrap_or(&login_name).to_string(),
            email: text("Email").filter(|email| !email.is_empty()).map(str::to_string),
            is_site_admin: user
                .get("IsSiteAdmin")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
            groups: result_titles(user.get("Groups")),
            login_name,
        })
    }

    pub fn principal(&self) -> PrincipalIdentity {
        PrincipalIdentity::from_login_name(&self.login_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn domain_prefix_is_stripped_and_lower_cased() {
        assert_eq!(PrincipalIdentity::from_login_name("DOMAIN\\Alice").as_str(), "alice");
        assert_eq!(PrincipalIdentity::from_login_name("bob").as_str(), "bob");
        assert_eq!(PrincipalIdentity::from_login_name("bob").to_string(), "bob");
    }

    #[test]
    fn only_the_first_separator_is_consumed() {
        assert_eq!(
            PrincipalIdentity::from_login_name("Corp\\Sub\\Carol").as_str(),
            "sub\\carol"
        );
        assert_eq!(
            PrincipalIdentity::from_login_name("i:0#.f|membership|Dan@Contoso.com").as_str(),
            "i:0#.f|membership|dan@contoso.com"
        );
    }

    #[test]
    fn site_user_reads_verbose_entity_with_groups() {
        let user = SiteUser::from_value(&json!({
            "d": {
                "Id": 9,
                "LoginName": "CONTOSO\\Erin",
                "Title": "Erin",
                "Email": "",
                "IsSiteAdmin": true,
                "Groups": { "results": [{ "Title": "Owners" }, { "Title": "Members" }] }
            }
        }))
        .unwrap();
        assert_eq!(user.id, 9);
        assert_eq!(user.email, None);
        assert!(user.is_site_admin);
        assert_eq!(user.groups, vec!["Owners", "Members"]);
        assert_eq!(user.principal().as_str(), "erin");
    }

    #[test]
    fn site_user_without_login_is_rejected() {
        assert!(SiteUser::from_value(&json!({"d": {"Id": 1}})).is_err());
    }
}
