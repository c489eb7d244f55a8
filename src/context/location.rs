use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::error::{invalid_argument, SharePointResult};

/// REST resource URLs derived from the absolute URL of a SharePoint web.
///
/// Immutable once derived; a client replaces it wholesale when the context
/// is re-resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceLocation {
    web_url: String,
}

impl ResourceLocation {
    pub fn new(web_url: &str) -> SharePointResult<Self> {
        let trimmed = web_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|err| {
            invalid_argument(format!("Invalid SharePoint web URL '{web_url}': {err}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid_argument(format!(
                "SharePoint web URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        Ok(Self {
            web_url: trimmed.to_string(),
        })
    }

    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    pub fn api_root(&self) -> String {
        format!("{}/_api", self.web_url)
    }

    pub fn context_info_url(&self) -> String {
        format!("{}/contextinfo", self.api_root())
    }

    pub fn current_user_url(&self) -> String {
        format!("{}/web/currentuser", self.api_root())
    }

    pub fn lists_url(&self) -> String {
        format!("{}/web/lists", self.api_root())
    }

    pub fn list_url(&self, list: &str) -> String {
        format!(
            "{}/web/lists/GetByTitle('{}')",
            self.api_root(),
            segment_literal(list)
        )
    }

    /// Collection resource holding the rows of `list`.
    pub fn list_items_url(&self, list: &str) -> String {
        format!("{}/items", self.list_url(list))
    }

    pub fn list_item_url(&self, list: &str, id: u64) -> String {
        format!("{}({id})", self.list_items_url(list))
    }

    pub fn list_fields_url(&self, list: &str) -> String {
        format!("{}/fields", self.list_url(list))
    }
}

/// Doubles single quotes so `value` can sit inside an OData string literal.
pub fn escape_odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Characters that would end or corrupt a URL path if left raw.
const PATH_LITERAL: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const SEGMENT_LITERAL: &AsciiSet = &PATH_LITERAL.add(b'/');

/// Quotes `value` as an OData literal for use inside a URL path, keeping `/`
/// so server relative URLs stay readable.
pub fn path_literal(value: &str) -> String {
    utf8_percent_encode(&escape_odata_literal(value), PATH_LITERAL).to_string()
}

/// Like [`path_literal`] but also encodes `/`, for titles and file names.
pub fn segment_literal(value: &str) -> String {
    utf8_percent_encode(&escape_odata_literal(value), SEGMENT_LITERAL).to_string()
}
