use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

/// Filter, projection, ordering and paging options for a collection read.
///
/// Every field is independently optional; an absent field omits its clause.
/// `select`, `orderby` and `expand` are lists joined with `,` on the wire and
/// count as absent when empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuerySpec {
    pub filter: Option<String>,
    pub select: Vec<String>,
    pub orderby: Vec<String>,
    pub expand: Vec<String>,
    pub top: Option<u32>,
    pub skip: Option<u32>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `$filter`. An empty string is still sent as an empty `$filter=`.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn orderby<I, S>(mut self, clauses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.orderby = clauses.into_iter().map(Into::into).collect();
        self
    }

    pub fn expand<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets `$top`. Zero is sent as `$top=0`, so the read returns no rows;
    /// leave it unset to get the server's default page size.
    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    /// Sets `$skip`. Zero is sent as `$skip=0` rather than dropped.
    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses().is_empty()
    }

    /// Present clauses as `(name, value)` pairs, in wire order.
    pub fn clauses(&self) -> Vec<(&'static str, String)> {
        let mut clauses = Vec::new();
        if let Some(filter) = &self.filter {
            clauses.push(("filter", filter.clone()));
        }
        if !self.select.is_empty() {
            clauses.push(("select", self.select.join(",")));
        }
        if !self.orderby.is_empty() {
            clauses.push(("orderby", self.orderby.join(",")));
        }
        if !self.expand.is_empty() {
            clauses.push(("expand", self.expand.join(",")));
        }
        if let Some(top) = self.top {
            clauses.push(("top", top.to_string()));
        }
        if let Some(skip) = self.skip {
            clauses.push(("skip", skip.to_string()));
        }
        clauses
    }
}

/// Appends the clauses of `spec` to `base_url`.
///
/// The first clause is introduced with `?` unless `base_url` already has a
/// query component, every later one with `&`. An empty spec returns
/// `base_url` unchanged.
pub fn build_query(base_url: &str, spec: &QuerySpec) -> String {
    let mut url = base_url.to_string();
    let mut has_query = base_url.contains('?');
    for (name, value) in spec.clauses() {
        url.push(if has_query { '&' } else { '?' });
        has_query = true;
        url.push('$');
        url.push_str(name);
        url.push('=');
        url.push_str(&value);
    }
    url
}

/// Percent-encodes `value` for use as a query option value.
///
/// [`build_query`] inserts values verbatim, so anything user-supplied (filter
/// literals, login names) goes through here first.
pub fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}
