//! OData query options for list reads.
//!
//! [`build_query`] is a pure function: it appends the present clauses of a
//! [`QuerySpec`] to a resource URL in a fixed order and never escapes values.
//! Callers hand in values that are already safe to place in a query string,
//! typically via [`encode_value`].

mod spec;

pub use spec::{build_query, encode_value, QuerySpec};
