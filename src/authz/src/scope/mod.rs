/// Scope string syntax
///
/// Builds, splits and compares scopes of the form
/// `<resource>:<attribute>:<value>`, and recognises keyword scopes such as
/// `users:self`.
///
/// # Examples
///
/// ```
/// use scopekit_authz::scope::{matches, scope, ScopeParts};
///
/// let name_scope = scope("datasources", "name", "test:ds4");
/// let parts = ScopeParts::parse(&name_scope).unwrap();
/// assert_eq!(parts.value, "test:ds4");
///
/// assert!(matches("datasources:id:*", "datasources:id:4"));
/// ```

mod types;


pub use types::{
    is_keyword, matches, parse_keyword, scope, scope_prefix, Keyword, ScopeParts, ID_ATTRIBUTE, SEPARATOR,
    WILDCARD,
};
