//! Scope string syntax and matching
//!
//! A scope is `<resource>:<attribute>:<value>`. The value is everything after
//! the second colon and is never split further, so names containing colons
//! survive intact.

/// Separator between scope tokens
pub const SEPARATOR: char = ':';

/// Wildcard suffix
pub const WILDCARD: char = '*';

/// Attribute used by canonical, id-based scopes
pub const ID_ATTRIBUTE: &str = "id";

/// Builds a scope from its three tokens
///
/// The value is not escaped.
///
/// # Examples
///
/// ```
/// use scopekit_authz::scope::scope;
///
/// assert_eq!(scope("datasources", "name", "test:ds4"), "datasources:name:test:ds4");
/// ```
pub fn scope(resource: &str, attribute: &str, value: &str) -> String {
    let mut out = String::with_capacity(resource.len() + attribute.len() + value.len() + 2);
    out.push_str(resource);
    out.push(SEPARATOR);
    out.push_str(attribute);
    out.push(SEPARATOR);
    out.push_str(value);
    out
}

/// Returns the `<resource>:<attribute>:` prefix of a scope
///
/// Scopes with fewer than three tokens return everything up to and including
/// their last colon (or the empty string when there is none).
pub fn scope_prefix(scope: &str) -> &str {
    match ScopeParts::parse(scope) {
        Some(parts) => &scope[..parts.resource.len() + parts.attribute.len() + 2],
        None => match scope.rfind(SEPARATOR) {
            Some(idx) => &scope[..=idx],
            None => "",
        },
    }
}

/// The three tokens of an attribute scope, borrowed from the scope string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeParts<'a> {
    /// Resource kind (e.g., "datasources")
    pub resource: &'a str,
    /// Identifying attribute (e.g., "name", "id")
    pub attribute: &'a str,
    /// Attribute value; may contain colons
    pub value: &'a str,
}

impl<'a> ScopeParts<'a> {
    /// Splits a scope into resource, attribute and value
    ///
    /// Returns `None` for scopes with fewer than three tokens.
    pub fn parse(scope: &'a str) -> Option<Self> {
        let mut tokens = scope.splitn(3, SEPARATOR);
        let resource = tokens.next()?;
        let attribute = tokens.next()?;
        let value = tokens.next()?;

        Some(Self {
            resource,
            attribute,
            value,
        })
    }

    /// Whether the value ends with the wildcard suffix
    pub fn is_wildcard(&self) -> bool {
        self.value.ends_with(WILDCARD)
    }
}

/// Checks whether a granted scope covers a required scope
///
/// A granted scope covers a required one if both are equal, or if the
/// granted scope ends in `*` right after a colon (`datasources:*`,
/// `datasources:id:*`), has no other wildcard, and the required scope starts
/// with everything before the `*`. The bare `*` covers every scope.
///
/// # Examples
///
/// ```
/// use scopekit_authz::scope::matches;
///
/// assert!(matches("datasources:id:1", "datasources:id:1"));
/// assert!(matches("datasources:*", "datasources:id:1"));
/// assert!(!matches("datasources:id:1*", "datasources:id:12"));
/// ```
pub fn matches(granted: &str, required: &str) -> bool {
    if granted == required {
        return true;
    }

    match granted.strip_suffix(WILDCARD) {
        Some(prefix) if is_wildcard_prefix(prefix) => required.starts_with(prefix),
        _ => false,
    }
}

fn is_wildcard_prefix(prefix: &str) -> bool {
    (prefix.is_empty() || prefix.ends_with(SEPARATOR)) && !prefix.contains(WILDCARD)
}

/// Reserved keywords substituted per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    /// `self`: the signed-in user
    SignedInUser,
    /// `current`: the organization the user acts in
    CurrentOrg,
}

impl Keyword {
    /// The keyword token as it appears in scopes
    pub fn token(&self) -> &'static str {
        match self {
            Self::SignedInUser => "self",
            Self::CurrentOrg => "current",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "self" => Some(Self::SignedInUser),
            "current" => Some(Self::CurrentOrg),
            _ => None,
        }
    }
}

/// Detects a keyword scope of the form `<resource>:<keyword>`
///
/// Returns the resource (possibly empty) and the keyword. Scopes with more
/// tokens, such as `datasources:name:self`, are ordinary attribute scopes.
pub fn parse_keyword(scope: &str) -> Option<(&str, Keyword)> {
    let (resource, token) = scope.split_once(SEPARATOR)?;
    if token.contains(SEPARATOR) {
        return None;
    }
    Keyword::from_token(token).map(|keyword| (resource, keyword))
}

/// Whether `scope` is a keyword scope such as `users:self`
pub fn is_keyword(scope: &str) -> bool {
    parse_keyword(scope).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_builder() {
        assert_eq!(scope("datasources", "id", "1"), "datasources:id:1");
        assert_eq!(scope("datasources", "name", ""), "datasources:name:");
    }

    #[test]
    fn test_parts_keep_colons_in_value() {
        let parts = ScopeParts::parse("datasources:name:test:ds4").unwrap();
        assert_eq!(parts.resource, "datasources");
        assert_eq!(parts.attribute, "name");
        assert_eq!(parts.value, "test:ds4");
        assert!(!parts.is_wildcard());
    }

    #[test]
    fn test_parts_require_three_tokens() {
        assert!(ScopeParts::parse("users:self").is_none());
        assert!(ScopeParts::parse("users").is_none());
        assert_eq!(ScopeParts::parse("users:id:").unwrap().value, "");
    }

    #[test]
    fn test_scope_prefix() {
        assert_eq!(scope_prefix("datasources:name:test:ds4"), "datasources:name:");
        assert_eq!(scope_prefix("datasources:*"), "datasources:");
        assert_eq!(scope_prefix("*"), "");
    }

    #[test]
    fn test_parse_keyword() {
        assert_eq!(parse_keyword("users:self"), Some(("users", Keyword::SignedInUser)));
        assert_eq!(parse_keyword("orgs:current"), Some(("orgs", Keyword::CurrentOrg)));
        assert_eq!(parse_keyword(":self"), Some(("", Keyword::SignedInUser)));
        assert_eq!(parse_keyword("datasources:name:self"), None);
        assert_eq!(parse_keyword("users:id:2"), None);
        assert_eq!(parse_keyword("self"), None);
    }

    #[test]
    fn test_is_keyword() {
        assert!(is_keyword("users:self"));
        assert!(is_keyword("orgs:current"));
        assert!(!is_keyword("users:id:self"));
        assert!(!is_keyword("users:*"));
    }
}
