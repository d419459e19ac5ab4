/// Path utilities for validation, normalization and segment decoding
///
/// All functions are **pure**: given same input, always produce same output with no side effects.
use std::borrow::Cow;

/// Validates if a path is in canonical form
///
/// # Rules
///
/// - Must start with `/`
/// - Must not contain `//` or `\`
/// - Must not end with `/` (except root `/`)
///
/// # Examples
///
/// ```
/// use strata_router::path::is_canonical;
///
/// assert!(is_canonical("/"));
/// assert!(is_canonical("/products/42"));
///
/// assert!(!is_canonical(""));
/// assert!(!is_canonical("products"));
/// assert!(!is_canonical("/products/"));
/// assert!(!is_canonical("/products//42"));
/// ```
pub fn is_canonical(path: &str) -> bool {
    if path.is_empty() || !path.starts_with('/') {
        return false;
    }

    if path.contains("//") || path.contains('\\') {
        return false;
    }

    path == "/" || !path.ends_with('/')
}

/// Normalize a path to canonical form
///
/// Returns `Cow::Borrowed` when the input is already canonical.
///
/// - Trailing slashes: `/path/` → `/path`
/// - Double slashes: `/path//to` → `/path/to`
/// - Backslashes: `\path\to` → `/path/to`
///
/// # Examples
///
/// ```
/// use strata_router::path::normalize_path;
/// use std::borrow::Cow;
///
/// assert!(matches!(normalize_path("/about"), Cow::Borrowed("/about")));
/// assert_eq!(normalize_path("/products/"), "/products");
/// assert_eq!(normalize_path("\\users\\123"), "/users/123");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if is_canonical(path) {
        return Cow::Borrowed(path);
    }

    let normalized = path
        .replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if normalized.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(format!("/{}", normalized))
    }
}

/// Returns the permanent-redirect target for a non-canonical request path
///
/// `None` means the path is already canonical and can be matched as-is.
///
/// ```
/// use strata_router::path::canonical_redirect;
///
/// assert_eq!(canonical_redirect("/products/"), Some("/products".to_string()));
/// assert_eq!(canonical_redirect("/"), None);
/// assert_eq!(canonical_redirect("/products"), None);
/// ```
pub fn canonical_redirect(path: &str) -> Option<String> {
    match normalize_path(path) {
        Cow::Borrowed(_) => None,
        Cow::Owned(target) => Some(target),
    }
}

/// Decodes one percent-encoded URL segment
///
/// Malformed encodings (invalid UTF-8 after decoding) fall back to the
/// literal segment text rather than failing the whole match.
///
/// ```
/// use strata_router::path::decode_segment;
///
/// assert_eq!(decode_segment("hello%20world"), "hello world");
/// assert_eq!(decode_segment("%FF"), "%FF");
/// ```
pub fn decode_segment(segment: &str) -> String {
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

/// Splits a canonical path into decoded segments
///
/// The root path yields no segments.
pub fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect()
}
