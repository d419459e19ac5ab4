/// Template parsing for route definitions
///
/// Pure functional parsing of declarative route templates into typed segments.
use crate::TreeConfigurationError;

/// One segment of a declarative route template
///
/// # Examples
///
/// ```
/// use strata_router::route::pattern::{classify_segment, TemplateSegment};
///
/// assert!(matches!(classify_segment("products"), TemplateSegment::Static(_)));
/// assert!(matches!(classify_segment("[id]"), TemplateSegment::Dynamic(_)));
/// assert!(matches!(classify_segment("[...slug]"), TemplateSegment::CatchAll(_)));
/// assert!(matches!(classify_segment("[[...slug]]"), TemplateSegment::OptionalCatchAll(_)));
/// assert!(matches!(classify_segment("(shop)"), TemplateSegment::Group(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    /// Literal text, matched case-insensitively
    Static(String),
    /// Organizational group: `(name)`, consumes no URL segment
    Group(String),
    /// Single dynamic segment: `[id]`
    Dynamic(String),
    /// One or more remaining segments: `[...slug]`
    CatchAll(String),
    /// Zero or more remaining segments: `[[...slug]]`
    OptionalCatchAll(String),
}

impl TemplateSegment {
    /// Whether this segment consumes part of the URL
    pub fn consumes_url(&self) -> bool {
        !matches!(self, TemplateSegment::Group(_))
    }

    /// The parameter name this segment captures, if any
    pub fn param_name(&self) -> Option<&str> {
        match self {
            TemplateSegment::Dynamic(name)
            | TemplateSegment::CatchAll(name)
            | TemplateSegment::OptionalCatchAll(name) => Some(name),
            TemplateSegment::Static(_) | TemplateSegment::Group(_) => None,
        }
    }
}

/// Classifies a template segment (pure function)
///
/// # Parsing Rules (evaluated in order)
///
/// 1. **Optional catch-all**: `[[...name]]`
/// 2. **Catch-all**: `[...name]`
/// 3. **Dynamic**: `[name]`
/// 4. **Group**: `(name)`
/// 5. **Static**: any other text
pub fn classify_segment(segment: &str) -> TemplateSegment {
    if let Some(name) = segment
        .strip_prefix("[[...")
        .and_then(|s| s.strip_suffix("]]"))
    {
        return TemplateSegment::OptionalCatchAll(name.to_string());
    }

    if let Some(inner) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return match inner.strip_prefix("...") {
            Some(name) => TemplateSegment::CatchAll(name.to_string()),
            None => TemplateSegment::Dynamic(inner.to_string()),
        };
    }

    if let Some(name) = segment.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        return TemplateSegment::Group(name.to_string());
    }

    TemplateSegment::Static(segment.to_string())
}

/// Parses a whole template such as `/(shop)/products/[id]`
///
/// The root template `/` parses to an empty list. Parameter names must be
/// non-empty, and catch-all segments must be the last URL-consuming segment.
pub fn parse_template(template: &str) -> Result<Vec<TemplateSegment>, TreeConfigurationError> {
    let segments: Vec<TemplateSegment> = template
        .split('/')
        .filter(|s| !s.is_empty())
        .map(classify_segment)
        .collect();

    let invalid = |reason: &str| TreeConfigurationError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    };

    if segments
        .iter()
        .any(|seg| matches!(seg.param_name(), Some(name) if name.is_empty()))
    {
        return Err(invalid("empty parameter name"));
    }

    let catch_all_at = segments.iter().position(|seg| {
        matches!(
            seg,
            TemplateSegment::CatchAll(_) | TemplateSegment::OptionalCatchAll(_)
        )
    });

    if let Some(idx) = catch_all_at {
        if segments[idx + 1..].iter().any(TemplateSegment::consumes_url) {
            return Err(TreeConfigurationError::CatchAllNotTerminal {
                template: template.to_string(),
            });
        }
    }

    Ok(segments)
}

/// Renders parsed segments back to a canonical template string
pub fn render_template(segments: &[TemplateSegment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }

    segments
        .iter()
        .map(|seg| match seg {
            TemplateSegment::Static(text) => format!("/{}", text),
            TemplateSegment::Group(name) => format!("/({})", name),
            TemplateSegment::Dynamic(name) => format!("/[{}]", name),
            TemplateSegment::CatchAll(name) => format!("/[...{}]", name),
            TemplateSegment::OptionalCatchAll(name) => format!("/[[...{}]]", name),
        })
        .collect()
}
