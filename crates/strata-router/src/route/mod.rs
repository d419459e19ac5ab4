/// Declarative route definitions
///
/// A `RouteDef` describes one level of the route hierarchy: the root shell,
/// a layout (possibly a pure organizational group) or a page. Definitions are
/// built with consuming builder methods and handed to `RouterBuilder`.
pub mod pattern;

use crate::chain::{Params, RefetchArgs};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use pattern::{classify_segment, parse_template, render_template, TemplateSegment};

/// Level id of the root shell; every other level id extends it
pub const ROOT_LEVEL_ID: &str = "_root_";

/// Client-side predicate forcing a level to refetch
pub type ShouldRefetch = Arc<dyn Fn(&RefetchArgs<'_>) -> bool + Send + Sync>;

/// What a route definition contributes to a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    /// The application shell, always the first chain entry
    Root,
    /// A nested layout or organizational group
    Layout,
    /// The leaf page
    Page,
}

/// One route level definition with its attached handler
pub struct RouteDef<H> {
    /// Canonical declarative template, e.g. `/(shop)/products/[id]`
    pub template: String,
    /// Parsed template segments
    pub segments: Vec<TemplateSegment>,
    /// Root, layout or page
    pub kind: RouteKind,
    /// Handler invoked for this level (component, preloader, loader...)
    pub handler: Arc<H>,
    /// Freshness window on the client, `None` uses the client default
    pub stale_time: Option<Duration>,
    /// Optional client-side refetch predicate
    pub should_refetch: Option<ShouldRefetch>,
    /// Whether this level gates the whole chain on authentication
    pub requires_auth: bool,
    /// Set on pages sharing a layout's template
    page_marker: bool,
    template_error: Option<crate::TreeConfigurationError>,
}

impl<H> RouteDef<H> {
    fn with_kind(template: &str, kind: RouteKind, handler: H) -> Self {
        let (segments, template_error) = match parse_template(template) {
            Ok(segments) => (segments, None),
            Err(err) => (Vec::new(), Some(err)),
        };

        Self {
            template: render_template(&segments),
            segments,
            kind,
            handler: Arc::new(handler),
            stale_time: None,
            should_refetch: None,
            requires_auth: false,
            page_marker: false,
            template_error,
        }
    }

    /// The root shell (template `/`)
    pub fn root(handler: H) -> Self {
        Self::with_kind("/", RouteKind::Root, handler)
    }

    /// A layout wrapping every page whose template starts with `template`
    ///
    /// ```
    /// use strata_router::RouteDef;
    ///
    /// let layout = RouteDef::layout("/(shop)", ());
    /// assert_eq!(layout.level_id(), "_root_/(shop)");
    /// ```
    pub fn layout(template: &str, handler: H) -> Self {
        Self::with_kind(template, RouteKind::Layout, handler)
    }

    /// A leaf page
    ///
    /// ```
    /// use strata_router::RouteDef;
    ///
    /// let page = RouteDef::page("/products/[id]", ());
    /// assert_eq!(page.level_id(), "_root_/products/[id]");
    /// ```
    pub fn page(template: &str, handler: H) -> Self {
        Self::with_kind(template, RouteKind::Page, handler)
    }

    /// Creates a route definition from a file system path
    ///
    /// - `pages/_layout.rsx` → root shell
    /// - `pages/(shop)/_layout.rsx` → layout `/(shop)`
    /// - `pages/products/[id]/page.rsx` → page `/products/[id]`
    /// - `pages/about.rsx` → page `/about`
    ///
    /// ```
    /// use strata_router::{RouteDef, RouteKind};
    ///
    /// let route = RouteDef::from_path("pages/docs/[[...slug]].rsx", "pages", ());
    /// assert_eq!(route.template, "/docs/[[...slug]]");
    /// assert_eq!(route.kind, RouteKind::Page);
    /// ```
    pub fn from_path(file_path: &str, pages_dir: &str, handler: H) -> Self {
        let relative = file_path
            .strip_prefix(pages_dir)
            .unwrap_or(file_path)
            .trim_start_matches('/');

        let without_ext = match relative.rsplit_once('.') {
            Some((stem, ext)) if !ext.contains('/') && !ext.contains(']') => stem,
            _ => relative,
        };

        let (dir, filename) = match without_ext.rsplit_once('/') {
            Some((dir, filename)) => (dir, filename),
            None => ("", without_ext),
        };

        match filename {
            "_layout" if dir.is_empty() => Self::root(handler),
            "_layout" => Self::layout(&format!("/{}", dir), handler),
            "page" | "index" => Self::page(&format!("/{}", dir), handler),
            _ => Self::page(&format!("/{}", without_ext), handler),
        }
    }

    /// Sets how long this level's data stays fresh on the client
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    /// Sets a predicate that forces a refetch whenever it returns true
    pub fn with_should_refetch<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RefetchArgs<'_>) -> bool + Send + Sync + 'static,
    {
        self.should_refetch = Some(Arc::new(predicate));
        self
    }

    /// Marks this level as requiring authentication
    pub fn requiring_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Stable level id derived from the template, never from a concrete URL
    ///
    /// A page whose template is also a layout's (the index page shares the
    /// root template) gets a trailing `/` to stay distinct from that layout.
    pub fn level_id(&self) -> String {
        match (self.kind, self.template.as_str()) {
            (RouteKind::Page, "/") => format!("{}/", ROOT_LEVEL_ID),
            (RouteKind::Page, template) if self.page_marker => format!("{}/", level_id_for(template)),
            _ => level_id_for(&self.template),
        }
    }

    /// Whether both definitions declare the same template
    pub fn same_template(&self, other: &RouteDef<H>) -> bool {
        self.segments.len() == other.segments.len() && self.wraps(other)
    }

    pub(crate) fn mark_as_nested_page(&mut self) {
        self.page_marker = true;
    }

    /// Parameter names declared by this template, in order
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(TemplateSegment::param_name)
    }

    /// Whether `self` wraps `other` (segment prefix, groups included)
    pub fn wraps(&self, other: &RouteDef<H>) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| match (a, b) {
                (TemplateSegment::Static(x), TemplateSegment::Static(y)) => {
                    x.eq_ignore_ascii_case(y)
                }
                _ => a == b,
            })
    }

    /// Picks the params this level declares out of the full match params
    pub(crate) fn own_params(&self, all: &Params) -> Params {
        self.param_names()
            .filter_map(|name| all.get(name).map(|value| (name.to_string(), value.clone())))
            .collect()
    }

    pub(crate) fn take_template_error(&mut self) -> Option<crate::TreeConfigurationError> {
        self.template_error.take()
    }
}

/// Level id for a canonical template
///
/// ```
/// use strata_router::route::level_id_for;
///
/// assert_eq!(level_id_for("/"), "_root_");
/// assert_eq!(level_id_for("/products/[id]"), "_root_/products/[id]");
/// ```
pub fn level_id_for(template: &str) -> String {
    if template == "/" || template.is_empty() {
        ROOT_LEVEL_ID.to_string()
    } else {
        format!("{}{}", ROOT_LEVEL_ID, template)
    }
}

impl<H> fmt::Debug for RouteDef<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDef")
            .field("template", &self.template)
            .field("kind", &self.kind)
            .field("stale_time", &self.stale_time)
            .field("should_refetch", &self.should_refetch.is_some())
            .field("requires_auth", &self.requires_auth)
            .finish()
    }
}
