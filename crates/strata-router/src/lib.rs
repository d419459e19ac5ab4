//! # Strata Router
//!
//! Route matching for Strata applications:
//! - Static segments (`/about`), matched case-insensitively
//! - Dynamic segments (`/products/[id]`)
//! - Catch-all segments (`/docs/[...slug]`, one or more)
//! - Optional catch-all segments (`/wiki/[[...path]]`, zero or more)
//! - Organizational groups (`/(shop)`) that consume no URL segment
//! - Nested layouts resolved into a root-to-leaf match chain
//!
//! ## Precedence
//!
//! At every node the matcher tries static, then dynamic, then catch-all,
//! then optional catch-all. The order never depends on the order routes
//! were registered.
//!
//! ## Example
//!
//! ```
//! use strata_router::{Resolution, RouteDef, Router};
//!
//! let router = Router::builder()
//!     .with_route(RouteDef::root("shell"))
//!     .with_route(RouteDef::page("/products/[id]", "product"))
//!     .build()
//!     .unwrap();
//!
//! let chain = router.match_path("/products/42").unwrap();
//! assert_eq!(chain.level_ids(), vec!["_root_", "_root_/products/[id]"]);
//!
//! assert!(matches!(
//!     router.resolve("/products/42/"),
//!     Resolution::Redirect { status: 301, .. }
//! ));
//! ```

pub mod chain;
mod error;
pub mod path;
pub mod route;
mod tree;

use std::sync::Arc;

pub use chain::{MatchChain, MatchedLevel, ParamValue, Params, RefetchArgs, RouteMatch};
pub use error::TreeConfigurationError;
pub use path::{canonical_redirect, normalize_path};
pub use route::{level_id_for, RouteDef, RouteKind, ShouldRefetch, ROOT_LEVEL_ID};

use tree::{Leaf, RouteNode};

/// Outcome of resolving a request pathname
#[derive(Debug)]
pub enum Resolution<H> {
    /// The path matched a page
    Matched(MatchChain<H>),
    /// The path was not canonical; redirect to its canonical form
    Redirect { location: String, status: u16 },
    /// No route matched; the caller produces the not-found response
    NotFound,
}

/// Collects route definitions and builds an immutable `Router`
pub struct RouterBuilder<H> {
    routes: Vec<RouteDef<H>>,
}

impl<H> Default for RouterBuilder<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H> RouterBuilder<H> {
    /// Adds a route definition
    pub fn with_route(mut self, route: RouteDef<H>) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds multiple route definitions at once
    pub fn with_routes<I>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = RouteDef<H>>,
    {
        self.routes.extend(routes);
        self
    }

    /// Builds the route tree
    ///
    /// Every page is stored with its full level list: the root, every
    /// layout whose template is a segment-prefix of the page template
    /// (shallowest first), then the page itself.
    pub fn build(self) -> Result<Router<H>, TreeConfigurationError> {
        let mut root: Option<Arc<RouteDef<H>>> = None;
        let mut layouts: Vec<Arc<RouteDef<H>>> = Vec::new();
        let mut pages: Vec<RouteDef<H>> = Vec::new();

        for mut route in self.routes {
            if let Some(err) = route.take_template_error() {
                return Err(err);
            }

            match route.kind {
                RouteKind::Root => {
                    if let Some(existing) = &root {
                        return Err(TreeConfigurationError::DuplicateRoute {
                            template: route.template.clone(),
                            existing: existing.template.clone(),
                        });
                    }
                    root = Some(Arc::new(route));
                }
                RouteKind::Layout if route.segments.is_empty() => {
                    return Err(TreeConfigurationError::DuplicateRoute {
                        template: route.template.clone(),
                        existing: "root shell".to_string(),
                    });
                }
                RouteKind::Layout => {
                    if let Some(existing) = layouts
                        .iter()
                        .find(|layout| layout.template.eq_ignore_ascii_case(&route.template))
                    {
                        return Err(TreeConfigurationError::DuplicateRoute {
                            template: route.template.clone(),
                            existing: existing.template.clone(),
                        });
                    }
                    layouts.push(Arc::new(route));
                }
                RouteKind::Page => pages.push(route),
            }
        }

        let root = root.ok_or(TreeConfigurationError::MissingRoot)?;
        layouts.sort_by_key(|layout| layout.segments.len());

        let mut tree = RouteNode::new();
        let mut templates = Vec::with_capacity(pages.len());

        for mut page in pages {
            if layouts.iter().any(|layout| layout.same_template(&page)) {
                page.mark_as_nested_page();
            }
            let page = Arc::new(page);

            let mut levels = Vec::with_capacity(layouts.len() + 2);
            levels.push(Arc::clone(&root));
            levels.extend(
                layouts
                    .iter()
                    .filter(|layout| layout.wraps(&page))
                    .cloned(),
            );
            levels.push(Arc::clone(&page));

            tracing::debug!(template = %page.template, depth = levels.len(), "registering route");
            templates.push(page.template.clone());
            tree.insert(Leaf { levels })?;
        }

        Ok(Router { tree, templates })
    }
}

/// Immutable route tree built once at startup
pub struct Router<H> {
    tree: RouteNode<H>,
    templates: Vec<String>,
}

impl<H> Router<H> {
    /// Starts a new builder
    pub fn builder() -> RouterBuilder<H> {
        RouterBuilder::default()
    }

    /// Matches a canonical pathname to its chain
    ///
    /// Pure: repeated calls with the same path return equal chains.
    pub fn match_path(&self, pathname: &str) -> Option<MatchChain<H>> {
        let segments = path::split_segments(pathname);
        let (leaf, params) = self.tree.find(&segments)?;

        let levels = leaf
            .levels
            .iter()
            .map(|def| MatchedLevel {
                route: RouteMatch::from_def(def, &params),
                handler: Arc::clone(&def.handler),
            })
            .collect();

        Some(MatchChain::new(pathname.to_string(), params, levels))
    }

    /// Resolves a raw request pathname
    ///
    /// Non-canonical paths (trailing slash, doubled or back slashes) resolve
    /// to a 301 redirect to the canonical form before any matching happens.
    pub fn resolve(&self, pathname: &str) -> Resolution<H> {
        if let Some(location) = canonical_redirect(pathname) {
            return Resolution::Redirect {
                location,
                status: 301,
            };
        }

        match self.match_path(pathname) {
            Some(chain) => Resolution::Matched(chain),
            None => Resolution::NotFound,
        }
    }

    /// Registered page templates, in registration order
    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    /// Number of registered pages
    pub fn count(&self) -> usize {
        self.templates.len()
    }
}
