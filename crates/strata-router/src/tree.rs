//! Route match tree
//!
//! A prefix tree over URL segments. Each node carries a static child map
//! plus three optional wildcard slots; the matcher switches on which slots
//! are populated, always in the order static → dynamic → catch-all →
//! optional catch-all, independent of insertion order.

use crate::chain::{ParamValue, Params};
use crate::route::{RouteDef, TemplateSegment};
use crate::TreeConfigurationError;
use std::collections::HashMap;
use std::sync::Arc;

/// Levels (root first, page last) reached at a leaf
pub(crate) struct Leaf<H> {
    pub(crate) levels: Vec<Arc<RouteDef<H>>>,
}

struct WildcardChild<H> {
    param: String,
    node: Box<RouteNode<H>>,
}

impl<H> WildcardChild<H> {
    fn new(param: &str) -> Self {
        Self {
            param: param.to_string(),
            node: Box::new(RouteNode::new()),
        }
    }
}

/// One node of the route tree
pub struct RouteNode<H> {
    statics: HashMap<String, RouteNode<H>>,
    dynamic: Option<WildcardChild<H>>,
    catch_all: Option<WildcardChild<H>>,
    optional_catch_all: Option<WildcardChild<H>>,
    leaf: Option<Leaf<H>>,
}

impl<H> RouteNode<H> {
    pub(crate) fn new() -> Self {
        Self {
            statics: HashMap::new(),
            dynamic: None,
            catch_all: None,
            optional_catch_all: None,
            leaf: None,
        }
    }

    /// Inserts a page leaf along the page's URL-consuming segments
    pub(crate) fn insert(&mut self, leaf: Leaf<H>) -> Result<(), TreeConfigurationError> {
        let Some(page) = leaf.levels.last().cloned() else {
            return Ok(());
        };

        let mut node = self;
        let mut at = String::new();

        for segment in page.segments.iter().filter(|seg| seg.consumes_url()) {
            node = match segment {
                TemplateSegment::Static(text) => {
                    at.push('/');
                    at.push_str(text);
                    node.statics
                        .entry(text.to_lowercase())
                        .or_insert_with(RouteNode::new)
                }
                TemplateSegment::Dynamic(name) => {
                    at.push_str("/[]");
                    slot(&mut node.dynamic, name, "dynamic", &at)?
                }
                TemplateSegment::CatchAll(name) => {
                    at.push_str("/[...]");
                    slot(&mut node.catch_all, name, "catch-all", &at)?
                }
                TemplateSegment::OptionalCatchAll(name) => {
                    at.push_str("/[[...]]");
                    slot(&mut node.optional_catch_all, name, "optional catch-all", &at)?
                }
                TemplateSegment::Group(_) => unreachable!("groups consume no URL segment"),
            };
        }

        if let Some(existing) = &node.leaf {
            let existing = existing
                .levels
                .last()
                .map(|def| def.template.clone())
                .unwrap_or_default();
            return Err(TreeConfigurationError::DuplicateRoute {
                template: page.template.clone(),
                existing,
            });
        }

        node.leaf = Some(leaf);
        Ok(())
    }

    /// Walks the tree, backtracking into lower-precedence kinds on failure
    pub(crate) fn walk<'n>(
        &'n self,
        segments: &[String],
        params: &mut Vec<(String, ParamValue)>,
    ) -> Option<&'n Leaf<H>> {
        let Some((head, rest)) = segments.split_first() else {
            if let Some(leaf) = &self.leaf {
                return Some(leaf);
            }
            // Optional catch-all is the only kind that matches zero segments
            let optional = self.optional_catch_all.as_ref()?;
            let leaf = optional.node.leaf.as_ref()?;
            params.push((optional.param.clone(), ParamValue::Many(Vec::new())));
            return Some(leaf);
        };

        if let Some(child) = self.statics.get(&head.to_lowercase()) {
            if let Some(leaf) = child.walk(rest, params) {
                return Some(leaf);
            }
        }

        if let Some(dynamic) = &self.dynamic {
            params.push((dynamic.param.clone(), ParamValue::One(head.clone())));
            if let Some(leaf) = dynamic.node.walk(rest, params) {
                return Some(leaf);
            }
            params.pop();
        }

        for wildcard in [&self.catch_all, &self.optional_catch_all]
            .into_iter()
            .flatten()
        {
            if let Some(leaf) = &wildcard.node.leaf {
                params.push((wildcard.param.clone(), ParamValue::Many(segments.to_vec())));
                return Some(leaf);
            }
        }

        None
    }

    /// Resolves segments to a leaf plus captured params
    pub(crate) fn find(&self, segments: &[String]) -> Option<(&Leaf<H>, Params)> {
        let mut captured = Vec::new();
        let leaf = self.walk(segments, &mut captured)?;
        Some((leaf, captured.into_iter().collect()))
    }
}

fn slot<'n, H>(
    slot: &'n mut Option<WildcardChild<H>>,
    name: &str,
    kind: &'static str,
    at: &str,
) -> Result<&'n mut RouteNode<H>, TreeConfigurationError> {
    let child = slot.get_or_insert_with(|| WildcardChild::new(name));
    if child.param != name {
        return Err(TreeConfigurationError::ConflictingParam {
            at: at.to_string(),
            kind,
            existing: child.param.clone(),
            incoming: name.to_string(),
        });
    }
    Ok(&mut child.node)
}
