//! Match chains: the ordered root-to-leaf levels produced by a successful match

use crate::route::{RouteDef, RouteKind, ShouldRefetch};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A captured route parameter
///
/// Dynamic segments capture one string, catch-alls capture a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    One(String),
    Many(Vec<String>),
}

impl ParamValue {
    /// The single value, if this is a dynamic capture
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::One(value) => Some(value),
            ParamValue::Many(_) => None,
        }
    }

    /// The captured segments, if this is a catch-all capture
    pub fn as_slice(&self) -> Option<&[String]> {
        match self {
            ParamValue::One(_) => None,
            ParamValue::Many(values) => Some(values),
        }
    }
}

/// Route parameters, ordered by name for deterministic output
pub type Params = BTreeMap<String, ParamValue>;

/// Input to a `should_refetch` predicate
#[derive(Debug, Clone, Copy)]
pub struct RefetchArgs<'a> {
    pub level_id: &'a str,
    pub params: &'a Params,
    pub search: &'a str,
}

/// One matched level
#[derive(Clone)]
pub struct RouteMatch {
    /// Stable id derived from the route template
    pub level_id: String,
    /// Declarative template of this level
    pub template: String,
    pub kind: RouteKind,
    /// Params declared by this level's template
    pub params: Params,
    pub stale_time: Option<Duration>,
    pub should_refetch: Option<ShouldRefetch>,
    pub requires_auth: bool,
}

impl RouteMatch {
    pub(crate) fn from_def<H>(def: &RouteDef<H>, all_params: &Params) -> Self {
        Self {
            level_id: def.level_id(),
            template: def.template.clone(),
            kind: def.kind,
            params: def.own_params(all_params),
            stale_time: def.stale_time,
            should_refetch: def.should_refetch.clone(),
            requires_auth: def.requires_auth,
        }
    }

    /// Evaluates the refetch predicate, `false` when none is declared
    pub fn wants_refetch(&self, search: &str) -> bool {
        self.should_refetch.as_ref().is_some_and(|predicate| {
            predicate(&RefetchArgs {
                level_id: &self.level_id,
                params: &self.params,
                search,
            })
        })
    }
}

impl PartialEq for RouteMatch {
    fn eq(&self, other: &Self) -> bool {
        self.level_id == other.level_id
            && self.template == other.template
            && self.kind == other.kind
            && self.params == other.params
            && self.stale_time == other.stale_time
            && self.requires_auth == other.requires_auth
            && match (&self.should_refetch, &other.should_refetch) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("level_id", &self.level_id)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("stale_time", &self.stale_time)
            .field("should_refetch", &self.should_refetch.is_some())
            .field("requires_auth", &self.requires_auth)
            .finish()
    }
}

/// A matched level paired with its handler
pub struct MatchedLevel<H> {
    pub route: RouteMatch,
    pub handler: Arc<H>,
}

impl<H> Clone for MatchedLevel<H> {
    fn clone(&self) -> Self {
        Self {
            route: self.route.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Ordered root-to-leaf levels for one pathname
pub struct MatchChain<H> {
    /// The canonical pathname that was matched
    pub pathname: String,
    /// Every param captured along the path
    pub params: Params,
    levels: Vec<MatchedLevel<H>>,
}

impl<H> MatchChain<H> {
    pub(crate) fn new(pathname: String, params: Params, levels: Vec<MatchedLevel<H>>) -> Self {
        Self {
            pathname,
            params,
            levels,
        }
    }

    /// Levels in root-to-leaf order
    pub fn levels(&self) -> &[MatchedLevel<H>] {
        &self.levels
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchedLevel<H>> {
        self.levels.iter()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Level ids in chain order
    pub fn level_ids(&self) -> Vec<String> {
        self.levels
            .iter()
            .map(|level| level.route.level_id.clone())
            .collect()
    }

    /// The leaf page
    pub fn leaf(&self) -> Option<&MatchedLevel<H>> {
        self.levels.last()
    }

    /// Finds a level by id
    pub fn get(&self, level_id: &str) -> Option<&MatchedLevel<H>> {
        self.levels
            .iter()
            .find(|level| level.route.level_id == level_id)
    }

    /// Whether any level in the full chain requires authentication
    pub fn requires_auth(&self) -> bool {
        self.levels.iter().any(|level| level.route.requires_auth)
    }

    /// Index of the deepest level whose id appears in `level_ids`
    pub fn deepest_of(&self, level_ids: &[String]) -> Option<usize> {
        self.levels
            .iter()
            .rposition(|level| level_ids.contains(&level.route.level_id))
    }
}

impl<H> Clone for MatchChain<H> {
    fn clone(&self) -> Self {
        Self {
            pathname: self.pathname.clone(),
            params: self.params.clone(),
            levels: self.levels.clone(),
        }
    }
}

impl<H> PartialEq for MatchChain<H> {
    fn eq(&self, other: &Self) -> bool {
        self.pathname == other.pathname
            && self.params == other.params
            && self.levels.len() == other.levels.len()
            && self
                .levels
                .iter()
                .zip(&other.levels)
                .all(|(a, b)| a.route == b.route && Arc::ptr_eq(&a.handler, &b.handler))
    }
}

impl<H> fmt::Debug for MatchChain<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchChain")
            .field("pathname", &self.pathname)
            .field("params", &self.params)
            .field(
                "levels",
                &self.levels.iter().map(|l| &l.route).collect::<Vec<_>>(),
            )
            .finish()
    }
}
