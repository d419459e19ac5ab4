//! Integration tests for strata-router
//!
//! Covers precedence, wildcard arity, groups and layouts in the chain,
//! level id stability and canonical redirects.

use pretty_assertions::assert_eq;
use rstest::rstest;
use std::time::Duration;
use strata_router::*;

fn shop_router() -> Router<&'static str> {
    Router::builder()
        .with_route(RouteDef::root("shell"))
        .with_route(RouteDef::layout("/(shop)", "shop-group"))
        .with_route(RouteDef::layout("/(shop)/products", "products-layout"))
        .with_route(RouteDef::page("/(shop)/products/[id]", "product"))
        .with_route(RouteDef::page("/(shop)/products/featured", "featured"))
        .with_route(RouteDef::page("/docs/[...slug]", "docs"))
        .with_route(RouteDef::page("/wiki/[[...path]]", "wiki"))
        .with_route(RouteDef::page("/", "home"))
        .with_route(RouteDef::page("/About", "about"))
        .build()
        .unwrap()
}

fn param<'a>(chain: &'a MatchChain<&'static str>, name: &str) -> Option<&'a ParamValue> {
    chain.params.get(name)
}

#[test]
fn test_matching_is_deterministic() {
    let router = shop_router();
    let first = router.match_path("/products/42").unwrap();
    let second = router.match_path("/products/42").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_static_child_beats_dynamic() {
    let router = shop_router();
    let chain = router.match_path("/products/featured").unwrap();
    assert_eq!(*chain.leaf().unwrap().handler, "featured");
    assert!(chain.params.is_empty());
}

#[test]
fn test_precedence_independent_of_registration_order() {
    let router = Router::builder()
        .with_route(RouteDef::root(()))
        .with_route(RouteDef::page("/items/[id]", ()))
        .with_route(RouteDef::page("/items/123", ()))
        .build()
        .unwrap();

    let chain = router.match_path("/items/123").unwrap();
    assert_eq!(chain.leaf().unwrap().route.template, "/items/123");
}

#[test]
fn test_group_and_layouts_each_contribute_a_level() {
    let router = shop_router();
    let chain = router.match_path("/products/42").unwrap();

    assert_eq!(
        chain.level_ids(),
        vec![
            "_root_",
            "_root_/(shop)",
            "_root_/(shop)/products",
            "_root_/(shop)/products/[id]",
        ]
    );

    let group = chain.get("_root_/(shop)").unwrap();
    assert_eq!(group.route.kind, RouteKind::Layout);
    assert!(group.route.params.is_empty());

    let leaf = chain.leaf().unwrap();
    assert_eq!(leaf.route.params.get("id"), Some(&ParamValue::One("42".to_string())));
}

#[test]
fn test_page_sharing_layout_template_gets_distinct_id() {
    let router = Router::builder()
        .with_route(RouteDef::root("shell"))
        .with_route(RouteDef::layout("/products", "products-layout"))
        .with_route(RouteDef::page("/products", "product-list"))
        .with_route(RouteDef::page("/products/[id]", "product"))
        .build()
        .unwrap();

    let list = router.match_path("/products").unwrap();
    assert_eq!(list.level_ids(), vec!["_root_", "_root_/products", "_root_/products/"]);
    assert_eq!(*list.get("_root_/products/").unwrap().handler, "product-list");
    assert_eq!(list.get("_root_/products").unwrap().route.kind, RouteKind::Layout);

    // Pages without a same-template layout keep the plain id
    let item = router.match_path("/products/7").unwrap();
    assert_eq!(item.level_ids(), vec!["_root_", "_root_/products", "_root_/products/[id]"]);
}

#[test]
fn test_level_ids_stable_across_concrete_urls() {
    let router = shop_router();
    let a = router.match_path("/products/1").unwrap();
    let b = router.match_path("/products/999").unwrap();
    assert_eq!(a.level_ids(), b.level_ids());
    assert_ne!(a.params, b.params);
}

#[rstest]
#[case("/docs/intro", Some(vec!["intro"]))]
#[case("/docs/guide/install", Some(vec!["guide", "install"]))]
#[case("/docs", None)]
fn test_catch_all_requires_one_segment(#[case] path: &str, #[case] expected: Option<Vec<&str>>) {
    let router = shop_router();
    let chain = router.match_path(path);

    match expected {
        Some(segments) => {
            let chain = chain.unwrap();
            let expected: Vec<String> = segments.into_iter().map(String::from).collect();
            assert_eq!(param(&chain, "slug"), Some(&ParamValue::Many(expected)));
        }
        None => assert!(chain.is_none()),
    }
}

#[rstest]
#[case("/wiki", vec![])]
#[case("/wiki/a", vec!["a"])]
#[case("/wiki/a/b/c", vec!["a", "b", "c"])]
fn test_optional_catch_all_accepts_zero(#[case] path: &str, #[case] segments: Vec<&str>) {
    let router = shop_router();
    let chain = router.match_path(path).unwrap();
    let expected: Vec<String> = segments.into_iter().map(String::from).collect();
    assert_eq!(param(&chain, "path"), Some(&ParamValue::Many(expected)));
}

#[test]
fn test_static_lookup_is_case_insensitive() {
    let router = shop_router();
    assert_eq!(*router.match_path("/about").unwrap().leaf().unwrap().handler, "about");
    assert_eq!(*router.match_path("/ABOUT").unwrap().leaf().unwrap().handler, "about");
}

#[test]
fn test_segments_are_decoded_with_literal_fallback() {
    let router = shop_router();

    let chain = router.match_path("/products/caf%C3%A9").unwrap();
    assert_eq!(param(&chain, "id"), Some(&ParamValue::One("café".to_string())));

    let chain = router.match_path("/products/%FF").unwrap();
    assert_eq!(param(&chain, "id"), Some(&ParamValue::One("%FF".to_string())));
}

#[test]
fn test_trailing_slash_redirects_permanently() {
    let router = shop_router();

    match router.resolve("/products/") {
        Resolution::Redirect { location, status } => {
            assert_eq!(location, "/products");
            assert_eq!(status, 301);
        }
        other => panic!("expected redirect, got {:?}", other),
    }

    assert!(matches!(router.resolve("/"), Resolution::Matched(_)));
}

#[test]
fn test_unknown_path_is_not_found() {
    let router = shop_router();
    assert!(matches!(router.resolve("/nope/nothing"), Resolution::NotFound));
    // A layout alone is not a page
    assert!(matches!(router.resolve("/products"), Resolution::NotFound));
}

#[test]
fn test_root_page_chain() {
    let router = shop_router();
    let chain = router.match_path("/").unwrap();
    assert_eq!(chain.level_ids(), vec!["_root_", "_root_/"]);
    assert_eq!(*chain.leaf().unwrap().handler, "home");
}

#[test]
fn test_route_metadata_flows_into_matches() {
    let router = Router::builder()
        .with_route(RouteDef::root(()))
        .with_route(
            RouteDef::page("/account", ())
                .with_stale_time(Duration::from_secs(5))
                .requiring_auth(),
        )
        .build()
        .unwrap();

    let chain = router.match_path("/account").unwrap();
    let leaf = &chain.leaf().unwrap().route;
    assert_eq!(leaf.stale_time, Some(Duration::from_secs(5)));
    assert!(chain.requires_auth());
}

#[test]
fn test_build_errors() {
    let missing_root = Router::<()>::builder()
        .with_route(RouteDef::page("/a", ()))
        .build();
    assert!(matches!(missing_root, Err(TreeConfigurationError::MissingRoot)));

    let conflicting = Router::builder()
        .with_route(RouteDef::root(()))
        .with_route(RouteDef::page("/docs/[...slug]", ()))
        .with_route(RouteDef::page("/docs/[...path]/(x)", ()))
        .build();
    assert!(matches!(
        conflicting,
        Err(TreeConfigurationError::ConflictingParam { kind: "catch-all", .. })
    ));

    let not_terminal = Router::builder()
        .with_route(RouteDef::root(()))
        .with_route(RouteDef::page("/docs/[...slug]/edit", ()))
        .build();
    assert!(matches!(
        not_terminal,
        Err(TreeConfigurationError::CatchAllNotTerminal { .. })
    ));
}
