use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{header, HeaderMap, Request, StatusCode, Uri};
use axum::response::Response;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use strata_loader::{DeferOptions, LevelHandlers, LoaderThrow, StrataService};
use strata_router::{RouteDef, Router};
use strata_wire::{DocumentSnapshot, HeadFields, StreamMessage};
use tower::ServiceExt;

type Service = Arc<StrataService<LevelHandlers>>;

async fn handle(State(service): State<Service>, uri: Uri, headers: HeaderMap) -> Response {
    service.handle(&uri, &headers).await
}

fn app() -> axum::Router {
    let router = Router::builder()
        .with_route(RouteDef::root(
            LevelHandlers::new()
                .loader(|_| async { Ok(json!({"site": "shop"})) })
                .title("Shop"),
        ))
        .with_route(RouteDef::page(
            "/products/[id]",
            LevelHandlers::new()
                .loader(|args| async move {
                    let id = args.param("id").unwrap_or_default().to_string();
                    if id == "gone" {
                        return Err(LoaderThrow::redirect("/products"));
                    }
                    let stock = args.defer(DeferOptions::streamed("stock"), async { Ok(3) })?;
                    Ok(json!({"id": id, "stock": stock}))
                })
                .with_head(|args| HeadFields::titled(format!("Product {}", args.params["id"].as_str().unwrap_or("?")))),
        ))
        .with_route(RouteDef::page("/products", LevelHandlers::new()))
        .build()
        .unwrap();

    axum::Router::new()
        .fallback(handle)
        .with_state(Arc::new(StrataService::new(router)))
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_data_request_streams_ndjson() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/products/5")
                .header("x-strata-data", "1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/x-ndjson");

    let text = body_text(response).await;
    let messages: Vec<StreamMessage> = text
        .lines()
        .map(|line| StreamMessage::parse_line(line).unwrap())
        .collect();
    assert!(text.ends_with('\n'));
    assert_eq!(messages.last(), Some(&StreamMessage::Done));
    assert!(messages.contains(&StreamMessage::settlement(
        "_root_/products/[id]",
        "stock",
        Ok(json!(3))
    )));
}

#[tokio::test]
async fn test_level_filter_header_limits_loaders() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/products/5?_data=1")
                .header("x-strata-levels", "_root_")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let text = body_text(response).await;
    let first = StreamMessage::parse_line(text.lines().next().unwrap()).unwrap();
    assert_eq!(
        first,
        StreamMessage::Loader {
            level_id: "_root_".into(),
            data: Some(json!({"site": "shop"}))
        }
    );
    assert_eq!(text.lines().count(), 4); // l, h, r, d
}

#[tokio::test]
async fn test_empty_level_header_loads_every_level() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/products/5?_data=1")
                .header("x-strata-levels", "")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let text = body_text(response).await;
    let loaded: Vec<String> = text
        .lines()
        .filter_map(|line| match StreamMessage::parse_line(line).unwrap() {
            StreamMessage::Loader { level_id, .. } => Some(level_id),
            _ => None,
        })
        .collect();
    assert_eq!(loaded, vec!["_root_", "_root_/products/[id]"]);
}

#[tokio::test]
async fn test_document_embeds_snapshot() {
    let response = app()
        .oneshot(Request::builder().uri("/products/5").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<title>Product 5</title>"));

    let start = html.find(r#"type="application/json">"#).unwrap() + r#"type="application/json">"#.len();
    let end = start + html[start..].find("</script>").unwrap();
    let snapshot: DocumentSnapshot = serde_json::from_str(&html[start..end]).unwrap();
    assert_eq!(
        snapshot.loaders["_root_/products/[id]"].as_ref().unwrap()["stock"],
        json!({"$defer": "stock", "status": "resolved", "value": 3})
    );
}

#[tokio::test]
async fn test_trailing_slash_redirects_permanently() {
    let response = app()
        .oneshot(Request::builder().uri("/products/?sort=asc").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[header::LOCATION], "/products?sort=asc");
}

#[tokio::test]
async fn test_loader_redirect_replaces_response() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/products/gone")
                .header("x-strata-data", "1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/products");
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let response = app()
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_prefetch_responses_are_marked() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/products/5?_data=1")
                .header("purpose", "prefetch")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()[header::CACHE_CONTROL], "private, max-age=0");
    assert_eq!(response.headers()["x-strata-prefetch"], "1");
}
