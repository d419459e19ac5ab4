use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;
use strata_loader::ResponseFormat;
use strata_server::{app, demo, service, Config};
use strata_wire::StreamMessage;
use tower::ServiceExt;

fn demo_app(config: &Config) -> axum::Router {
    app(service(demo::router().unwrap(), config))
}

async fn get(config: &Config, uri: &str, headers: &[(&str, &str)]) -> Response {
    let mut request = Request::builder().uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    demo_app(config)
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn messages(response: Response) -> Vec<StreamMessage> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .map(|line| StreamMessage::parse_line(line).unwrap())
        .collect()
}

#[rstest]
#[case("/", StatusCode::OK)]
#[case("/products", StatusCode::OK)]
#[case("/products/2", StatusCode::OK)]
#[case("/products/99", StatusCode::NOT_FOUND)]
#[case("/docs/guide/intro", StatusCode::OK)]
#[case("/wiki", StatusCode::OK)]
#[case("/nowhere/at/all", StatusCode::NOT_FOUND)]
#[case("/products/", StatusCode::MOVED_PERMANENTLY)]
#[tokio::test]
async fn test_demo_routes(#[case] uri: &str, #[case] status: StatusCode) {
    let response = get(&Config::default(), uri, &[]).await;
    assert_eq!(response.status(), status);
}

#[tokio::test]
async fn test_product_stream_delivers_reviews_after_ready() {
    let response = get(&Config::default(), "/products/1", &[("x-strata-data", "1")]).await;
    assert_eq!(response.status(), StatusCode::OK);

    let messages = messages(response).await;
    let ready = messages.iter().position(|m| *m == StreamMessage::Ready).unwrap();
    let reviews = messages
        .iter()
        .position(|m| matches!(m, StreamMessage::Chunk { key, .. } if key == "reviews"))
        .unwrap();
    assert!(reviews > ready);
    assert_eq!(messages.last(), Some(&StreamMessage::Done));

    let product = messages
        .iter()
        .find_map(|m| match m {
            StreamMessage::Loader { level_id, data } if level_id == "_root_/(shop)/products/[id]" => {
                data.clone()
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(product["stock"]["value"], json!(7));
    assert_eq!(product["reviews"]["status"], "pending");
}

#[tokio::test]
async fn test_account_requires_auth_header() {
    let config = Config::default();

    let anonymous = get(&config, "/account", &[("x-strata-data", "1")]).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let signed_in = get(
        &config,
        "/account",
        &[("x-strata-data", "1"), ("authorization", "Bearer abc")],
    )
    .await;
    assert_eq!(signed_in.status(), StatusCode::OK);
    let account = messages(signed_in)
        .await
        .into_iter()
        .find_map(|m| match m {
            StreamMessage::Loader { level_id, data } if level_id == "_root_/account" => data,
            _ => None,
        })
        .unwrap();
    assert_eq!(account, json!({"account": {"token": "abc"}}));
}

#[tokio::test]
async fn test_default_format_from_config() {
    let mut config = Config::default();
    config.loading.default_format = ResponseFormat::Stream;

    let response = get(&config, "/products", &[]).await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/x-ndjson");

    let messages = messages(response).await;
    assert!(messages.iter().any(|m| matches!(m, StreamMessage::Query { .. })));
}

#[tokio::test]
async fn test_document_is_html_by_default() {
    let response = get(&Config::default(), "/products/3", &[]).await;
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("__STRATA_DATA__"));
    assert!(html.contains("<title>Monitor arm</title>"));
}
