//! Demo route tree served by the reference binary
//!
//! ```text
//! _root_                          locale preloader, session loader
//! _root_/                         home page
//! _root_/(shop)                   currency preloader, cart loader
//! _root_/(shop)/products          product list
//! _root_/(shop)/products/[id]     product page, streams reviews
//! _root_/account                  requires auth
//! _root_/docs/[...slug]           catch-all
//! _root_/wiki/[[...path]]         optional catch-all
//! ```

use serde_json::{json, Value};
use std::time::Duration;
use strata_loader::{DeferOptions, LevelHandlers, LoaderThrow};
use strata_router::{RouteDef, Router, TreeConfigurationError};
use strata_wire::{HeadFields, MetaTag};

struct Product {
    id: &'static str,
    name: &'static str,
    price: f64,
}

static PRODUCTS: [Product; 3] = [
    Product { id: "1", name: "Desk lamp", price: 39.0 },
    Product { id: "2", name: "Standing desk", price: 420.0 },
    Product { id: "3", name: "Monitor arm", price: 89.5 },
];

fn find_product(id: &str) -> Option<&'static Product> {
    PRODUCTS.iter().find(|product| product.id == id)
}

fn root() -> LevelHandlers {
    LevelHandlers::new()
        .preloader(|_| async { Ok(json!({"locale": "en"})) })
        .loader(|args| async move {
            // Anonymous visitors still get a shell
            let session = args.auth().await.ok();
            Ok(json!({"session": session, "locale": args.context.get("locale")}))
        })
        .with_head(|_| {
            HeadFields::titled("Strata")
                .with_meta(MetaTag::name("description", "Strata demo store"))
                .with_link("icon", "/favicon.ico")
        })
}

fn shop() -> LevelHandlers {
    LevelHandlers::new()
        .preloader(|_| async { Ok(json!({"currency": "EUR"})) })
        .loader(|args| async move {
            Ok(json!({"currency": args.context.get("currency"), "cart": 0}))
        })
}

fn product_list() -> LevelHandlers {
    LevelHandlers::new()
        .loader(|args| async move {
            let products: Vec<Value> = PRODUCTS
                .iter()
                .map(|p| json!({"id": p.id, "name": p.name, "price": p.price}))
                .collect();
            args.queries.record("products", &products)?;
            Ok(json!({"products": products}))
        })
        .title("Products")
}

fn product_page() -> LevelHandlers {
    LevelHandlers::new()
        .preloader(|args| async move {
            let id = args.param("id").unwrap_or_default();
            match find_product(id) {
                Some(product) => Ok(json!({"productId": product.id})),
                None => Err(LoaderThrow::not_found()),
            }
        })
        .loader(|args| async move {
            let id = args.param("id").unwrap_or_default().to_string();
            let product = find_product(&id).ok_or_else(LoaderThrow::not_found)?;

            let stock = args.defer(DeferOptions::blocking("stock"), async { Ok(7) })?;
            let reviews = args.defer(DeferOptions::streamed("reviews"), async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok(vec![json!({"rating": 5, "body": "Does the job"})])
            })?;

            Ok(json!({
                "id": product.id,
                "name": product.name,
                "price": product.price,
                "stock": stock,
                "reviews": reviews,
            }))
        })
        .with_head(|args| {
            let name = args
                .data
                .and_then(|data| data.get("name"))
                .and_then(Value::as_str)
                .unwrap_or("Product");
            HeadFields::titled(name)
        })
}

fn account() -> LevelHandlers {
    LevelHandlers::new()
        .loader(|args| async move {
            let auth = args.auth().await?;
            Ok(json!({"account": auth}))
        })
        .title("Account")
}

fn docs() -> LevelHandlers {
    LevelHandlers::new().loader(|args| async move {
        let slug = args.param_list("slug").unwrap_or_default().join("/");
        Ok(json!({"page": slug}))
    })
}

fn wiki() -> LevelHandlers {
    LevelHandlers::new().loader(|args| async move {
        let path = args.param_list("path").unwrap_or_default();
        Ok(json!({"path": path, "index": path.is_empty()}))
    })
}

/// Builds the demo route tree
pub fn router() -> Result<Router<LevelHandlers>, TreeConfigurationError> {
    Router::builder()
        .with_route(RouteDef::root(root()))
        .with_route(RouteDef::page("/", LevelHandlers::new().title("Home")))
        .with_route(RouteDef::layout("/(shop)", shop()))
        .with_route(RouteDef::page("/(shop)/products", product_list()))
        .with_route(
            RouteDef::page("/(shop)/products/[id]", product_page())
                .with_stale_time(Duration::from_secs(30)),
        )
        .with_route(RouteDef::page("/account", account()).requiring_auth())
        .with_route(RouteDef::page("/docs/[...slug]", docs()))
        .with_route(RouteDef::page("/wiki/[[...path]]", wiki()))
        .build()
}
