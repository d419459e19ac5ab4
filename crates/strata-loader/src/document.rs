//! Full-document responses
//!
//! The document embeds the complete [`DocumentSnapshot`] so the client can
//! hydrate without a second request. Turning matched components into markup
//! belongs to a [`DocumentRenderer`]; the default one renders an empty mount
//! point.

use maud::{html, Markup, PreEscaped, DOCTYPE};
use strata_wire::{DocumentSnapshot, HeadFields};

/// Id of the `<script>` element carrying the snapshot
pub const SNAPSHOT_ELEMENT_ID: &str = "__STRATA_DATA__";

/// What a renderer sees
#[derive(Debug, Clone, Copy)]
pub struct DocumentContext<'a> {
    pub pathname: &'a str,
    /// Matched level ids in chain order
    pub level_ids: &'a [String],
    pub snapshot: &'a DocumentSnapshot,
    /// Heads merged root to leaf
    pub head: &'a HeadFields,
}

/// Produces the body markup for a matched chain
pub trait DocumentRenderer: Send + Sync + 'static {
    fn render_body(&self, ctx: &DocumentContext<'_>) -> Markup;
}

/// Renders only the mount point the client hydrates into
#[derive(Debug, Clone, Default)]
pub struct ShellRenderer;

impl DocumentRenderer for ShellRenderer {
    fn render_body(&self, ctx: &DocumentContext<'_>) -> Markup {
        html! {
            div id="app" data-pathname=(ctx.pathname) {}
        }
    }
}

/// Serializes a snapshot for inline embedding
///
/// `</` and `<!--` are escaped so the JSON cannot close the script element.
pub fn snapshot_json(snapshot: &DocumentSnapshot) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(snapshot)?
        .replace("</", "<\\/")
        .replace("<!--", "\\u003c!--"))
}

/// Renders the whole document
pub fn render_document(
    renderer: &dyn DocumentRenderer,
    ctx: &DocumentContext<'_>,
) -> Result<Markup, serde_json::Error> {
    let data = snapshot_json(ctx.snapshot)?;
    let head = ctx.head;

    Ok(html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                @if let Some(title) = &head.title {
                    title { (title) }
                }
                @for meta in &head.meta {
                    meta name=[meta.name.as_deref()] property=[meta.property.as_deref()] content=(meta.content);
                }
                @for link in &head.links {
                    link rel=(link.rel) href=(link.href);
                }
            }
            body {
                (renderer.render_body(ctx))
                script id=(SNAPSHOT_ELEMENT_ID) type="application/json" {
                    (PreEscaped(data))
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_wire::{MetaTag, StreamMessage};

    fn snapshot() -> DocumentSnapshot {
        DocumentSnapshot::from_messages(vec![
            StreamMessage::Loader {
                level_id: "_root_".into(),
                data: Some(json!({"note": "</script><script>alert(1)</script>"})),
            },
            StreamMessage::Ready,
            StreamMessage::Done,
        ])
    }

    #[test]
    fn test_snapshot_cannot_break_out_of_script() {
        let json = snapshot_json(&snapshot()).unwrap();
        assert!(!json.contains("</script>"));
        let back: DocumentSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot());
    }

    #[test]
    fn test_document_carries_head_and_snapshot() {
        let snapshot = snapshot();
        let head = HeadFields::titled("Lamp").with_meta(MetaTag::name("description", "A lamp"));
        let level_ids = vec!["_root_".to_string()];
        let ctx = DocumentContext {
            pathname: "/products/1",
            level_ids: &level_ids,
            snapshot: &snapshot,
            head: &head,
        };

        let html = render_document(&ShellRenderer, &ctx).unwrap().into_string();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Lamp</title>"));
        assert!(html.contains(r#"<meta name="description" content="A lamp">"#));
        assert!(html.contains(r#"<script id="__STRATA_DATA__" type="application/json">"#));
        assert!(html.contains(r#"data-pathname="/products/1""#));
    }
}
