//! Head metadata contributed by matched levels

use serde::{Deserialize, Serialize};

/// A `<meta>` tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    pub content: String,
}

impl MetaTag {
    pub fn name(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            property: None,
            content: content.into(),
        }
    }

    pub fn property(property: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: None,
            property: Some(property.into()),
            content: content.into(),
        }
    }

    fn identity(&self) -> (Option<&str>, Option<&str>) {
        (self.name.as_deref(), self.property.as_deref())
    }
}

/// A `<link>` tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTag {
    pub rel: String,
    pub href: String,
}

/// Head fields for one level (or the merged result for a chain)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<MetaTag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkTag>,
}

impl HeadFields {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_meta(mut self, meta: MetaTag) -> Self {
        self.meta.push(meta);
        self
    }

    pub fn with_link(mut self, rel: impl Into<String>, href: impl Into<String>) -> Self {
        self.links.push(LinkTag {
            rel: rel.into(),
            href: href.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.meta.is_empty() && self.links.is_empty()
    }

    /// Merges a deeper level's head over this one
    ///
    /// The deeper title wins; meta tags with the same name/property are
    /// replaced; links are appended unless already present.
    pub fn merge(mut self, deeper: HeadFields) -> Self {
        if deeper.title.is_some() {
            self.title = deeper.title;
        }

        for meta in deeper.meta {
            match self.meta.iter_mut().find(|m| m.identity() == meta.identity()) {
                Some(existing) => *existing = meta,
                None => self.meta.push(meta),
            }
        }

        for link in deeper.links {
            if !self.links.contains(&link) {
                self.links.push(link);
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deeper_level_overrides() {
        let root = HeadFields::titled("Shop")
            .with_meta(MetaTag::name("description", "All products"))
            .with_link("icon", "/favicon.ico");
        let leaf = HeadFields::titled("Lamp")
            .with_meta(MetaTag::name("description", "A lamp"))
            .with_link("icon", "/favicon.ico");

        let merged = root.merge(leaf);
        assert_eq!(merged.title.as_deref(), Some("Lamp"));
        assert_eq!(merged.meta.len(), 1);
        assert_eq!(merged.meta[0].content, "A lamp");
        assert_eq!(merged.links.len(), 1);
    }

    #[test]
    fn test_empty_fields_serialize_compactly() {
        assert_eq!(serde_json::to_string(&HeadFields::default()).unwrap(), "{}");
    }
}
