//! Request signals: data request, level filter, prefetch, format override
//!
//! Each signal is read from a header first and a query parameter second:
//!
//! | signal | header | query |
//! |--------|--------|-------|
//! | data request | `x-strata-data: 1` | `_data=1` |
//! | level filter | `x-strata-levels: a,b` | `_levels=a,b` |
//! | prefetch | `x-strata-prefetch: 1` or `purpose: prefetch` | |
//! | format | | `_format=stream\|document` |
//!
//! Level ids inside a filter are individually URL-encoded.

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DATA_HEADER: &str = "x-strata-data";
pub const LEVELS_HEADER: &str = "x-strata-levels";
pub const PREFETCH_HEADER: &str = "x-strata-prefetch";

const DATA_PARAM: &str = "_data";
const LEVELS_PARAM: &str = "_levels";
const FORMAT_PARAM: &str = "_format";
const CONTROL_PARAMS: [&str; 3] = [DATA_PARAM, LEVELS_PARAM, FORMAT_PARAM];

/// How a matched request is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Full HTML document with an embedded snapshot
    #[default]
    Document,
    /// NDJSON message stream
    Stream,
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" | "html" => Ok(ResponseFormat::Document),
            "stream" | "ndjson" => Ok(ResponseFormat::Stream),
            other => Err(format!("unknown response format: {}", other)),
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseFormat::Document => f.write_str("document"),
            ResponseFormat::Stream => f.write_str("stream"),
        }
    }
}

/// Signals carried by one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSignals {
    pub data: bool,
    pub levels: Option<Vec<String>>,
    pub prefetch: bool,
    pub format: Option<ResponseFormat>,
    /// The query string with control parameters removed
    pub search: String,
}

impl RequestSignals {
    pub fn from_parts(headers: &HeaderMap, query: Option<&str>) -> Self {
        let pairs = query.map(parse_query).unwrap_or_default();
        let param = |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };
        let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

        let data = header(DATA_HEADER).map(is_truthy).unwrap_or(false)
            || param(DATA_PARAM).map(is_truthy).unwrap_or(false);

        // An empty list filters nothing
        let levels = header(LEVELS_HEADER)
            .or_else(|| param(LEVELS_PARAM))
            .map(parse_level_list)
            .filter(|ids| !ids.is_empty());

        let prefetch = header(PREFETCH_HEADER).map(is_truthy).unwrap_or(false)
            || header("purpose").is_some_and(|value| value.eq_ignore_ascii_case("prefetch"));

        let format = param(FORMAT_PARAM).and_then(|value| match value.parse() {
            Ok(format) => Some(format),
            Err(err) => {
                tracing::debug!("Ignoring format override: {}", err);
                None
            }
        });

        Self {
            data,
            levels,
            prefetch,
            format,
            search: strip_control_params(query.unwrap_or_default()),
        }
    }

    /// The format to answer with
    ///
    /// An explicit override wins; otherwise data requests stream and
    /// everything else gets `default`.
    pub fn response_format(&self, default: ResponseFormat) -> ResponseFormat {
        match (self.format, self.data) {
            (Some(format), _) => format,
            (None, true) => ResponseFormat::Stream,
            (None, false) => default,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes")
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode(key), decode(value)),
            None => (decode(pair), String::new()),
        })
        .collect()
}

/// Splits a comma-separated filter into decoded level ids
pub fn parse_level_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            urlencoding::decode(id)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| id.to_string())
        })
        .collect()
}

/// Encodes level ids for the `x-strata-levels` header
pub fn format_level_list(level_ids: &[String]) -> String {
    level_ids
        .iter()
        .map(|id| urlencoding::encode(id).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

/// Removes `_data`, `_levels` and `_format` from a raw query string
pub fn strip_control_params(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(key, _)| key);
            !CONTROL_PARAMS.contains(&key)
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_plain_request_has_no_signals() {
        let signals = RequestSignals::from_parts(&HeaderMap::new(), Some("q=lamp"));
        assert_eq!(
            signals,
            RequestSignals {
                search: "q=lamp".into(),
                ..RequestSignals::default()
            }
        );
        assert_eq!(signals.response_format(ResponseFormat::Document), ResponseFormat::Document);
    }

    #[test]
    fn test_header_signals() {
        let signals = RequestSignals::from_parts(
            &headers(&[
                (DATA_HEADER, "1"),
                (LEVELS_HEADER, "_root_,_root_%2Fproducts%2F%5Bid%5D"),
                ("purpose", "prefetch"),
            ]),
            None,
        );
        assert!(signals.data);
        assert!(signals.prefetch);
        assert_eq!(
            signals.levels,
            Some(vec!["_root_".to_string(), "_root_/products/[id]".to_string()])
        );
        assert_eq!(signals.response_format(ResponseFormat::Document), ResponseFormat::Stream);
    }

    #[test]
    fn test_query_fallbacks_are_stripped_from_search() {
        let signals = RequestSignals::from_parts(
            &HeaderMap::new(),
            Some("sort=asc&_data=1&_levels=_root_&page=2"),
        );
        assert!(signals.data);
        assert_eq!(signals.levels, Some(vec!["_root_".to_string()]));
        assert_eq!(signals.search, "sort=asc&page=2");
    }

    #[rstest]
    #[case("")]
    #[case(" ")]
    #[case(",,")]
    fn test_empty_level_header_is_no_filter(#[case] raw: &'static str) {
        let signals =
            RequestSignals::from_parts(&headers(&[(DATA_HEADER, "1"), (LEVELS_HEADER, raw)]), None);
        assert_eq!(signals.levels, None);

        let query = format!("_data=1&_levels={}", raw);
        let signals = RequestSignals::from_parts(&HeaderMap::new(), Some(&query));
        assert_eq!(signals.levels, None);
    }

    #[rstest]
    #[case("_format=document&_data=1", ResponseFormat::Document)]
    #[case("_format=stream", ResponseFormat::Stream)]
    #[case("_format=bogus", ResponseFormat::Document)]
    fn test_format_override(#[case] query: &str, #[case] expected: ResponseFormat) {
        let signals = RequestSignals::from_parts(&HeaderMap::new(), Some(query));
        assert_eq!(signals.response_format(ResponseFormat::Document), expected);
    }

    #[test]
    fn test_level_list_round_trip() {
        let ids = vec!["_root_".to_string(), "_root_/(shop)/[...slug]".to_string()];
        assert_eq!(parse_level_list(&format_level_list(&ids)), ids);
    }
}
