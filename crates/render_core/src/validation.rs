//! Pure request validation - no I/O, no side effects.

use crate::error::{RenderCoreError, Result};
use crate::model::RenderBody;

/// Validate `urls`: every element must parse as an absolute URL.
///
/// Returns the validated list unchanged (validation is pure checking, not normalization).
pub fn validate_urls(urls: &[String]) -> Result<()> {
    for u in urls {
        url::Url::parse(u).map_err(|_| RenderCoreError::InvalidUrl(u.clone()))?;
    }
    Ok(())
}

/// Validate `props`: must be a JSON object, not an array or scalar.
pub fn validate_props(props: &serde_json::Value) -> Result<()> {
    if props.is_object() {
        Ok(())
    } else {
        Err(RenderCoreError::NonObjectProps)
    }
}

/// Validate `globals.location`, if present, is an absolute URL.
pub fn validate_location(globals: &std::collections::HashMap<String, serde_json::Value>) -> Result<()> {
    let Some(location) = globals.get("location") else {
        return Ok(());
    };
    let Some(location) = location.as_str() else {
        return Err(RenderCoreError::InvalidLocation(location.to_string()));
    };
    url::Url::parse(location).map_err(|_| RenderCoreError::InvalidLocation(location.to_string()))?;
    Ok(())
}

/// Filter `urls` down to the subset the fetcher/sandbox actually cares about:
/// absolute `http(s)` URLs ending in `.js`. Anything else (stylesheets, fonts, etc in a
/// mixed list) is silently dropped, per §7 - it is explicitly expected, not an error.
pub fn filter_js_urls(urls: &[String]) -> Vec<String> {
    urls.iter()
        .filter(|u| u.starts_with("http") && u.ends_with(".js"))
        .cloned()
        .collect()
}

/// Run the full set of `/render` input validations (§4.5), in order.
///
/// Returns the filtered `jsUrls` list on success; this is the list the orchestrator
/// actually fetches and executes. Empty after filtering is itself a validation failure.
pub fn validate_render_body(body: &RenderBody) -> Result<Vec<String>> {
    validate_urls(&body.urls)?;
    validate_props(&body.props)?;
    validate_location(&body.globals)?;

    let js_urls = filter_js_urls(&body.urls);
    if js_urls.is_empty() {
        return Err(RenderCoreError::NoJsUrls);
    }
    Ok(js_urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn body(urls: Vec<&str>, props: serde_json::Value, location: Option<&str>) -> RenderBody {
        let mut globals = HashMap::new();
        if let Some(loc) = location {
            globals.insert("location".to_string(), serde_json::json!(loc));
        }
        RenderBody {
            urls: urls.into_iter().map(String::from).collect(),
            props,
            globals,
            secret: None,
            apollo_network: None,
        }
    }

    #[test]
    fn test_empty_body_has_no_js_urls() {
        let b = body(vec![], serde_json::json!({}), None);
        assert!(matches!(
            validate_render_body(&b),
            Err(RenderCoreError::NoJsUrls)
        ));
    }

    #[test]
    fn test_malformed_url_rejected() {
        let b = body(vec!["foo"], serde_json::json!({}), None);
        assert!(matches!(
            validate_render_body(&b),
            Err(RenderCoreError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_non_object_props_rejected() {
        let b = body(
            vec!["https://example.com/a.js"],
            serde_json::json!("foo"),
            None,
        );
        assert!(matches!(
            validate_render_body(&b),
            Err(RenderCoreError::NonObjectProps)
        ));
    }

    #[test]
    fn test_non_js_urls_filtered_silently() {
        let b = body(
            vec!["https://example.com/a.css", "https://example.com/b.js"],
            serde_json::json!({}),
            None,
        );
        let filtered = validate_render_body(&b).unwrap();
        assert_eq!(filtered, vec!["https://example.com/b.js".to_string()]);
    }

    #[test]
    fn test_only_non_js_urls_is_rejected() {
        let b = body(vec!["https://example.com/a.css"], serde_json::json!({}), None);
        assert!(matches!(
            validate_render_body(&b),
            Err(RenderCoreError::NoJsUrls)
        ));
    }

    #[test]
    fn test_invalid_location_rejected() {
        let b = body(
            vec!["https://example.com/a.js"],
            serde_json::json!({}),
            Some("not-a-url"),
        );
        assert!(matches!(
            validate_render_body(&b),
            Err(RenderCoreError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_valid_body_passes() {
        let b = body(
            vec!["https://example.com/a.js"],
            serde_json::json!({"bar": 4}),
            Some("https://example.com/page"),
        );
        assert_eq!(
            validate_render_body(&b).unwrap(),
            vec!["https://example.com/a.js".to_string()]
        );
    }
}
