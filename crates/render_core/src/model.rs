//! Wire data types for the render pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inbound `/render` request body.
#[derive(Clone, Debug, Deserialize)]
pub struct RenderBody {
    /// Ordered JS package URLs; topologically sorted, last = entry point.
    #[serde(default)]
    pub urls: Vec<String>,
    /// Props object passed to the registered render callback.
    #[serde(default = "default_props")]
    pub props: serde_json::Value,
    /// Optional globals copied into the sandbox, except `location`.
    #[serde(default)]
    pub globals: HashMap<String, serde_json::Value>,
    /// Shared secret, required unless the server is running in dev mode.
    #[serde(default)]
    pub secret: Option<String>,
    /// Optional Apollo-like GraphQL network shim configuration.
    #[serde(default, rename = "apolloNetwork")]
    pub apollo_network: Option<ApolloNetworkConfig>,
}

fn default_props() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Apollo-like network shim configuration (`RenderBody.apolloNetwork`).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ApolloNetworkConfig {
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub timeout: Option<u64>,
}

/// Outbound `/render` response body: harvested HTML and stylesheet output.
#[derive(Clone, Debug, Serialize)]
pub struct RenderResult {
    pub html: String,
    pub css: RenderCss,
}

/// The `css` field of a render result: a structured stylesheet descriptor, a bare
/// string, or absent, mirroring the variance of whatever CSS-in-JS library the
/// rendered bundle happens to use.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum RenderCss {
    Structured {
        content: String,
        #[serde(rename = "renderedClassNames")]
        rendered_class_names: Vec<String>,
    },
    Plain(String),
    None,
}

/// Standard error response schema (`{error, value?, stack?}`).
#[derive(Clone, Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorBody {
    pub fn simple(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            value: None,
            stack: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_body_defaults() {
        let body: RenderBody = serde_json::from_str("{}").unwrap();
        assert!(body.urls.is_empty());
        assert!(body.props.is_object());
        assert!(body.globals.is_empty());
        assert!(body.secret.is_none());
        assert!(body.apollo_network.is_none());
    }

    #[test]
    fn test_render_css_structured_serializes_flat() {
        let css = RenderCss::Structured {
            content: ".a{color:red}".to_string(),
            rendered_class_names: vec!["a".to_string()],
        };
        let json = serde_json::to_value(&css).unwrap();
        assert_eq!(json["content"], ".a{color:red}");
    }

    #[test]
    fn test_render_css_none_serializes_null() {
        let json = serde_json::to_value(RenderCss::None).unwrap();
        assert!(json.is_null());
    }
}
