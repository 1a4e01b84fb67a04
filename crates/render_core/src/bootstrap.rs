//! Pure generation of the sandbox bootstrap script (§4.4, §9 "Sandbox boundary").
//!
//! This module contains no I/O: it transforms validated request data into a JavaScript
//! source string that the imperative-shell `ssrender` crate executes inside a fresh
//! `deno_core::JsRuntime` before running the request's packages. Untrusted data
//! (`globals`, the Apollo config, the location URL) is injected via the same
//! double-JSON-encoding technique used for React polyfill injection elsewhere in this
//! codebase's ancestry: a JSON string containing JSON, parsed with `JSON.parse`, so it
//! can never break out of the surrounding script text.

use serde::{Deserialize, Serialize};

use crate::error::{RenderCoreError, Result};

/// Apollo-like network shim parameters, reduced to exactly what the bootstrap script
/// needs to inject (already timeout-defaulted by the caller).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApolloBootstrapConfig {
    pub url: Option<String>,
    pub headers: std::collections::HashMap<String, String>,
    pub timeout_ms: u64,
}

fn json_string_literal(value: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| RenderCoreError::Serialization(e.to_string()))
}

/// Generate the full bootstrap script for one render.
///
/// `globals` must already have the `location` key removed by the caller (§4.4 step 6 -
/// the sandbox's own location, set here, is authoritative and must never be overwritten).
pub fn generate_bootstrap(
    location: &str,
    globals: &serde_json::Value,
    apollo: Option<&ApolloBootstrapConfig>,
) -> Result<String> {
    let location_literal = json_string_literal(location)?;
    let globals_json = serde_json::to_string(globals)
        .map_err(|e| RenderCoreError::Serialization(e.to_string()))?;
    let globals_literal = json_string_literal(&globals_json)?;

    let apollo_block = match apollo {
        Some(cfg) => generate_apollo_block(cfg)?,
        None => String::new(),
    };

    Ok(format!(
        r#"
// Location - authoritative, never overwritten by request globals.
globalThis.__SSR_LOCATION__ = JSON.parse({location_literal});

{DOM_SHIM}
{GLOBAL_ALIAS}
{CANVAS_STUB}
{IMAGE_STUB}
{CONSOLE_BRIDGE}
{FETCH_SHIM}
{TIMER_PATCH}
{SSR_PROTOCOL}
{apollo_block}

// Request globals - copied last so user-supplied values win over shim defaults,
// `location` was already excluded by the caller.
Object.assign(globalThis, JSON.parse({globals_literal}));
"#
    ))
}

const DOM_SHIM: &str = r#"
// Minimal DOM shim: a stubbed document/window sufficient for component bundles that
// merely probe for browser globals rather than manipulate a real tree.
(function () {
    function parseLocation(href) {
        const match = /^([a-z]+:)\/\/([^/:?#]*)(:(\d+))?([^?#]*)(\?[^#]*)?(#.*)?$/i.exec(href) || [];
        const protocol = match[1] || "http:";
        const hostname = match[2] || "";
        const port = match[4] || "";
        const pathname = match[5] || "/";
        const search = match[6] || "";
        const hash = match[7] || "";
        const host = port ? `${hostname}:${port}` : hostname;
        return {
            href,
            protocol,
            hostname,
            port,
            host,
            pathname,
            search,
            hash,
            origin: `${protocol}//${host}`,
            toString: () => href,
        };
    }

    globalThis.location = parseLocation(globalThis.__SSR_LOCATION__);

    function makeElement(tagName) {
        return {
            tagName: String(tagName || "").toUpperCase(),
            style: {},
            attributes: {},
            childNodes: [],
            children: [],
            setAttribute(name, value) { this.attributes[name] = String(value); },
            getAttribute(name) { return this.attributes[name] ?? null; },
            appendChild(child) { this.childNodes.push(child); this.children.push(child); return child; },
            removeChild(child) {
                this.childNodes = this.childNodes.filter((c) => c !== child);
                this.children = this.children.filter((c) => c !== child);
                return child;
            },
            addEventListener() {},
            removeEventListener() {},
        };
    }

    const head = makeElement("head");
    const body = makeElement("body");
    const documentElement = makeElement("html");
    documentElement.appendChild(head);
    documentElement.appendChild(body);

    globalThis.document = {
        documentElement,
        head,
        body,
        createElement: makeElement,
        createTextNode: (text) => ({ nodeType: 3, textContent: String(text) }),
        getElementById: () => null,
        querySelector: () => null,
        querySelectorAll: () => [],
        addEventListener: () => {},
        removeEventListener: () => {},
    };

    globalThis.navigator = { userAgent: "ssrender" };
})();
"#;

const GLOBAL_ALIAS: &str = r#"
// Alias the global object to itself under the names bundles commonly probe for.
globalThis.global = globalThis;
globalThis.self = globalThis;
"#;

const CANVAS_STUB: &str = r#"
// Neutralize canvas probing: libraries that feature-detect canvas support must see
// "not supported", not a working 2D context.
function HTMLCanvasElement() {}
HTMLCanvasElement.prototype.getContext = undefined;
globalThis.HTMLCanvasElement = HTMLCanvasElement;
"#;

const IMAGE_STUB: &str = r#"
// Images are always blocked (§4.3): report failure without raising a console error.
class ImageStub {
    constructor() {
        this._src = "";
        this.onload = null;
        this.onerror = null;
    }
    set src(value) {
        this._src = value;
        queueMicrotask(() => {
            if (this.onerror) this.onerror(new Error("blocked"));
        });
    }
    get src() {
        return this._src;
    }
}
globalThis.Image = ImageStub;
"#;

const CONSOLE_BRIDGE: &str = r#"
// Forward console calls to the host's structured logger.
globalThis.console = {
    log: (...args) => Deno.core.ops.op_console_log("info", args.map(String).join(" ")),
    info: (...args) => Deno.core.ops.op_console_log("info", args.map(String).join(" ")),
    warn: (...args) => Deno.core.ops.op_console_log("warn", args.map(String).join(" ")),
    error: (...args) => Deno.core.ops.op_console_log("error", args.map(String).join(" ")),
    debug: () => {},
};
"#;

const FETCH_SHIM: &str = r#"
// Runtime-issued resource requests (dynamic imports, xhr-like calls from bundle
// code) route through the resource loader (§4.3), not a real network stack.
globalThis.fetch = function (url) {
    return Deno.core.ops.op_resource_fetch(String(url)).then(
        (body) => ({
            ok: true,
            status: 200,
            text: () => Promise.resolve(body),
            json: () => Promise.resolve(JSON.parse(body)),
        }),
        (err) => Promise.reject(err)
    );
};
"#;

const TIMER_PATCH: &str = r#"
// Patch timers so callbacks armed before close never run after it (§9 "Timer patching").
(function () {
    let warnedOnce = false;
    function gate(fn, args) {
        return () => {
            if (!globalThis.__SSR_ACTIVE__) {
                if (!warnedOnce) {
                    warnedOnce = true;
                    Deno.core.ops.op_dangling_timer();
                }
                return;
            }
            return fn(...args);
        };
    }
    globalThis.setTimeout = (fn, _delay, ...args) => {
        queueMicrotask(gate(fn, args));
        return 0;
    };
    globalThis.clearTimeout = () => {};
    globalThis.setInterval = () => 0;
    globalThis.clearInterval = () => {};
    globalThis.requestAnimationFrame = (fn) => {
        queueMicrotask(gate(fn, [globalThis.performance ? globalThis.performance.now() : 0]));
        return 0;
    };
    globalThis.cancelAnimationFrame = () => {};
})();
"#;

const SSR_PROTOCOL: &str = r#"
// The host/bundle handshake protocol - preserved byte-for-byte.
globalThis.__rrs = { getRenderPromiseCallback: undefined, apolloClient: null };
globalThis.__registerForSSR__ = function (callback) {
    globalThis.__rrs.getRenderPromiseCallback = callback;
};
globalThis.__SSR_ACTIVE__ = true;
"#;

fn generate_apollo_block(cfg: &ApolloBootstrapConfig) -> Result<String> {
    let url_literal = match &cfg.url {
        Some(u) => json_string_literal(u)?,
        None => "null".to_string(),
    };
    let headers_json = serde_json::to_string(&cfg.headers)
        .map_err(|e| RenderCoreError::Serialization(e.to_string()))?;
    let headers_literal = json_string_literal(&headers_json)?;
    let timeout_ms = cfg.timeout_ms;

    Ok(format!(
        r#"
// Apollo-like GraphQL network shim (§4.7): a pluggable outbound-network adapter the
// bundle discovers via `__rrs.apolloClient`, decoupled from any specific client library.
(function () {{
    const url = JSON.parse({url_literal});
    const headers = JSON.parse({headers_literal});
    const timeoutMs = {timeout_ms};

    async function apolloFetch(body) {{
        if (!url || url === "BAD_URL") {{
            throw new Error("Invalid Apollo network URL");
        }}
        const responseJson = await Deno.core.ops.op_apollo_fetch(
            url,
            JSON.stringify(headers),
            JSON.stringify(body ?? {{}}),
            timeoutMs
        );
        const parsed = JSON.parse(responseJson);
        if (parsed.status < 200 || parsed.status >= 300) {{
            throw new Error("Apollo request failed with status " + parsed.status);
        }}
        return JSON.parse(parsed.body);
    }}

    globalThis.__rrs.apolloClient = {{
        cache: new Map(),
        link: {{ fetch: apolloFetch }},
        query: (options) => apolloFetch(options),
        mutate: (options) => apolloFetch(options),
    }};
}})();
"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_bootstrap_contains_protocol() {
        let script = generate_bootstrap("https://example.com/page", &serde_json::json!({}), None)
            .unwrap();
        assert!(script.contains("__registerForSSR__"));
        assert!(script.contains("__SSR_ACTIVE__ = true"));
        assert!(script.contains("__rrs"));
    }

    #[test]
    fn test_generate_bootstrap_escapes_location() {
        let script =
            generate_bootstrap("https://example.com/\"; alert(1); //", &serde_json::json!({}), None)
                .unwrap();
        assert!(script.contains("JSON.parse("));
    }

    #[test]
    fn test_generate_bootstrap_without_apollo_has_no_apollo_client() {
        let script = generate_bootstrap("https://example.com/", &serde_json::json!({}), None).unwrap();
        assert!(!script.contains("apolloClient ="));
    }

    #[test]
    fn test_generate_bootstrap_with_apollo_installs_client() {
        let cfg = ApolloBootstrapConfig {
            url: Some("https://api.example.com/graphql".to_string()),
            headers: std::collections::HashMap::new(),
            timeout_ms: 1000,
        };
        let script =
            generate_bootstrap("https://example.com/", &serde_json::json!({}), Some(&cfg)).unwrap();
        assert!(script.contains("globalThis.__rrs.apolloClient"));
        assert!(script.contains("op_apollo_fetch"));
    }

    #[test]
    fn test_generate_bootstrap_injects_globals_last() {
        let globals = serde_json::json!({"FOO": "bar"});
        let script = generate_bootstrap("https://example.com/", &globals, None).unwrap();
        assert!(script.contains("Object.assign(globalThis, JSON.parse("));
        assert!(script.contains("bar"));
    }

    #[test]
    fn test_dangling_timer_warning_is_gated_once() {
        let script = generate_bootstrap("https://example.com/", &serde_json::json!({}), None).unwrap();
        assert!(script.contains("op_dangling_timer"));
        assert!(script.contains("warnedOnce"));
    }
}
