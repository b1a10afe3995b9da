//! # HTML Views
//!
//! The pages the host serves around rendered components: the global loading
//! and failure gates, the per-site skeleton placeholder, and the page shell.

use remora_core::{Element, Value, render_html};

/// Message shown while the manifest is being fetched.
pub const LOADING_MESSAGE: &str = "Loading components...";

fn document(title: &str, body: &str) -> String {
    let head = render_html(
        &Element::new("head")
            .child(Element::new("meta").prop("charset", "utf-8"))
            .child(Element::new("title").child(title))
            .into(),
    );
    format!("<!doctype html><html>{head}<body>{body}</body></html>")
}

/// Global gate while `isLoading` is set.
pub fn loading_page() -> String {
    let body = Element::new("div")
        .prop("className", "remora-loading")
        .prop("role", "status")
        .child(Element::new("div").prop("className", "remora-spinner"))
        .child(Element::new("p").child(LOADING_MESSAGE));
    document("Loading", &render_html(&body.into()))
}

/// Global gate when the last fetch failed, with a manual retry.
///
/// The retry form posts to `/refresh` and comes back to `return_to`.
pub fn failure_page(error: &str, return_to: &str) -> String {
    let action = format!("/refresh?redirect={}", encode_query_value(return_to));
    let body = Element::new("div")
        .prop("className", "remora-error")
        .prop("role", "alert")
        .child(Element::new("h1").child("Components are unavailable"))
        .child(Element::new("p").child(error))
        .child(
            Element::new("form")
                .prop("method", "post")
                .prop("action", action)
                .child(Element::new("button").prop("type", "submit").child("Retry")),
        );
    document("Unavailable", &render_html(&body.into()))
}

/// Placeholder for a site that has not resolved.
pub fn skeleton(site: &str) -> String {
    let body = Element::new("div")
        .prop("className", "remora-skeleton")
        .prop("data-site", site)
        .prop("aria-busy", true);
    document(site, &render_html(&body.into()))
}

/// A rendered site.
pub fn page(site: &str, rendered: &Value) -> String {
    let body = Element::new("div")
        .prop("id", "remora-root")
        .prop("data-site", site)
        .child(rendered.clone());
    document(site, &render_html(&body.into()))
}

/// A site whose component raised while rendering.
pub fn render_failed(site: &str, error: &str) -> String {
    let body = Element::new("div")
        .prop("className", "remora-error")
        .prop("data-site", site)
        .child(Element::new("pre").child(error));
    document(site, &render_html(&body.into()))
}

/// Percent-encode everything outside the unreserved set and `/`.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_page_escapes_error_and_links_retry() {
        let html = failure_page("<boom>", "/render/navbar");
        assert!(html.contains("&lt;boom&gt;"));
        assert!(html.contains("action=\"/refresh?redirect=/render/navbar\""));
        assert!(html.starts_with("<!doctype html>"));
    }

    #[test]
    fn skeleton_is_busy() {
        let html = skeleton("navbar");
        assert!(html.contains("<div aria-busy class=\"remora-skeleton\" data-site=\"navbar\"></div>"));
    }

    #[test]
    fn query_values_are_encoded() {
        assert_eq!(encode_query_value("/render/a b?x"), "/render/a%20b%3Fx");
    }
}
