// src/reload/route.rs

//! Chunk name to route mapping.

/// Route of a chunk: the name relative to `root`, with forward slashes and
/// without the `.js` or `/index.js` suffix. The empty route is `/`.
///
/// `bundles/pages/index.js` -> `/`, `bundles/pages/blog/post.js` ->
/// `/blog/post`, `bundles\pages\about\index.js` -> `/about`.
pub fn to_route(chunk_name: &str, root: &str) -> String {
    let name = chunk_name.replace('\\', "/");
    let root = root.replace('\\', "/");
    let root = root.trim_end_matches('/');

    let rel = match name.strip_prefix(root) {
        Some(rest) if root.is_empty() => rest,
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => name.as_str(),
    };

    let route = format!("/{}", rel.trim_start_matches('/'));
    let trimmed = if let Some(stripped) = route.strip_suffix("/index.js") {
        stripped
    } else if let Some(stripped) = route.strip_suffix(".js") {
        stripped
    } else {
        route.as_str()
    };

    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
