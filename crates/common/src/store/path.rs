//! Url <-> tree path conversion
//!
//! The first component of an absolute url is `scheme://host`, the rest
//! are its `/`-separated path segments. Empty segments are dropped, so
//! `http://h/a/` and `http://h/a` land on the same node. Bare paths
//! (`/d/leaf`) are rooted directly under the AU root.

/// Split a url into tree components
pub fn components(url: &str) -> Vec<String> {
    let mut comps = Vec::new();
    let rest = match url.find("://") {
        Some(idx) => {
            let after = &url[idx + 3..];
            let (host, rest) = match after.find('/') {
                Some(slash) => (&after[..slash], &after[slash..]),
                None => (after, ""),
            };
            comps.push(format!("{}{}", &url[..idx + 3], host));
            rest
        }
        None => url,
    };
    comps.extend(
        rest.split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string),
    );
    comps
}

/// Canonical url of the child `component` under `parent`;
///  the AU root has the empty url
pub fn join(parent: &str, component: &str) -> String {
    if parent.is_empty() {
        if component.contains("://") {
            component.to_string()
        } else {
            format!("/{}", component)
        }
    } else {
        format!("{}/{}", parent, component)
    }
}

/// Canonical form of `url`, as stored in a node's `node_url`
pub fn normalize(url: &str) -> String {
    components(url)
        .iter()
        .fold(String::new(), |acc, comp| join(&acc, comp))
}
