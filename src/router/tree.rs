//! Segment trie used to resolve a request path to a registered pattern.
//!
//! One [`PathTree`] exists per HTTP method. Nodes live in a flat arena and refer to
//! their children by index, so the tree has no owning links between nodes.
//!
//! Matching rules:
//!
//! | Segment     | Matches                                  | Binds                         |
//! |-------------|------------------------------------------|-------------------------------|
//! | `doc`       | exactly `doc`                            | *(nothing)*                   |
//! | `:lang`     | any single segment                       | `lang → segment`              |
//! | `*filepath` | the rest of the path, one or more parts  | `filepath → "js/a.js"`        |
//!
//! There is no priority between literal and parameter children: siblings are tried in
//! the order they were created and the first branch that reaches a registered pattern
//! wins.

use percent_encoding::percent_decode_str;

use crate::context::Parameters;

// Index into `PathTree::nodes`.
type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Default)]
struct Node {
    // Full registered pattern if this node terminates a route, empty otherwise.
    pattern: String,
    part: String,
    children: Vec<NodeId>,
    is_wild: bool,
}

impl Node {
    fn new(part: &str) -> Self {
        Self {
            pattern: String::new(),
            part: part.to_owned(),
            children: Vec::new(),
            is_wild: part.starts_with(':') || part.starts_with('*'),
        }
    }
}

/// Splits a path or pattern into its non-empty segments.
///
/// Repeated slashes are collapsed. The first segment starting with `*` ends the
/// list, since a wildcard absorbs everything after it.
///
/// ```
/// use gantry::router::tree::split_segments;
///
/// assert_eq!(split_segments("//p/:lang//doc/"), vec!["p", ":lang", "doc"]);
/// assert_eq!(split_segments("/static/*filepath/ignored"), vec!["static", "*filepath"]);
/// ```
pub fn split_segments(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        parts.push(part);
        if part.starts_with('*') {
            break;
        }
    }
    parts
}

/// The outcome of a successful [`PathTree::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<'t> {
    /// The registered pattern that matched.
    pub pattern: &'t str,
    pub params: Parameters,
}

/// Routing trie for a single HTTP method.
///
/// ```
/// use gantry::router::tree::PathTree;
///
/// let mut tree = PathTree::new();
/// tree.insert("/p/:lang/doc");
/// tree.insert("/static/*filepath");
///
/// let m = tree.search("/p/go/doc").unwrap();
/// assert_eq!(m.pattern, "/p/:lang/doc");
/// assert_eq!(m.params.get("lang"), Some("go"));
///
/// let m = tree.search("/static/js/a.js").unwrap();
/// assert_eq!(m.params.get("filepath"), Some("js/a.js"));
///
/// assert!(tree.search("/p/go").is_none());
/// ```
#[derive(Debug)]
pub struct PathTree {
    nodes: Vec<Node>,
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PathTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }

    /// Registers `pattern`.
    ///
    /// Walking down from the root, each segment reuses the first child that either has
    /// the same text or is a parameter/wildcard node; otherwise a new child is appended.
    /// The node reached after the last segment records `pattern`, overwriting whatever
    /// pattern it held before. Conflicting registrations are not reported.
    pub fn insert(&mut self, pattern: &str) {
        let mut current = ROOT;
        for part in split_segments(pattern) {
            current = match self.match_child(current, part) {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::new(part));
                    self.nodes[current].children.push(child);
                    child
                }
            };
        }
        self.nodes[current].pattern = pattern.to_owned();
    }

    /// Resolves a concrete request path, extracting parameters on success.
    ///
    /// Returns `None` when no registered pattern matches; this is not an error.
    pub fn search(&self, path: &str) -> Option<Match<'_>> {
        let parts = split_segments(path);
        let node = self.find(ROOT, &parts, 0)?;
        let pattern = self.nodes[node].pattern.as_str();
        Some(Match {
            pattern,
            params: extract_params(pattern, &parts),
        })
    }

    /// Every registered pattern, depth first with children in insertion order.
    pub fn patterns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.travel(ROOT, &mut out);
        out
    }

    #[cfg(test)]
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // Depth-first search with backtracking over every child that could match `parts[height]`.
    fn find(&self, id: NodeId, parts: &[&str], height: usize) -> Option<NodeId> {
        let node = &self.nodes[id];
        if parts.len() == height || node.part.starts_with('*') {
            return (!node.pattern.is_empty()).then_some(id);
        }

        let part = parts[height];
        node.children
            .iter()
            .copied()
            .filter(|&child| self.accepts(child, part))
            .find_map(|child| self.find(child, parts, height + 1))
    }

    fn match_child(&self, id: NodeId, part: &str) -> Option<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .find(|&child| self.accepts(child, part))
    }

    fn accepts(&self, id: NodeId, part: &str) -> bool {
        let node = &self.nodes[id];
        node.part == part || node.is_wild
    }

    fn travel<'t>(&'t self, id: NodeId, out: &mut Vec<&'t str>) {
        let node = &self.nodes[id];
        if !node.pattern.is_empty() {
            out.push(node.pattern.as_str());
        }
        for &child in &node.children {
            self.travel(child, out);
        }
    }
}

// Binds `:name` and `*name` segments of `pattern` against the request's segments.
// Values are percent-decoded after matching, so an encoded `/` never splits a segment.
fn extract_params(pattern: &str, parts: &[&str]) -> Parameters {
    let mut params = Parameters::new();
    for (index, segment) in split_segments(pattern).into_iter().enumerate() {
        if let Some(name) = segment.strip_prefix(':') {
            if let Some(value) = parts.get(index) {
                params.insert(name, decode(value));
            }
        } else if let Some(name) = segment.strip_prefix('*') {
            if !name.is_empty() {
                let rest = parts.get(index..).unwrap_or_default().join("/");
                params.insert(name, decode(&rest));
            }
            break;
        }
    }
    params
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(patterns: &[&str]) -> PathTree {
        let mut t = PathTree::new();
        for p in patterns {
            t.insert(p);
        }
        t
    }

    #[test]
    fn split_drops_empty_segments() {
        assert!(split_segments("/").is_empty());
        assert!(split_segments("").is_empty());
        assert_eq!(split_segments("/a//b/"), vec!["a", "b"]);
    }

    #[test]
    fn root_pattern() {
        let t = tree(&["/"]);
        assert_eq!(t.search("/").unwrap().pattern, "/");
        assert!(t.search("/x").is_none());
    }

    #[test]
    fn empty_tree_matches_nothing() {
        let t = PathTree::new();
        assert!(t.search("/").is_none());
        assert!(t.search("/a/b").is_none());
    }

    #[test]
    fn literal_routes() {
        let t = tree(&["/users/login", "/users/userInfo"]);
        assert_eq!(t.search("/users/login").unwrap().pattern, "/users/login");
        assert_eq!(t.search("/users/userInfo").unwrap().pattern, "/users/userInfo");
        assert!(t.search("/users").is_none());
        assert!(t.search("/users/logout").is_none());
    }

    #[test]
    fn named_parameter() {
        let t = tree(&["/p/:lang/doc"]);
        let m = t.search("/p/go/doc").unwrap();
        assert_eq!(m.pattern, "/p/:lang/doc");
        assert_eq!(m.params.get("lang"), Some("go"));
        assert_eq!(t.search("/p/c/doc").unwrap().params.get("lang"), Some("c"));
    }

    #[test]
    fn wildcard_captures_remaining_path() {
        let t = tree(&["/static/*filepath"]);
        let m = t.search("/static/js/a.js").unwrap();
        assert_eq!(m.pattern, "/static/*filepath");
        assert_eq!(m.params.get("filepath"), Some("js/a.js"));
        assert_eq!(t.search("/static/fav.ico").unwrap().params.get("filepath"), Some("fav.ico"));
    }

    #[test]
    fn wildcard_needs_at_least_one_segment() {
        let t = tree(&["/static/*filepath"]);
        assert!(t.search("/static").is_none());
        assert!(t.search("/static/").is_none());
    }

    #[test]
    fn anonymous_wildcard_binds_nothing() {
        let t = tree(&["/files/*"]);
        let m = t.search("/files/a/b").unwrap();
        assert_eq!(m.pattern, "/files/*");
        assert!(m.params.is_empty());
    }

    #[test]
    fn segments_after_wildcard_are_ignored_at_insert() {
        let t = tree(&["/assets/*path/more"]);
        let m = t.search("/assets/x/y/z").unwrap();
        assert_eq!(m.pattern, "/assets/*path/more");
        assert_eq!(m.params.get("path"), Some("x/y/z"));
    }

    #[test]
    fn segment_count_mismatch_is_no_match() {
        let t = tree(&["/users/check/:username"]);
        assert_eq!(
            t.search("/users/check/jack").unwrap().params.get("username"),
            Some("jack")
        );
        assert!(t.search("/users/check/jack/extra").is_none());
        assert!(t.search("/users/check").is_none());
    }

    #[test]
    fn captured_values_are_percent_decoded() {
        let t = tree(&["/users/check/:username", "/static/*filepath"]);
        let m = t.search("/users/check/j%C3%BCrgen%20x").unwrap();
        assert_eq!(m.params.get("username"), Some("jürgen x"));

        let m = t.search("/static/my%20docs/a%2Fb.txt").unwrap();
        assert_eq!(m.params.get("filepath"), Some("my docs/a/b.txt"));
    }

    #[test]
    fn encoded_slash_stays_inside_one_segment() {
        let t = tree(&["/files/:name"]);
        assert_eq!(t.search("/files/a%2Fb").unwrap().params.get("name"), Some("a/b"));
    }

    #[test]
    fn repeated_slashes_in_request_path() {
        let t = tree(&["/a/:b"]);
        assert_eq!(t.search("//a///x/").unwrap().params.get("b"), Some("x"));
    }

    #[test]
    fn backtracks_into_later_siblings() {
        let t = tree(&["/users/login/end", "/users/:action/tail"]);
        let m = t.search("/users/login/tail").unwrap();
        assert_eq!(m.pattern, "/users/:action/tail");
        assert_eq!(m.params.get("action"), Some("login"));
        assert_eq!(t.search("/users/login/end").unwrap().pattern, "/users/login/end");
    }

    #[test]
    fn first_created_sibling_wins() {
        let t = tree(&["/users/login", "/users/:action"]);
        assert_eq!(t.search("/users/login").unwrap().pattern, "/users/login");
        let m = t.search("/users/logout").unwrap();
        assert_eq!(m.pattern, "/users/:action");
        assert_eq!(m.params.get("action"), Some("logout"));
    }

    #[test]
    fn parameter_child_absorbs_later_literal_registration() {
        // Insertion reuses an existing wild child for any segment, so the literal route
        // overwrites the pattern recorded on the ":id" node.
        let t = tree(&["/users/:id", "/users/login"]);
        assert_eq!(t.node_count(), 3);
        assert_eq!(t.patterns(), vec!["/users/login"]);
        let m = t.search("/users/42").unwrap();
        assert_eq!(m.pattern, "/users/login");
        assert!(m.params.is_empty());
    }

    #[test]
    fn insertion_is_idempotent() {
        let mut t = tree(&["/p/:lang/doc", "/static/*filepath"]);
        let nodes = t.node_count();
        t.insert("/p/:lang/doc");
        assert_eq!(t.node_count(), nodes);
        assert_eq!(t.patterns(), vec!["/p/:lang/doc", "/static/*filepath"]);
        assert_eq!(t.search("/p/rust/doc").unwrap().params.get("lang"), Some("rust"));
    }

    #[test]
    fn traversal_lists_termini_depth_first() {
        let t = tree(&["/", "/hello/:name", "/hello/b/c", "/assets/*filepath", "/hello"]);
        assert_eq!(
            t.patterns(),
            vec!["/", "/hello", "/hello/:name", "/hello/b/c", "/assets/*filepath"]
        );
    }

    #[test]
    fn intermediate_nodes_are_not_termini() {
        let t = tree(&["/a/b/c"]);
        assert!(t.search("/a").is_none());
        assert!(t.search("/a/b").is_none());
    }

    #[test]
    fn every_registered_pattern_round_trips() {
        let patterns = [
            "/",
            "/hello",
            "/p/:lang/doc",
            "/users/check/:username",
            "/static/*filepath",
            "/v1/:org/repos/:repo",
        ];
        let t = tree(&patterns);
        let cases = [
            ("/", "/"),
            ("/hello", "/hello"),
            ("/p/zig/doc", "/p/:lang/doc"),
            ("/users/check/mike", "/users/check/:username"),
            ("/static/css/site/main.css", "/static/*filepath"),
            ("/v1/acme/repos/gantry", "/v1/:org/repos/:repo"),
        ];
        for (path, pattern) in cases {
            assert_eq!(t.search(path).map(|m| m.pattern), Some(pattern), "path {path}");
        }
        let m = t.search("/v1/acme/repos/gantry").unwrap();
        assert_eq!(m.params.get("org"), Some("acme"));
        assert_eq!(m.params.get("repo"), Some("gantry"));
    }
}
