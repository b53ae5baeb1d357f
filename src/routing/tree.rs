//! Compressed prefix tree (radix tree) for route lookup.
//!
//! Nodes live in an arena and refer to each other by index, so splitting a
//! label during insertion only rewrites the node in place and appends the
//! detached suffix as a new node.
//!
//! # Matching order
//! At every branch point children are tried as: static child (keyed by the
//! next byte), then the parameter child, then the wildcard child. If a more
//! specific branch dead-ends further down the path, the next branch in that
//! order is tried, so the most specific registered pattern always wins and a
//! path that matches exactly one pattern is always found.

use std::sync::Arc;

use axum::http::Method;

use crate::error::RouteError;
use crate::routing::params::Params;
use crate::routing::pattern::{self, Token};

type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Static,
    Param(Arc<str>),
    Wildcard(Arc<str>),
}

#[derive(Debug)]
struct Node<T> {
    kind: NodeKind,
    /// Literal prefix; empty for parameter and wildcard nodes.
    label: Vec<u8>,
    /// First byte of each static child, parallel to `children`.
    indices: Vec<u8>,
    children: Vec<NodeId>,
    param_child: Option<NodeId>,
    wildcard_child: Option<NodeId>,
    routes: Vec<(Method, Route<T>)>,
}

impl<T> Node<T> {
    fn new(kind: NodeKind, label: Vec<u8>) -> Self {
        Self {
            kind,
            label,
            indices: Vec::new(),
            children: Vec::new(),
            param_child: None,
            wildcard_child: None,
            routes: Vec::new(),
        }
    }

    fn route_for(&self, method: Option<&Method>) -> Option<&Route<T>> {
        match method {
            Some(method) => self
                .routes
                .iter()
                .find(|(m, _)| m == method)
                .map(|(_, r)| r),
            None => self.routes.first().map(|(_, r)| r),
        }
    }

    fn collect_methods(&self, allowed: &mut Vec<Method>) {
        for (method, _) in &self.routes {
            if !allowed.contains(method) {
                allowed.push(method.clone());
            }
        }
    }

    fn static_child(&self, first: u8) -> Option<NodeId> {
        self.indices
            .iter()
            .position(|&b| b == first)
            .map(|i| self.children[i])
    }
}

/// A registered route: the value stored for one (method, pattern) pair.
#[derive(Debug)]
pub struct Route<T> {
    pattern: Arc<str>,
    value: T,
}

impl<T> Route<T> {
    /// The pattern this route was registered with, e.g. `/users/:id`.
    pub fn pattern(&self) -> &Arc<str> {
        &self.pattern
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Details of a failed lookup, used by the fallback policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoMatch {
    /// Methods registered on the node(s) the path fully matched.
    pub allowed: Vec<Method>,
    /// Whether the path with its trailing slash toggled matches a route.
    pub tsr: bool,
}

/// Result of [`RouteTree::find`].
#[derive(Debug)]
pub enum Lookup<'t, T> {
    Matched(&'t Route<T>),
    NoMatch(NoMatch),
}

/// Radix tree keyed by path, with a per-node method map.
#[derive(Debug)]
pub struct RouteTree<T> {
    nodes: Vec<Node<T>>,
    max_params: usize,
    route_count: usize,
}

impl<T> Default for RouteTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RouteTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Static, Vec::new())],
            max_params: 0,
            route_count: 0,
        }
    }

    /// Largest parameter count of any registered pattern.
    pub fn max_params(&self) -> usize {
        self.max_params
    }

    /// Number of registered (method, pattern) pairs.
    pub fn len(&self) -> usize {
        self.route_count
    }

    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }

    /// Register `value` for `method` on `pattern`.
    ///
    /// Registering the same (method, pattern) twice replaces the earlier
    /// value. A failed insert leaves the tree as it was.
    pub fn insert(&mut self, method: Method, pattern: &str, value: T) -> Result<(), RouteError> {
        let parsed = pattern::parse(pattern)?;
        let mut splits = Vec::new();

        let mut current = ROOT;
        for token in &parsed.tokens {
            let step = match token {
                Token::Static(text) => self.insert_static(current, text.as_bytes(), pattern, &mut splits),
                Token::Param(name) => self.insert_param(current, name, pattern),
                Token::Wildcard(name) => self.insert_wildcard(current, name, pattern),
            };
            current = match step {
                Ok(next) => next,
                Err(err) => {
                    for id in splits.into_iter().rev() {
                        self.undo_split(id);
                    }
                    return Err(err);
                }
            };
        }

        let route = Route {
            pattern: Arc::from(pattern),
            value,
        };
        let node = &mut self.nodes[current];
        match node.routes.iter_mut().find(|(m, _)| *m == method) {
            Some(slot) => slot.1 = route,
            None => {
                node.routes.push((method, route));
                self.route_count += 1;
            }
        }
        self.max_params = self.max_params.max(parsed.param_count);

        Ok(())
    }

    fn push_node(&mut self, node: Node<T>) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn insert_static(
        &mut self,
        parent: NodeId,
        mut text: &[u8],
        pattern: &str,
        splits: &mut Vec<NodeId>,
    ) -> Result<NodeId, RouteError> {
        let mut id = parent;
        loop {
            if text.is_empty() {
                return Ok(id);
            }
            if self.nodes[id].wildcard_child.is_some() {
                return Err(RouteError::conflict(
                    pattern,
                    "a wildcard is already registered at this position",
                ));
            }

            match self.nodes[id].static_child(text[0]) {
                Some(child) => {
                    let common = common_prefix(&self.nodes[child].label, text);
                    if common < self.nodes[child].label.len() {
                        self.split(child, common);
                        splits.push(child);
                    }
                    text = &text[common..];
                    id = child;
                }
                None => {
                    let child = self.push_node(Node::new(NodeKind::Static, text.to_vec()));
                    let node = &mut self.nodes[id];
                    node.indices.push(text[0]);
                    node.children.push(child);
                    return Ok(child);
                }
            }
        }
    }

    fn insert_param(&mut self, parent: NodeId, name: &Arc<str>, pattern: &str) -> Result<NodeId, RouteError> {
        let node = &self.nodes[parent];
        if node.wildcard_child.is_some() {
            return Err(RouteError::conflict(
                pattern,
                format!("parameter ':{}' collides with a registered wildcard", name),
            ));
        }

        if let Some(existing) = node.param_child {
            return match &self.nodes[existing].kind {
                NodeKind::Param(current) if current == name => Ok(existing),
                NodeKind::Param(current) => Err(RouteError::conflict(
                    pattern,
                    format!("parameter ':{}' collides with ':{}'", name, current),
                )),
                _ => unreachable!("param_child always points at a parameter node"),
            };
        }

        let child = self.push_node(Node::new(NodeKind::Param(name.clone()), Vec::new()));
        self.nodes[parent].param_child = Some(child);
        Ok(child)
    }

    fn insert_wildcard(&mut self, parent: NodeId, name: &Arc<str>, pattern: &str) -> Result<NodeId, RouteError> {
        let node = &self.nodes[parent];
        if !node.children.is_empty() || node.param_child.is_some() {
            return Err(RouteError::conflict(
                pattern,
                format!("wildcard '*{}' collides with existing static or parameter routes", name),
            ));
        }

        if let Some(existing) = node.wildcard_child {
            return match &self.nodes[existing].kind {
                NodeKind::Wildcard(current) if current == name => Ok(existing),
                NodeKind::Wildcard(current) => Err(RouteError::conflict(
                    pattern,
                    format!("wildcard '*{}' collides with '*{}'", name, current),
                )),
                _ => unreachable!("wildcard_child always points at a wildcard node"),
            };
        }

        let child = self.push_node(Node::new(NodeKind::Wildcard(name.clone()), Vec::new()));
        self.nodes[parent].wildcard_child = Some(child);
        Ok(child)
    }

    /// Split the label of `id` at `at`; the suffix and everything hanging
    /// off `id` move to a new child node.
    fn split(&mut self, id: NodeId, at: usize) {
        let node = &mut self.nodes[id];
        let tail = Node {
            kind: NodeKind::Static,
            label: node.label.split_off(at),
            indices: std::mem::take(&mut node.indices),
            children: std::mem::take(&mut node.children),
            param_child: node.param_child.take(),
            wildcard_child: node.wildcard_child.take(),
            routes: std::mem::take(&mut node.routes),
        };
        let first = tail.label[0];
        let tail_id = self.push_node(tail);

        let node = &mut self.nodes[id];
        node.indices.push(first);
        node.children.push(tail_id);
    }

    /// Reverse a [`split`](Self::split) that was not followed by any
    /// other change to `id`.
    fn undo_split(&mut self, id: NodeId) {
        let node = &self.nodes[id];
        if node.children.len() != 1
            || !node.routes.is_empty()
            || node.param_child.is_some()
            || node.wildcard_child.is_some()
        {
            return;
        }
        let tail_id = node.children[0];
        if tail_id != self.nodes.len() - 1 {
            return;
        }

        let Some(tail) = self.nodes.pop() else {
            return;
        };
        let node = &mut self.nodes[id];
        node.label.extend_from_slice(&tail.label);
        node.indices = tail.indices;
        node.children = tail.children;
        node.param_child = tail.param_child;
        node.wildcard_child = tail.wildcard_child;
        node.routes = tail.routes;
    }

    /// Resolve `path` for `method`, filling `params` on success.
    pub fn find<'t>(&'t self, method: &Method, path: &str, params: &mut Params) -> Lookup<'t, T> {
        params.clear();
        let mut allowed = Vec::new();

        if let Some(route) = self.match_node(ROOT, path, 0, Some(method), params, &mut allowed) {
            return Lookup::Matched(route);
        }
        params.clear();

        let tsr = pattern::toggle_trailing_slash(path)
            .map(|toggled| self.matches_any(&toggled))
            .unwrap_or(false);

        Lookup::NoMatch(NoMatch { allowed, tsr })
    }

    /// Whether any method has a route matching `path`.
    pub fn matches_any(&self, path: &str) -> bool {
        let mut scratch = Params::new();
        let mut allowed = Vec::new();
        self.match_node(ROOT, path, 0, None, &mut scratch, &mut allowed)
            .is_some()
    }

    /// `pos` is the offset in `path` right after the text consumed by `id`.
    fn match_node<'t>(
        &'t self,
        id: NodeId,
        path: &str,
        pos: usize,
        method: Option<&Method>,
        params: &mut Params,
        allowed: &mut Vec<Method>,
    ) -> Option<&'t Route<T>> {
        let node = &self.nodes[id];
        let rest = &path.as_bytes()[pos..];

        if rest.is_empty() {
            if let Some(route) = node.route_for(method) {
                return Some(route);
            }
            node.collect_methods(allowed);
            return node
                .wildcard_child
                .and_then(|w| self.capture_wildcard(w, path, pos, method, params, allowed));
        }

        if let Some(child) = node.static_child(rest[0]) {
            let label = &self.nodes[child].label;
            if rest.starts_with(label) {
                let found = self.match_node(child, path, pos + label.len(), method, params, allowed);
                if found.is_some() {
                    return found;
                }
            }
        }

        if let Some(param) = node.param_child {
            let end = rest.iter().position(|&b| b == b'/').unwrap_or(rest.len());
            if end > 0 {
                let saved = params.len();
                if let NodeKind::Param(name) = &self.nodes[param].kind {
                    params.push(name.clone(), &path[pos..pos + end]);
                }
                let found = self.match_node(param, path, pos + end, method, params, allowed);
                if found.is_some() {
                    return found;
                }
                params.truncate(saved);
            }
        }

        node.wildcard_child
            .and_then(|w| self.capture_wildcard(w, path, pos, method, params, allowed))
    }

    fn capture_wildcard<'t>(
        &'t self,
        id: NodeId,
        path: &str,
        pos: usize,
        method: Option<&Method>,
        params: &mut Params,
        allowed: &mut Vec<Method>,
    ) -> Option<&'t Route<T>> {
        let node = &self.nodes[id];
        match node.route_for(method) {
            Some(route) => {
                if let NodeKind::Wildcard(name) = &node.kind {
                    params.push(name.clone(), &path[pos..]);
                }
                Some(route)
            }
            None => {
                node.collect_methods(allowed);
                None
            }
        }
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        for (id, node) in self.nodes.iter().enumerate() {
            assert_eq!(node.indices.len(), node.children.len());
            let mut seen = node.indices.clone();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), node.indices.len(), "static child keys must be unique");

            if let Some(w) = node.wildcard_child {
                assert!(node.children.is_empty() && node.param_child.is_none());
                let wildcard = &self.nodes[w];
                assert!(wildcard.children.is_empty() && wildcard.param_child.is_none());
            }
            let compressible = id != ROOT && node.kind == NodeKind::Static;
            if compressible
                && node.routes.is_empty()
                && node.param_child.is_none()
                && node.wildcard_child.is_none()
            {
                assert_ne!(node.children.len(), 1, "non-terminal node with a single static child");
            }
        }
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(routes: &[(Method, &'static str)]) -> RouteTree<&'static str> {
        let mut tree = RouteTree::new();
        for (method, pattern) in routes {
            tree.insert(method.clone(), pattern, *pattern).unwrap();
        }
        tree.check_invariants();
        tree
    }

    fn lookup(tree: &RouteTree<&'static str>, method: Method, path: &str) -> Option<(&'static str, Vec<(String, String)>)> {
        let mut params = Params::new();
        match tree.find(&method, path, &mut params) {
            Lookup::Matched(route) => Some((
                *route.value(),
                params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            )),
            Lookup::NoMatch(_) => None,
        }
    }

    fn no_match(tree: &RouteTree<&'static str>, method: Method, path: &str) -> NoMatch {
        let mut params = Params::new();
        match tree.find(&method, path, &mut params) {
            Lookup::Matched(route) => panic!("unexpected match: {}", route.pattern()),
            Lookup::NoMatch(details) => details,
        }
    }

    #[test]
    fn test_static_routes_with_shared_prefixes() {
        let t = tree(&[
            (Method::GET, "/"),
            (Method::GET, "/cmd"),
            (Method::GET, "/contact"),
            (Method::GET, "/co"),
            (Method::GET, "/c"),
            (Method::GET, "/a"),
        ]);

        for path in ["/", "/cmd", "/contact", "/co", "/c", "/a"] {
            assert_eq!(lookup(&t, Method::GET, path).map(|m| m.0), Some(path));
        }
        assert!(lookup(&t, Method::GET, "/con").is_none());
        assert!(lookup(&t, Method::GET, "/cm").is_none());
        assert!(lookup(&t, Method::GET, "/b").is_none());
    }

    #[test]
    fn test_static_beats_param() {
        let t = tree(&[(Method::GET, "/users/:id"), (Method::GET, "/users/admin")]);

        let (route, params) = lookup(&t, Method::GET, "/users/admin").unwrap();
        assert_eq!(route, "/users/admin");
        assert!(params.is_empty());

        let (route, params) = lookup(&t, Method::GET, "/users/bob").unwrap();
        assert_eq!(route, "/users/:id");
        assert_eq!(params, vec![("id".to_string(), "bob".to_string())]);
    }

    #[test]
    fn test_param_rejects_empty_segment() {
        let t = tree(&[(Method::GET, "/users/:id")]);
        assert!(lookup(&t, Method::GET, "/users/").is_none());
        assert!(lookup(&t, Method::GET, "/users/1/extra").is_none());
    }

    #[test]
    fn test_params_in_pattern_order() {
        let t = tree(&[(Method::GET, "/repos/:owner/:repo/issues/:number")]);
        let (_, params) = lookup(&t, Method::GET, "/repos/rust-lang/rust/issues/42").unwrap();
        let keys: Vec<_> = params.iter().map(|(k, _)| k.as_str()).collect();
        let values: Vec<_> = params.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(keys, ["owner", "repo", "number"]);
        assert_eq!(values, ["rust-lang", "rust", "42"]);
        assert_eq!(t.max_params(), 3);
    }

    #[test]
    fn test_wildcard_captures_rest() {
        let t = tree(&[(Method::GET, "/files/*rest"), (Method::GET, "/files")]);

        let (route, params) = lookup(&t, Method::GET, "/files/a/b/c").unwrap();
        assert_eq!(route, "/files/*rest");
        assert_eq!(params, vec![("rest".to_string(), "a/b/c".to_string())]);

        let (_, params) = lookup(&t, Method::GET, "/files/").unwrap();
        assert_eq!(params, vec![("rest".to_string(), String::new())]);

        assert_eq!(lookup(&t, Method::GET, "/files").map(|m| m.0), Some("/files"));
    }

    #[test]
    fn test_param_beats_wildcard_at_deeper_level() {
        let t = tree(&[(Method::GET, "/src/:file"), (Method::GET, "/src/:file/*rest")]);
        assert_eq!(lookup(&t, Method::GET, "/src/main.rs").map(|m| m.0), Some("/src/:file"));
        let (route, params) = lookup(&t, Method::GET, "/src/lib/a/b").unwrap();
        assert_eq!(route, "/src/:file/*rest");
        assert_eq!(params[1], ("rest".to_string(), "a/b".to_string()));
    }

    #[test]
    fn test_falls_back_to_param_when_static_branch_dead_ends() {
        let t = tree(&[
            (Method::GET, "/users/admin/settings"),
            (Method::GET, "/users/:id/profile"),
        ]);

        let (route, params) = lookup(&t, Method::GET, "/users/admin/profile").unwrap();
        assert_eq!(route, "/users/:id/profile");
        assert_eq!(params, vec![("id".to_string(), "admin".to_string())]);
        assert_eq!(
            lookup(&t, Method::GET, "/users/admin/settings").map(|m| m.0),
            Some("/users/admin/settings")
        );
    }

    #[test]
    fn test_split_preserves_existing_routes() {
        let t = tree(&[
            (Method::GET, "/search/"),
            (Method::GET, "/support"),
            (Method::GET, "/search/:query"),
            (Method::GET, "/s"),
        ]);

        assert_eq!(lookup(&t, Method::GET, "/search/").map(|m| m.0), Some("/search/"));
        assert_eq!(lookup(&t, Method::GET, "/support").map(|m| m.0), Some("/support"));
        assert_eq!(lookup(&t, Method::GET, "/s").map(|m| m.0), Some("/s"));
        assert_eq!(
            lookup(&t, Method::GET, "/search/rust").map(|m| m.0),
            Some("/search/:query")
        );
    }

    #[test]
    fn test_multibyte_labels() {
        let t = tree(&[(Method::GET, "/caf\u{e9}"), (Method::GET, "/caf\u{e8}/:x")]);
        assert_eq!(lookup(&t, Method::GET, "/caf\u{e9}").map(|m| m.0), Some("/caf\u{e9}"));
        let (_, params) = lookup(&t, Method::GET, "/caf\u{e8}/ol\u{e9}").unwrap();
        assert_eq!(params[0].1, "ol\u{e9}");
    }

    #[test]
    fn test_reinsert_replaces_value() {
        let mut t = RouteTree::new();
        t.insert(Method::GET, "/a", "first").unwrap();
        t.insert(Method::GET, "/a", "second").unwrap();

        let mut params = Params::new();
        match t.find(&Method::GET, "/a", &mut params) {
            Lookup::Matched(route) => assert_eq!(*route.value(), "second"),
            Lookup::NoMatch(_) => panic!("expected a match"),
        }
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_wildcard_conflicts() {
        let mut t = RouteTree::new();
        t.insert(Method::GET, "/files/*rest", ()).unwrap();

        assert!(matches!(
            t.insert(Method::GET, "/files/new", ()),
            Err(RouteError::ConflictingRoute { .. })
        ));
        assert!(matches!(
            t.insert(Method::GET, "/files/:name", ()),
            Err(RouteError::ConflictingRoute { .. })
        ));
        assert!(matches!(
            t.insert(Method::POST, "/files/*path", ()),
            Err(RouteError::ConflictingRoute { .. })
        ));
        t.insert(Method::POST, "/files/*rest", ()).unwrap();
        t.check_invariants();
    }

    #[test]
    fn test_wildcard_after_static_conflicts_and_rolls_back() {
        let mut t = RouteTree::new();
        t.insert(Method::GET, "/files/readme", "readme").unwrap();
        let nodes_before = t.nodes.len();

        assert!(matches!(
            t.insert(Method::GET, "/files/*rest", "rest"),
            Err(RouteError::ConflictingRoute { .. })
        ));
        assert_eq!(t.nodes.len(), nodes_before);
        t.check_invariants();

        let mut params = Params::new();
        assert!(matches!(
            t.find(&Method::GET, "/files/readme", &mut params),
            Lookup::Matched(_)
        ));
    }

    #[test]
    fn test_param_name_conflict() {
        let mut t = RouteTree::new();
        t.insert(Method::GET, "/users/:id", ()).unwrap();
        assert!(matches!(
            t.insert(Method::DELETE, "/users/:name", ()),
            Err(RouteError::ConflictingRoute { .. })
        ));
        t.insert(Method::DELETE, "/users/:id", ()).unwrap();
    }

    #[test]
    fn test_allowed_methods_reported() {
        let t = tree(&[(Method::GET, "/widgets"), (Method::POST, "/widgets")]);
        let details = no_match(&t, Method::DELETE, "/widgets");
        assert_eq!(details.allowed, vec![Method::GET, Method::POST]);
        assert!(!details.tsr);

        let details = no_match(&t, Method::DELETE, "/gadgets");
        assert!(details.allowed.is_empty());
    }

    #[test]
    fn test_trailing_slash_recommendation() {
        let t = tree(&[(Method::GET, "/foo"), (Method::GET, "/bar/"), (Method::GET, "/u/:id")]);

        assert!(no_match(&t, Method::GET, "/foo/").tsr);
        assert!(no_match(&t, Method::POST, "/foo/").tsr);
        assert!(no_match(&t, Method::GET, "/bar").tsr);
        assert!(no_match(&t, Method::GET, "/u/7/").tsr);
        assert!(!no_match(&t, Method::GET, "/baz").tsr);
        assert!(!no_match(&t, Method::GET, "/u/").tsr);
    }
}
