//! Request routing — map HTTP methods and path patterns to handler functions.
//!
//! [`Router`] keeps one [`PathTree`] per method and a side table from each registered
//! pattern to its handler. Dispatch searches the tree for the request method, binds the
//! extracted parameters on the [`Context`], appends the resolved handler to the chain
//! and runs it.
//!
//! | Pattern              | Example match              | Captured params              |
//! |----------------------|----------------------------|------------------------------|
//! | `/users`             | `/users`                   | *(none)*                     |
//! | `/users/:id`         | `/users/42`                | `id → "42"`                  |
//! | `/static/*filepath`  | `/static/js/a.js`          | `filepath → "js/a.js"`       |
//!
//! Trees are only written during setup; dispatch never mutates them, so a `Router`
//! shared behind an `Arc` can serve any number of concurrent requests.

pub mod tree;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::context::{Context, Parameters};
use crate::{Method, StatusCode};

pub use tree::PathTree;

/// Type-erased handler: route handlers and middleware share this one shape.
///
/// A handler receives the request [`Context`], may write the response, and may call
/// [`Context::next`] to run the rest of the chain before continuing. Handlers are kept
/// behind an [`Arc`] so the chain can be assembled per request without copying
/// closures.
pub type HandlerFunc = Arc<dyn Fn(&mut Context) + Send + Sync + 'static>;

#[derive(Default)]
struct MethodRoutes {
    tree: PathTree,
    handlers: HashMap<String, HandlerFunc>,
}

/// Per-method routing tables.
///
/// ```
/// use std::sync::Arc;
/// use gantry::{Method, StatusCode};
/// use gantry::context::Context;
/// use gantry::router::Router;
///
/// let mut router = Router::new();
/// router.add_route(Method::Get, "/p/:lang/doc", Arc::new(|ctx: &mut Context| {
///     let lang = ctx.param("lang").to_owned();
///     ctx.string(StatusCode::Ok, lang);
/// }));
///
/// assert_eq!(router.routes(&Method::Get), vec!["/p/:lang/doc"]);
/// assert!(router.routes(&Method::Post).is_empty());
/// ```
#[derive(Default)]
pub struct Router {
    methods: HashMap<Method, MethodRoutes>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` requests matching `pattern`.
    ///
    /// Registering the same method and pattern again replaces the earlier handler.
    pub fn add_route(&mut self, method: Method, pattern: &str, handler: HandlerFunc) {
        debug!(method = %method, pattern, "route registered");
        let routes = self.methods.entry(method).or_default();
        routes.tree.insert(pattern);
        routes.handlers.insert(pattern.to_owned(), handler);
    }

    /// Finds the handler and path parameters for a request, if any route matches.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<(HandlerFunc, Parameters)> {
        let routes = self.methods.get(method)?;
        let found = routes.tree.search(path)?;
        let handler = routes.handlers.get(found.pattern)?;
        Some((Arc::clone(handler), found.params))
    }

    /// Appends the matching route handler (or the not-found handler) to the chain and
    /// runs the chain.
    pub fn handle(&self, ctx: &mut Context) {
        let resolved = self.resolve(ctx.method(), ctx.path());
        match resolved {
            Some((handler, params)) => {
                ctx.set_params(params);
                ctx.push_handler(handler);
            }
            None => ctx.push_handler(Arc::new(not_found)),
        }
        ctx.next();
    }

    /// Registered patterns for `method`, in tree traversal order.
    pub fn routes(&self, method: &Method) -> Vec<&str> {
        self.methods
            .get(method)
            .map(|routes| routes.tree.patterns())
            .unwrap_or_default()
    }

    /// Total number of distinct (method, pattern) registrations.
    pub fn len(&self) -> usize {
        self.methods.values().map(|routes| routes.handlers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn not_found(ctx: &mut Context) {
    let body = format!("{} not found", ctx.path());
    ctx.string(StatusCode::NotFound, body);
}
