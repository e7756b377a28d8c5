//! The engine — route groups, middleware resolution, and the dispatch entry point.
//!
//! An [`Engine`] owns the [`Router`] and a flat, ordered list of every route group
//! ever created, starting with the root group (empty prefix). Groups are addressed
//! through short-lived [`RouterGroup`] handles that borrow the engine during setup:
//!
//! ```rust
//! use gantry::{Context, Engine, StatusCode};
//!
//! let mut engine = Engine::with_defaults();
//! engine.get("/", |ctx: &mut Context| ctx.string(StatusCode::Ok, "Hello"));
//!
//! let mut users = engine.group("/users");
//! users.use_middleware(|ctx: &mut Context| {
//!     ctx.set_header("X-Group", "users");
//!     ctx.next();
//! });
//! users.get("/check/:username", |ctx: &mut Context| {
//!     let name = ctx.param("username").to_owned();
//!     ctx.string(StatusCode::Ok, name);
//! });
//! ```
//!
//! When a request arrives, every group whose prefix the request path starts with
//! contributes its middleware to the chain, in group creation order, and the matched
//! route handler runs last.

mod static_files;

use std::path::PathBuf;
use std::sync::Arc;

use crate::context::Context;
use crate::middleware::{logger, recovery};
use crate::render::TemplateRenderer;
use crate::router::{HandlerFunc, Router};
use crate::server::{Server, ServerError};
use crate::{Method, Request, Response};

const ROOT_GROUP: usize = 0;

struct Group {
    // Parent prefixes already folded in.
    prefix: String,
    middlewares: Vec<HandlerFunc>,
}

/// The top-level application object.
///
/// Built mutably during setup, then shared immutably (typically behind an `Arc`)
/// while serving. Several engines can coexist; nothing is global.
pub struct Engine {
    router: Router,
    groups: Vec<Group>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with no routes and no middleware.
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            groups: vec![Group {
                prefix: String::new(),
                middlewares: Vec::new(),
            }],
            renderer: None,
        }
    }

    /// An engine with [`Logger`](crate::middleware::Logger) and
    /// [`Recovery`](crate::middleware::Recovery) installed on the root group, in that
    /// order.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.use_middleware(logger()).use_middleware(recovery());
        engine
    }

    /// Creates a group whose prefix is `prefix` under the root.
    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        let index = self.create_group(ROOT_GROUP, prefix);
        RouterGroup {
            engine: self,
            index,
        }
    }

    /// Handle to the root group.
    pub fn root(&mut self) -> RouterGroup<'_> {
        RouterGroup {
            engine: self,
            index: ROOT_GROUP,
        }
    }

    /// Adds middleware to the root group, so it applies to every request.
    pub fn use_middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.root().use_middleware(middleware);
        self
    }

    pub fn add_route<F>(&mut self, method: Method, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.root().add_route(method, pattern, handler);
        self
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::Get, pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::Post, pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::Put, pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::Delete, pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::Patch, pattern, handler)
    }

    /// Serves files under `root` at `relative_path/*filepath`.
    pub fn static_files(&mut self, relative_path: &str, root: impl Into<PathBuf>) -> &mut Self {
        self.root().static_files(relative_path, root);
        self
    }

    /// Installs the renderer used by [`Context::html`].
    pub fn set_renderer(&mut self, renderer: impl TemplateRenderer) -> &mut Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Registered patterns for `method`.
    pub fn routes(&self, method: &Method) -> Vec<&str> {
        self.router.routes(method)
    }

    /// Dispatches one request and returns the response the chain produced.
    ///
    /// Builds the [`Context`], collects the middleware of every group whose prefix
    /// the path starts with, resolves the route handler and runs the chain. A panic
    /// in a handler not covered by [`Recovery`](crate::middleware::Recovery)
    /// propagates to the caller.
    pub fn serve(&self, request: Request) -> Response {
        let mut ctx = Context::new(request).with_renderer(self.renderer.clone());
        let middlewares = self.middlewares_for(ctx.path());
        ctx.push_handlers(middlewares);
        self.router.handle(&mut ctx);
        ctx.into_response()
    }

    /// Binds `addr` and serves requests until the listener fails.
    pub async fn run(self, addr: impl AsRef<str>) -> Result<(), ServerError> {
        Server::bind(addr).await?.serve(Arc::new(self)).await
    }

    fn middlewares_for(&self, path: &str) -> Vec<HandlerFunc> {
        self.groups
            .iter()
            .filter(|group| path.starts_with(&group.prefix))
            .flat_map(|group| group.middlewares.iter().cloned())
            .collect()
    }

    fn create_group(&mut self, parent: usize, prefix: &str) -> usize {
        let prefix = format!("{}{}", self.groups[parent].prefix, prefix);
        self.groups.push(Group {
            prefix,
            middlewares: Vec::new(),
        });
        self.groups.len() - 1
    }
}

/// A prefix-scoped view of the engine used to register routes and middleware.
///
/// Routes registered here get the group's prefix prepended. Middleware added here
/// runs for every request whose path starts with the prefix, whether or not the
/// matched route was registered through this group.
pub struct RouterGroup<'e> {
    engine: &'e mut Engine,
    index: usize,
}

impl RouterGroup<'_> {
    /// The full prefix, including every ancestor's.
    pub fn prefix(&self) -> &str {
        &self.engine.groups[self.index].prefix
    }

    /// Creates a nested group whose prefix extends this one.
    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        let index = self.engine.create_group(self.index, prefix);
        RouterGroup {
            engine: &mut *self.engine,
            index,
        }
    }

    pub fn use_middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.engine.groups[self.index]
            .middlewares
            .push(Arc::new(middleware));
        self
    }

    pub fn add_route<F>(&mut self, method: Method, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        let pattern = format!("{}{}", self.prefix(), pattern);
        self.engine
            .router
            .add_route(method, &pattern, Arc::new(handler));
        self
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::Get, pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::Post, pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::Put, pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::Delete, pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::Patch, pattern, handler)
    }

    /// Serves files under `root` for `GET <prefix><relative_path>/*filepath`.
    ///
    /// Paths containing `..` and files that do not exist get a 404.
    pub fn static_files(&mut self, relative_path: &str, root: impl Into<PathBuf>) -> &mut Self {
        let pattern = format!("{}/*filepath", relative_path.trim_end_matches('/'));
        self.get(&pattern, static_files::serve_dir(root.into()))
    }
}
