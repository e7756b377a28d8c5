//! Middleware — handlers that wrap the rest of the chain.
//!
//! Middleware in this crate has exactly the shape of a route handler: a function of
//! `&mut Context`. What makes it middleware is calling [`Context::next`] somewhere in
//! its body, which runs everything downstream at that point:
//!
//! - **Pass through**: call `ctx.next()` and do nothing else.
//! - **Short-circuit**: call [`Context::fail`] or [`Context::abort`] instead of `next`.
//! - **Decorate**: call `ctx.next()`, then inspect or adjust the finished response.
//!
//! Stateful middleware can implement the [`Middleware`] trait and be turned into a
//! handler with [`from_middleware`]. Two are built in: [`Logger`] and [`Recovery`].

mod logger;
mod recovery;

use std::sync::Arc;

use crate::context::Context;

pub use logger::{Logger, logger};
pub use recovery::{Recovery, recovery};

/// Trait for middleware that carries its own configuration or state.
///
/// Implementations are shared across every request the engine serves, so they must be
/// `Send + Sync` and should keep per-request data on the [`Context`], not on `self`.
///
/// ```rust
/// use std::sync::Arc;
/// use gantry::{Context, Engine, StatusCode};
/// use gantry::middleware::{Middleware, from_middleware};
///
/// struct RequireHeader(&'static str);
///
/// impl Middleware for RequireHeader {
///     fn handle(&self, ctx: &mut Context) {
///         if ctx.request().headers().contains(self.0) {
///             ctx.next();
///         } else {
///             ctx.fail(StatusCode::Unauthorized, format!("missing {}", self.0));
///         }
///     }
/// }
///
/// let mut engine = Engine::new();
/// engine.use_middleware(from_middleware(Arc::new(RequireHeader("Authorization"))));
/// ```
pub trait Middleware: Send + Sync {
    /// Handles the request, calling [`Context::next`] to run the downstream handlers.
    fn handle(&self, ctx: &mut Context);
}

/// Adapts a [`Middleware`] into a function that can be registered on a group.
pub fn from_middleware<M>(middleware: Arc<M>) -> impl Fn(&mut Context) + Send + Sync + 'static
where
    M: Middleware + 'static,
{
    move |ctx: &mut Context| middleware.handle(ctx)
}
