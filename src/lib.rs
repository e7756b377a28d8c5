//! # gantry
//!
//! A small HTTP/1.1 framework built around a segment trie router and onion-layered,
//! prefix-scoped middleware.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gantry::{Context, Engine, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = Engine::with_defaults();
//!     engine.get("/", |ctx: &mut Context| ctx.string(StatusCode::Ok, "Hello, World!"));
//!     engine
//!         .group("/users")
//!         .get("/check/:username", |ctx: &mut Context| {
//!             let name = ctx.param("username").to_owned();
//!             ctx.string(StatusCode::Ok, format!("checked {name}"));
//!         });
//!
//!     engine.run("127.0.0.1:9000").await?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod engine;
pub mod http;
pub mod middleware;
pub mod render;
pub mod router;
pub mod server;

pub use context::{Context, Parameters};
pub use engine::{Engine, RouterGroup};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{HandlerFunc, Router};
pub use server::{Server, ServerConfig, ServerError};
