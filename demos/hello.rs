//! Demo application: greeting, panic recovery, grouped user routes, and dynamic params.
//!
//! Run with `RUST_LOG=debug cargo run --example hello` and try:
//!
//! ```text
//! curl localhost:9000/
//! curl localhost:9000/panic
//! curl -d username=cjm localhost:9000/users/login
//! curl 'localhost:9000/users/userInfo?username=cjm&age=18'
//! curl localhost:9000/users/check/jack
//! ```

use gantry::{Context, Engine, StatusCode};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut app = Engine::with_defaults();
    app.get("/", |ctx: &mut Context| ctx.string(StatusCode::Ok, "Hello, it is gantry!"));
    app.get("/panic", |ctx: &mut Context| {
        let names = ["cjm"];
        let index = ctx.path().len() * 100;
        ctx.string(StatusCode::Ok, names[index]);
    });

    let mut users = app.group("/users");
    users
        .post("/login", |ctx: &mut Context| {
            let body = json!({
                "code": 200,
                "msg": "login successfully",
                "data": ctx.post_form("username"),
            });
            ctx.json(StatusCode::Ok, &body);
        })
        .get("/userInfo", |ctx: &mut Context| {
            let body = json!({
                "username": ctx.query("username"),
                "age": ctx.query("age"),
            });
            ctx.json(StatusCode::Ok, &body);
        })
        .get("/check/:username", |ctx: &mut Context| {
            let body = json!({
                "code": 200,
                "msg": "checked",
                "username": ctx.param("username"),
            });
            ctx.json(StatusCode::Ok, &body);
        });

    app.run("127.0.0.1:9000").await?;
    Ok(())
}
