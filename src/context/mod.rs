//! Per-request context — the handler chain, its cursor, and the response being built.
//!
//! A [`Context`] is created for every inbound request and discarded once the response
//! has been handed back to the transport. It owns:
//!
//! - the parsed [`Request`] and the path [`Parameters`] extracted by the router,
//! - the ordered handler chain (group middleware first, the route handler last) and a
//!   cursor into it,
//! - the [`Response`] that handlers write into.
//!
//! ## The `next` protocol
//!
//! [`Context::next`] runs the remaining handlers in order. A middleware that calls
//! `next` from inside its own body runs the rest of the chain at that point, then
//! continues with its own code once they return:
//!
//! ```text
//! A before ─▶ B before ─▶ H ─▶ B after ─▶ A after
//! ```
//!
//! Handlers that never call `next` are still followed by the rest of the chain, since
//! the loop driving `next` keeps advancing the shared cursor. [`Context::abort`] moves
//! the cursor past the end so nothing further runs.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::http::request::decode_pairs;
use crate::render::{RenderError, TemplateRenderer};
use crate::router::HandlerFunc;
use crate::{Method, Request, Response, StatusCode};

/// Path parameters extracted from the matched route.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Per-request state threaded through the handler chain.
pub struct Context {
    request: Request,
    params: Parameters,
    form: HashMap<String, String>,
    response: Response,
    handlers: Vec<HandlerFunc>,
    // Position of the next handler to run; `handlers.len()` or more means finished.
    index: usize,
    aborted: bool,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl Context {
    /// Creates a context for `request` with an empty chain and a `200 OK` response.
    pub fn new(request: Request) -> Self {
        let form = if request.is_urlencoded_form() {
            decode_pairs(&String::from_utf8_lossy(request.body()))
        } else {
            HashMap::new()
        };
        Self {
            request,
            params: Parameters::new(),
            form,
            response: Response::new(StatusCode::Ok),
            handlers: Vec::new(),
            index: 0,
            aborted: false,
            renderer: None,
        }
    }

    pub(crate) fn with_renderer(mut self, renderer: Option<Arc<dyn TemplateRenderer>>) -> Self {
        self.renderer = renderer;
        self
    }

    pub(crate) fn push_handlers(&mut self, handlers: impl IntoIterator<Item = HandlerFunc>) {
        self.handlers.extend(handlers);
    }

    pub(crate) fn push_handler(&mut self, handler: HandlerFunc) {
        self.handlers.push(handler);
    }

    pub(crate) fn set_params(&mut self, params: Parameters) {
        self.params = params;
    }

    // Drops headers and body written so far.
    pub(crate) fn reset_response(&mut self) {
        self.response = Response::new(StatusCode::Ok);
    }

    /// Runs the remaining handlers in the chain.
    ///
    /// Calling this from a middleware runs everything downstream before returning, so
    /// code placed after the call observes the finished response.
    pub fn next(&mut self) {
        while let Some(handler) = self.handlers.get(self.index).cloned() {
            self.index += 1;
            handler(self);
        }
    }

    /// Stops the chain: no handler after the current one will run.
    pub fn abort(&mut self) {
        self.index = self.handlers.len();
        self.aborted = true;
    }

    /// Whether [`abort`](Self::abort) or [`fail`](Self::fail) ended the chain early.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Aborts the chain and responds with `{"message": <message>}`.
    pub fn fail(&mut self, code: StatusCode, message: impl Into<String>) {
        self.abort();
        self.json(code, &json!({ "message": message.into() }));
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Path parameter value, or `""` when the route bound no such name.
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).unwrap_or_default()
    }

    /// Query string value, or `""` when absent.
    pub fn query(&self, key: &str) -> &str {
        self.request.query_param(key).unwrap_or_default()
    }

    /// Value from an urlencoded request body, falling back to the query string.
    pub fn post_form(&self, key: &str) -> &str {
        match self.form.get(key) {
            Some(value) => value.as_str(),
            None => self.query(key),
        }
    }

    /// Deserializes the request body as JSON.
    pub fn json_body<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }

    pub fn status_code(&self) -> StatusCode {
        self.response.status()
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn status(&mut self, code: StatusCode) {
        self.response.set_status(code);
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.response.set_header(name, value);
    }

    pub fn string(&mut self, code: StatusCode, body: impl Into<String>) {
        let body: String = body.into();
        self.set_header("Content-Type", "text/plain");
        self.status(code);
        self.response.set_body(body);
    }

    /// Writes `value` as JSON. Serialization failure becomes a 500 with the error text.
    pub fn json<T>(&mut self, code: StatusCode, value: &T)
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.set_header("Content-Type", "application/json");
                self.status(code);
                self.response.set_body(body);
            }
            Err(e) => self.string(StatusCode::InternalServerError, e.to_string()),
        }
    }

    pub fn data(&mut self, code: StatusCode, body: impl Into<Vec<u8>>) {
        self.status(code);
        self.response.set_body(body);
    }

    /// Renders template `name` through the engine's renderer.
    ///
    /// Any failure, including a missing renderer, aborts with a 500 carrying the error.
    pub fn html<T>(&mut self, code: StatusCode, name: &str, data: &T)
    where
        T: Serialize + ?Sized,
    {
        match self.render(name, data) {
            Ok(page) => {
                self.set_header("Content-Type", "text/html");
                self.status(code);
                self.response.set_body(page);
            }
            Err(e) => self.fail(StatusCode::InternalServerError, e.to_string()),
        }
    }

    fn render<T>(&self, name: &str, data: &T) -> Result<String, RenderError>
    where
        T: Serialize + ?Sized,
    {
        let renderer = self.renderer.as_ref().ok_or(RenderError::NoRenderer)?;
        let data = serde_json::to_value(data).map_err(|e| RenderError::Render {
            name: name.to_owned(),
            message: e.to_string(),
        })?;
        renderer.render(name, &data)
    }

    /// Consumes the context, yielding the response handlers wrote.
    pub fn into_response(self) -> Response {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn make_context(raw: &str) -> Context {
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        Context::new(req)
    }

    fn get(path: &str) -> Context {
        make_context(&format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n"))
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str, call_next: bool) -> HandlerFunc {
        let log = Arc::clone(log);
        Arc::new(move |ctx: &mut Context| {
            log.lock().unwrap().push(format!("{name} before"));
            if call_next {
                ctx.next();
            }
            log.lock().unwrap().push(format!("{name} after"));
        })
    }

    #[test]
    fn next_unwinds_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = get("/");
        ctx.push_handlers([
            recorder(&log, "a", true),
            recorder(&log, "b", true),
            recorder(&log, "h", false),
        ]);
        ctx.next();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a before", "b before", "h before", "h after", "b after", "a after"]
        );
        assert!(!ctx.is_aborted());
    }

    #[test]
    fn handlers_without_next_still_run_in_sequence() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = get("/");
        ctx.push_handlers([recorder(&log, "a", false), recorder(&log, "h", false)]);
        ctx.next();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a before", "a after", "h before", "h after"]
        );
    }

    #[test]
    fn each_handler_runs_once_even_when_next_is_called_twice() {
        let count = Arc::new(Mutex::new(0));
        let mut ctx = get("/");
        let twice: HandlerFunc = Arc::new(|ctx: &mut Context| {
            ctx.next();
            ctx.next();
        });
        let counted = Arc::clone(&count);
        let counter: HandlerFunc = Arc::new(move |_: &mut Context| *counted.lock().unwrap() += 1);
        ctx.push_handlers([twice, counter]);
        ctx.next();
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn fail_stops_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = get("/");
        let guard: HandlerFunc = Arc::new(|ctx: &mut Context| {
            ctx.fail(StatusCode::Unauthorized, "no token");
        });
        ctx.push_handlers([recorder(&log, "a", true), guard, recorder(&log, "h", false)]);
        ctx.next();

        assert_eq!(*log.lock().unwrap(), vec!["a before", "a after"]);
        assert!(ctx.is_aborted());
        let res = ctx.into_response();
        assert_eq!(res.status(), StatusCode::Unauthorized);
        assert_eq!(res.headers().get("content-type"), Some("application/json"));
        assert_eq!(res.text(), r#"{"message":"no token"}"#);
    }

    #[test]
    fn readers() {
        let mut ctx = get("/users/userInfo?username=cjm&age=18");
        ctx.set_params([("id", "7")].into_iter().collect());
        assert_eq!(ctx.method(), &Method::Get);
        assert_eq!(ctx.path(), "/users/userInfo");
        assert_eq!(ctx.query("username"), "cjm");
        assert_eq!(ctx.query("missing"), "");
        assert_eq!(ctx.param("id"), "7");
        assert_eq!(ctx.param("missing"), "");
        assert_eq!(ctx.status_code(), StatusCode::Ok);
    }

    #[test]
    fn post_form_prefers_body_over_query() {
        let body = "username=jack&lang=rust";
        let ctx = make_context(&format!(
            "POST /users/login?username=query&page=3 HTTP/1.1\r\n\
             Content-Type: application/x-www-form-urlencoded\r\n\
             Content-Length: {}\r\n\r\n{body}",
            body.len()
        ));
        assert_eq!(ctx.post_form("username"), "jack");
        assert_eq!(ctx.post_form("page"), "3");
        assert_eq!(ctx.post_form("missing"), "");
    }

    #[test]
    fn json_body_deserializes() {
        #[derive(serde::Deserialize)]
        struct Login {
            username: String,
        }
        let body = r#"{"username":"mike"}"#;
        let ctx = make_context(&format!(
            "POST /login HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ));
        let login: Login = ctx.json_body().unwrap();
        assert_eq!(login.username, "mike");
    }

    #[test]
    fn string_writer_sets_plain_text() {
        let mut ctx = get("/");
        ctx.string(StatusCode::Created, format!("hello {}", "gantry"));
        assert_eq!(ctx.status_code(), StatusCode::Created);
        let res = ctx.into_response();
        assert_eq!(res.headers().get("content-type"), Some("text/plain"));
        assert_eq!(res.text(), "hello gantry");
    }

    #[test]
    fn data_writer_keeps_raw_bytes() {
        let mut ctx = get("/");
        ctx.set_header("Content-Type", "image/png");
        ctx.data(StatusCode::Ok, vec![0x89, 0x50]);
        let res = ctx.into_response();
        assert_eq!(res.body_ref(), &[0x89, 0x50]);
        assert_eq!(res.headers().get("content-type"), Some("image/png"));
    }

    #[test]
    fn html_without_renderer_fails_with_500() {
        let mut ctx = get("/");
        ctx.html(StatusCode::Ok, "index.tmpl", &json!({}));
        assert!(ctx.is_aborted());
        let res = ctx.into_response();
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert_eq!(res.text(), r#"{"message":"no template renderer installed"}"#);
    }

    #[test]
    fn html_renders_through_renderer() {
        let renderer: Arc<dyn TemplateRenderer> =
            Arc::new(|name: &str, data: &serde_json::Value| -> Result<String, RenderError> {
                Ok(format!("<h1>{name}: {}</h1>", data["title"].as_str().unwrap_or("")))
            });
        let mut ctx = get("/").with_renderer(Some(renderer));
        ctx.html(StatusCode::Ok, "page", &json!({ "title": "Home" }));
        let res = ctx.into_response();
        assert_eq!(res.headers().get("content-type"), Some("text/html"));
        assert_eq!(res.text(), "<h1>page: Home</h1>");
    }
}
