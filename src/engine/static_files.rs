use std::path::{Path, PathBuf};

use tracing::debug;

use crate::StatusCode;
use crate::context::Context;

/// Handler serving files below `root`, addressed by the `filepath` route parameter.
pub(super) fn serve_dir(root: PathBuf) -> impl Fn(&mut Context) + Send + Sync + 'static {
    move |ctx: &mut Context| {
        let Some(file) = resolve(&root, ctx.param("filepath")) else {
            let body = format!("{} not found", ctx.path());
            ctx.string(StatusCode::NotFound, body);
            return;
        };
        match std::fs::read(&file) {
            Ok(bytes) => {
                let mime = mime_guess::from_path(&file).first_or_octet_stream();
                ctx.set_header("Content-Type", mime.as_ref());
                ctx.data(StatusCode::Ok, bytes);
            }
            Err(e) => {
                debug!(file = %file.display(), error = %e, "static file unreadable");
                let body = format!("{} not found", ctx.path());
                ctx.string(StatusCode::NotFound, body);
            }
        }
    }
}

// Joins `relative` onto `root`, refusing anything that could climb out of it.
fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for part in relative.split('/').filter(|p| !p.is_empty() && *p != ".") {
        if part == ".." || part.contains('\\') || part.contains(':') {
            return None;
        }
        path.push(part);
    }
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::engine::Engine;
    use crate::{Request, Response};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gantry-{name}-{}", std::process::id()));
        fs::create_dir_all(dir.join("js")).unwrap();
        fs::write(dir.join("js").join("a.js"), "console.log(1);").unwrap();
        fs::write(dir.join("fav.ico"), [0u8, 1, 2]).unwrap();
        dir
    }

    fn get(engine: &Engine, target: &str) -> Response {
        let raw = format!("GET {target} HTTP/1.1\r\n\r\n");
        engine.serve(Request::parse(raw.as_bytes()).unwrap().0)
    }

    #[test]
    fn serves_nested_files() {
        let dir = scratch_dir("nested");
        let mut engine = Engine::new();
        engine.static_files("/assets", &dir);

        let res = get(&engine, "/assets/js/a.js");
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.text(), "console.log(1);");

        let res = get(&engine, "/assets/fav.ico");
        assert_eq!(res.headers().get("content-type"), Some("image/x-icon"));
        assert_eq!(res.body_ref(), &[0, 1, 2]);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn encoded_file_names_resolve() {
        let dir = scratch_dir("spaces");
        fs::write(dir.join("read me.txt"), "hi").unwrap();
        let mut engine = Engine::new();
        engine.static_files("/assets", &dir);

        let res = get(&engine, "/assets/read%20me.txt");
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.text(), "hi");
        assert_eq!(get(&engine, "/assets/..%2Fsecret").status(), StatusCode::NotFound);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn group_prefix_applies() {
        let dir = scratch_dir("group");
        let mut engine = Engine::new();
        engine.group("/v1").static_files("/static/", &dir);
        assert_eq!(engine.routes(&crate::Method::Get), vec!["/v1/static/*filepath"]);
        assert_eq!(get(&engine, "/v1/static/js/a.js").status(), StatusCode::Ok);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_and_escaping_paths_are_404() {
        let dir = scratch_dir("missing");
        let mut engine = Engine::new();
        engine.static_files("/assets", &dir);

        assert_eq!(get(&engine, "/assets/nope.css").status(), StatusCode::NotFound);
        assert_eq!(get(&engine, "/assets/../secret").status(), StatusCode::NotFound);
        assert_eq!(get(&engine, "/assets/js").status(), StatusCode::NotFound);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn resolve_rejects_parent_components() {
        let root = Path::new("/srv/www");
        assert!(resolve(root, "../etc/passwd").is_none());
        assert!(resolve(root, "a/../../b").is_none());
    }

    #[test]
    fn content_type_follows_extension() {
        let dir = scratch_dir("mime");
        fs::write(dir.join("photo.webp"), [1u8]).unwrap();
        fs::write(dir.join("blob"), [2u8]).unwrap();
        let mut engine = Engine::new();
        engine.static_files("/assets", &dir);

        let res = get(&engine, "/assets/photo.webp");
        assert_eq!(res.headers().get("content-type"), Some("image/webp"));
        let res = get(&engine, "/assets/blob");
        assert_eq!(res.headers().get("content-type"), Some("application/octet-stream"));
        fs::remove_dir_all(dir).ok();
    }
}
