//! End-to-end App Engine deployment through the public API.

use sitepress::backend::AppEngineBackend;
use sitepress::event::Events;
use sitepress::pipeline::publish;
use sitepress::producer::{PathList, Registry};
use sitepress::responder::{Response, StaticResponder};
use std::fs;
use tempfile::TempDir;

fn registry(paths: &[&str]) -> Registry {
    let mut registry = Registry::new();
    registry.register(PathList::new(
        "site",
        paths.iter().map(|p| p.to_string()).collect(),
    ));
    registry
}

#[test]
fn deploy_dir_has_static_files_and_descriptor() {
    let tmp = TempDir::new().unwrap();
    let responder = StaticResponder::new()
        .route("/", Response::ok("text/html", "home"))
        .route("/blog/", Response::ok("text/html", "blog"))
        .route("/feed", Response::ok("application/rss+xml", "<rss/>"))
        .route("/robots.txt", Response::ok("text/plain", "User-agent: *"));
    let mut backend = AppEngineBackend::new(tmp.path(), "example-app", "python");

    let summary = publish(
        &mut backend,
        &registry(&["/", "/blog/", "/feed", "/robots.txt"]),
        1,
        || Ok(responder.clone()),
        &Events::none(),
    )
    .unwrap();

    assert_eq!(summary.paths_published, 4);
    let deploy = tmp.path().join("deploy");
    assert_eq!(fs::read_to_string(deploy.join("index.html")).unwrap(), "home");
    assert_eq!(fs::read_to_string(deploy.join("blog/index.html")).unwrap(), "blog");
    assert_eq!(fs::read_to_string(deploy.join("feed")).unwrap(), "<rss/>");

    let yaml = fs::read_to_string(tmp.path().join("app.yaml")).unwrap();
    assert!(yaml.starts_with(
        "application: example-app\nversion: 1\nruntime: python\napi_version: 1\nthreadsafe: true\n\nhandlers:\n\n"
    ));
    assert!(yaml.contains(
        "- url: /feed\n  static_files: deploy/feed\n  upload: deploy/feed\n  mime_type: application/rss+xml\n"
    ));
    assert!(!yaml.contains("- url: /robots.txt"));
    assert!(!yaml.contains("- url: /blog/\n"));
    assert_eq!(yaml.matches("mime_type:").count(), 1);
    assert!(yaml.ends_with("- url: /\n  static_dir: deploy\n"));
}

#[test]
fn parallel_handlers_follow_path_order() {
    let tmp = TempDir::new().unwrap();
    let paths: Vec<String> = (0..12).map(|i| format!("/feeds/f{i}")).collect();
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let responder = refs.iter().fold(StaticResponder::new(), |r, p| {
        r.route(p, Response::ok("application/atom+xml", "<feed/>"))
    });
    let mut backend = AppEngineBackend::new(tmp.path(), "example-app", "python");

    publish(
        &mut backend,
        &registry(&refs),
        6,
        || Ok(responder.clone()),
        &Events::none(),
    )
    .unwrap();

    let yaml = fs::read_to_string(tmp.path().join("app.yaml")).unwrap();
    let positions: Vec<usize> = refs
        .iter()
        .map(|p| yaml.find(&format!("- url: {p}\n")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}
