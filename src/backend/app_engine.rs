//! Google App Engine static deployment.
//!
//! Produces a directory ready for `appcfg.py update`:
//!
//! ```text
//! deploy_dir/
//! ├── app.yaml          # handler table
//! └── deploy/           # every published body, laid out like the disk target
//! ```
//!
//! App Engine serves a static file with the MIME type guessed from its
//! extension. Paths like `/feed` have no extension, so each one that isn't
//! HTML gets an explicit handler carrying its real content-type. Directory
//! indexes are covered by ten generated wildcard handlers (depth 0..9), and
//! a final `static_dir` handler serves everything else as-is.

use super::disk::write_output;
use super::{Backend, PublishError, PublishLedger, PublishedPath, fetch};
use crate::event::{Events, PublishAction, PublishEvent};
use crate::mime;
use crate::path::{SitePath, disk_location};
use crate::responder::Responder;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Subdirectory of the deploy dir holding the static files.
pub const STATIC_DIR: &str = "deploy";
pub const DESCRIPTOR: &str = "app.yaml";

/// Wildcard index handlers cover directory paths up to this many segments.
const INDEX_DEPTH: usize = 10;

/// Extensions App Engine maps to the right MIME type on its own.
const STANDARD_EXTENSIONS: &[&str] = &["htm", "html", "css", "xml", "json", "js", "yaml", "txt"];

/// Outcome of publishing one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFile {
    pub path: SitePath,
    /// Location relative to the deploy dir, e.g. `deploy/feed`.
    pub relative: String,
    /// Explicit handler for the path, if it needs one.
    pub handler: Option<String>,
}

pub struct AppEngineBackend {
    deploy_dir: PathBuf,
    app_id: String,
    runtime: String,
    handlers: Vec<String>,
}

impl AppEngineBackend {
    pub fn new(
        deploy_dir: impl Into<PathBuf>,
        app_id: impl Into<String>,
        runtime: impl Into<String>,
    ) -> Self {
        Self {
            deploy_dir: deploy_dir.into(),
            app_id: app_id.into(),
            runtime: runtime.into(),
            handlers: Vec::new(),
        }
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.deploy_dir.join(DESCRIPTOR)
    }

    fn static_root(&self) -> PathBuf {
        self.deploy_dir.join(STATIC_DIR)
    }
}

/// Header written by `initialize`; handlers are appended after it.
pub fn descriptor_header(app_id: &str, runtime: &str) -> String {
    format!(
        "application: {app_id}\n\
         version: 1\n\
         runtime: {runtime}\n\
         api_version: 1\n\
         threadsafe: true\n\
         \n\
         handlers:\n\
         \n"
    )
}

/// Explicit handler for a path App Engine can't type by extension.
///
/// `None` for directory paths, paths ending in a standard extension, and
/// `text/html` responses.
pub fn route_handler(path: &SitePath, content_type: &str, relative: &str) -> Option<String> {
    let mimetype = mime::strip_params(content_type);
    let has_standard_ext = path
        .extension()
        .is_some_and(|ext| STANDARD_EXTENSIONS.contains(&ext));
    if path.is_directory() || has_standard_ext || mimetype == "text/html" {
        return None;
    }
    Some(format!(
        "# no file extension and non-html mime: {mimetype}\n\
         - url: {path}\n\
         \x20 static_files: {relative}\n\
         \x20 upload: {relative}\n\
         \x20 mime_type: {mimetype}\n\
         \n"
    ))
}

/// Wildcard handlers mapping `/`, `/(.*)/`, `/(.*)/(.*)/`, ... to the
/// matching `index.html`, followed by the catch-all `static_dir`.
pub fn index_handlers() -> String {
    let mut out = String::from(
        "####################\n\
         # directory indexes, up to 10 deep\n\
         ####################\n\n",
    );
    for depth in 0..INDEX_DEPTH {
        let pattern = "(.*)/".repeat(depth);
        let groups: String = (1..=depth).map(|i| format!("\\{i}/")).collect();
        out.push_str(&format!(
            "- url: /{pattern}\n  static_files: {STATIC_DIR}/{groups}index.html\n  upload: {STATIC_DIR}/{pattern}index.html\n\n"
        ));
    }
    out.push_str(&format!(
        "####################\n\
         # everything else\n\
         ####################\n\n\
         - url: /\n  static_dir: {STATIC_DIR}\n"
    ));
    out
}

fn append(descriptor: &Path, text: &str) -> std::io::Result<()> {
    let mut f = OpenOptions::new().append(true).open(descriptor)?;
    f.write_all(text.as_bytes())
}

impl Backend for AppEngineBackend {
    type Record = StaticFile;

    fn name(&self) -> &'static str {
        "app-engine"
    }

    fn initialize(
        &mut self,
        _ledger: &mut PublishLedger,
        events: &Events,
    ) -> Result<(), PublishError> {
        fs::create_dir_all(self.static_root())?;
        fs::write(
            self.descriptor_path(),
            descriptor_header(&self.app_id, &self.runtime),
        )?;
        self.handlers.clear();
        tracing::info!(descriptor = %self.descriptor_path().display(), "initialized app.yaml");
        events.emit(PublishEvent::Initialized {
            target: self.name(),
        });
        Ok(())
    }

    fn publish(
        &self,
        responder: &mut dyn Responder,
        path: &SitePath,
        events: &Events,
    ) -> Result<StaticFile, PublishError> {
        let response = fetch(responder, path)?;
        let location = disk_location(path, &response.content_type);
        let file = write_output(&self.static_root(), &location, &response.body)?;
        let relative = format!("{STATIC_DIR}/{location}");
        let handler = route_handler(path, &response.content_type, &relative);

        tracing::debug!(%path, file = %file.display(), handler = handler.is_some(), "wrote");
        events.emit(PublishEvent::PathPublished {
            path: path.to_string(),
            location: file.display().to_string(),
            action: PublishAction::Written,
        });

        Ok(StaticFile {
            path: path.clone(),
            relative,
            handler,
        })
    }

    fn absorb(
        &mut self,
        records: Vec<StaticFile>,
        ledger: &mut PublishLedger,
    ) -> Result<(), PublishError> {
        let mut published = Vec::with_capacity(records.len());
        for record in records {
            self.handlers.extend(record.handler);
            published.push(PublishedPath {
                path: record.path,
                location: record.relative,
            });
        }
        ledger.extend(published);
        Ok(())
    }

    fn finalize(
        &mut self,
        _ledger: &PublishLedger,
        events: &Events,
    ) -> Result<Option<String>, PublishError> {
        let descriptor = self.descriptor_path();
        let mut tail = self.handlers.concat();
        tail.push_str(&index_handlers());
        append(&descriptor, &tail)?;

        let deploy_dir = fs::canonicalize(&self.deploy_dir)?;
        tracing::info!(handlers = self.handlers.len(), "finalized app.yaml");
        events.emit(PublishEvent::Finalized {
            target: self.name(),
            location: Some(deploy_dir.display().to_string()),
            hint: Some(format!("appcfg.py update {}", deploy_dir.display())),
        });
        Ok(Some(deploy_dir.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::{Response, StaticResponder};
    use tempfile::TempDir;

    fn p(raw: &str) -> SitePath {
        SitePath::parse(raw).unwrap()
    }

    fn run(backend: &mut AppEngineBackend, responder: &mut StaticResponder, paths: &[&str]) {
        let mut ledger = PublishLedger::new();
        backend.initialize(&mut ledger, &Events::none()).unwrap();
        let records = paths
            .iter()
            .map(|raw| backend.publish(responder, &p(raw), &Events::none()).unwrap())
            .collect();
        backend.absorb(records, &mut ledger).unwrap();
        backend.finalize(&ledger, &Events::none()).unwrap();
    }

    // =========================================================================
    // Handler rules
    // =========================================================================

    #[test]
    fn feed_without_extension_gets_handler() {
        let handler = route_handler(&p("/feed"), "application/rss+xml", "deploy/feed").unwrap();
        assert_eq!(
            handler,
            "# no file extension and non-html mime: application/rss+xml\n\
             - url: /feed\n  static_files: deploy/feed\n  upload: deploy/feed\n  mime_type: application/rss+xml\n\n"
        );
    }

    #[test]
    fn handler_mime_drops_parameters() {
        let handler =
            route_handler(&p("/export"), "text/csv; charset=utf-8", "deploy/export").unwrap();
        assert!(handler.contains("  mime_type: text/csv\n"));
    }

    #[test]
    fn standard_extension_needs_no_handler() {
        assert_eq!(route_handler(&p("/site.css"), "text/css", "deploy/site.css"), None);
        assert_eq!(
            route_handler(&p("/data.json"), "application/json", "deploy/data.json"),
            None
        );
    }

    #[test]
    fn html_needs_no_handler() {
        assert_eq!(
            route_handler(&p("/about"), "text/html; charset=utf-8", "deploy/about"),
            None
        );
    }

    #[test]
    fn directory_needs_no_handler() {
        assert_eq!(
            route_handler(&p("/api/"), "application/json", "deploy/api/index.json"),
            None
        );
    }

    #[test]
    fn unknown_extension_still_gets_handler() {
        assert!(route_handler(&p("/logo.svg"), "image/svg+xml", "deploy/logo.svg").is_some());
    }

    #[test]
    fn index_handlers_cover_ten_depths() {
        let text = index_handlers();
        assert!(text.contains("- url: /\n  static_files: deploy/index.html\n  upload: deploy/index.html\n"));
        assert!(text.contains(
            "- url: /(.*)/(.*)/\n  static_files: deploy/\\1/\\2/index.html\n  upload: deploy/(.*)/(.*)/index.html\n"
        ));
        assert_eq!(text.matches("static_files:").count(), 10);
        assert!(text.contains(&format!("- url: /{}\n", "(.*)/".repeat(9))));
        assert!(!text.contains(&"(.*)/".repeat(10)));
        assert!(text.ends_with("- url: /\n  static_dir: deploy\n"));
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    #[test]
    fn initialize_writes_header() {
        let tmp = TempDir::new().unwrap();
        let mut backend = AppEngineBackend::new(tmp.path(), "my-app", "python");

        backend
            .initialize(&mut PublishLedger::new(), &Events::none())
            .unwrap();

        assert!(tmp.path().join("deploy").is_dir());
        assert_eq!(
            fs::read_to_string(tmp.path().join("app.yaml")).unwrap(),
            "application: my-app\nversion: 1\nruntime: python\napi_version: 1\nthreadsafe: true\n\nhandlers:\n\n"
        );
    }

    #[test]
    fn publish_writes_under_static_dir() {
        let tmp = TempDir::new().unwrap();
        let mut backend = AppEngineBackend::new(tmp.path(), "my-app", "python");
        let mut r = StaticResponder::new()
            .route("/", Response::ok("text/html", "home"))
            .route("/api/", Response::ok("application/json", "[]"));

        run(&mut backend, &mut r, &["/", "/api/"]);

        assert_eq!(fs::read_to_string(tmp.path().join("deploy/index.html")).unwrap(), "home");
        assert_eq!(fs::read_to_string(tmp.path().join("deploy/api/index.json")).unwrap(), "[]");
    }

    #[test]
    fn descriptor_lists_handlers_before_indexes() {
        let tmp = TempDir::new().unwrap();
        let mut backend = AppEngineBackend::new(tmp.path(), "my-app", "python");
        let mut r = StaticResponder::new()
            .route("/", Response::ok("text/html", "home"))
            .route("/feed", Response::ok("application/rss+xml", "<rss/>"))
            .route("/robots.txt", Response::ok("text/plain", "User-agent: *"));

        run(&mut backend, &mut r, &["/", "/feed", "/robots.txt"]);

        let yaml = fs::read_to_string(tmp.path().join("app.yaml")).unwrap();
        assert!(yaml.starts_with("application: my-app\n"));
        assert_eq!(yaml.matches("mime_type:").count(), 1);
        let feed = yaml.find("- url: /feed\n").unwrap();
        let indexes = yaml.find("# directory indexes").unwrap();
        assert!(feed < indexes);
        assert!(yaml.ends_with("  static_dir: deploy\n"));
        assert_eq!(fs::read_to_string(tmp.path().join("deploy/feed")).unwrap(), "<rss/>");
    }

    #[test]
    fn rerun_starts_from_fresh_descriptor() {
        let tmp = TempDir::new().unwrap();
        let mut backend = AppEngineBackend::new(tmp.path(), "my-app", "python");
        let mut r = StaticResponder::new().route("/feed", Response::ok("application/rss+xml", "x"));

        run(&mut backend, &mut r, &["/feed"]);
        run(&mut backend, &mut r, &["/feed"]);

        let yaml = fs::read_to_string(tmp.path().join("app.yaml")).unwrap();
        assert_eq!(yaml.matches("application:").count(), 1);
        assert_eq!(yaml.matches("- url: /feed\n").count(), 1);
    }

    #[test]
    fn finalize_reports_deploy_hint() {
        let tmp = TempDir::new().unwrap();
        let mut backend = AppEngineBackend::new(tmp.path(), "my-app", "python");
        let (tx, rx) = std::sync::mpsc::channel();
        let events = Events::new(tx);
        let mut ledger = PublishLedger::new();

        backend.initialize(&mut ledger, &events).unwrap();
        backend.finalize(&ledger, &events).unwrap();

        let last = rx.try_iter().last().unwrap();
        let abs = fs::canonicalize(tmp.path()).unwrap();
        assert_eq!(
            last,
            PublishEvent::Finalized {
                target: "app-engine",
                location: Some(abs.display().to_string()),
                hint: Some(format!("appcfg.py update {}", abs.display())),
            }
        );
    }

    #[test]
    fn error_status_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut backend = AppEngineBackend::new(tmp.path(), "my-app", "python");
        backend
            .initialize(&mut PublishLedger::new(), &Events::none())
            .unwrap();
        let mut r = StaticResponder::new().route("/feed", Response::new(503, "text/plain", ""));

        let err = backend
            .publish(&mut r, &p("/feed"), &Events::none())
            .unwrap_err();

        assert!(matches!(err, PublishError::Fetch { status: 503, .. }));
        assert!(!tmp.path().join("deploy/feed").exists());
    }
}
