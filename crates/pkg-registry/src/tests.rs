use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use pkg_core::{find_pkg_error, PkgError, Platform, TemplateDirs};

use super::*;

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

const HOST: &str = "https://pkg.example.test";

#[derive(Default)]
struct FakeTransport {
    responses: HashMap<String, String>,
    unreachable: bool,
}

impl FakeTransport {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(url.to_string(), body.to_string());
        self
    }
}

impl ManifestTransport for FakeTransport {
    fn get_text(&self, url: &str) -> Result<Option<String>> {
        if self.unreachable {
            return Err(PkgError::ManifestUnreachable {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }
            .into());
        }
        Ok(self.responses.get(url).cloned())
    }
}

fn template_dirs() -> TemplateDirs {
    let root = PathBuf::from("/opt/pkg-home");
    TemplateDirs {
        bin_dir: root.join("bin"),
        opt_dir: root.join("opt"),
        tmp_dir: root.join("tmp"),
        zsh_completions_dir: root.join("share/zsh/site-functions"),
    }
}

fn resolver(transport: FakeTransport) -> ManifestResolver {
    ManifestResolver::new(
        HOST,
        Platform::new("linux", "x86_64"),
        template_dirs(),
        Box::new(transport),
    )
}

fn test_dir() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "pkg-registry-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::create_dir_all(&dir).expect("must create test dir");
    dir
}

const FOO_MANIFEST: &str = r#"{
  "name": "foo",
  "description": "Foo does things",
  "homepage": "https://foo.example.test",
  "version": "1.0",
  "url": {"linux-x64": "http://x/foo-{{ version }}.tgz"},
  "sha256": {"linux-x64": "abcd"},
  "scripts": {"install": {"linux-x64": ["cp foo {{ pkg.bin_dir }}"]}}
}"#;

#[test]
fn parse_reference_classifies_inputs() {
    assert_eq!(
        ManifestReference::parse("foo", "https://h.test/").expect("must parse"),
        ManifestReference::Remote("https://h.test/foo.json".to_string())
    );
    assert_eq!(
        ManifestReference::parse("./pkgs/foo.json", HOST).expect("must parse"),
        ManifestReference::Local(PathBuf::from("./pkgs/foo.json"))
    );
    assert_eq!(
        ManifestReference::parse("https://mirror.test/foo.json", HOST).expect("must parse"),
        ManifestReference::Remote("https://mirror.test/foo.json".to_string())
    );
    assert!(ManifestReference::parse("pkgs/foo", HOST).is_err());
    assert!(ManifestReference::parse("  ", HOST).is_err());
}

#[test]
fn local_origin_is_absolute() {
    let origin = ManifestReference::Local(PathBuf::from("./foo.json"))
        .origin()
        .expect("must build origin");
    assert!(PathBuf::from(&origin).is_absolute(), "origin should be absolute: {origin}");
    assert!(origin.ends_with("foo.json"));
}

#[test]
fn resolve_remote_manifest_by_name() {
    let resolver = resolver(FakeTransport::default().with(&format!("{HOST}/foo.json"), FOO_MANIFEST));
    let resolved = resolver.resolve("foo").expect("remote manifest should resolve");
    assert_eq!(resolved.name, "foo");
    assert_eq!(resolved.origin, format!("{HOST}/foo.json"));
    assert_eq!(resolved.url, "http://x/foo-1.0.tgz");
    assert_eq!(resolved.install_script, vec!["cp foo /opt/pkg-home/bin".to_string()]);
}

#[test]
fn resolve_by_recorded_origin_url() {
    let url = "https://mirror.test/manifests/foo.json";
    let resolver = resolver(FakeTransport::default().with(url, FOO_MANIFEST));
    let resolved = resolver.resolve(url).expect("origin URL should resolve");
    assert_eq!(resolved.origin, url);
}

#[test]
fn missing_remote_manifest_is_package_not_found() {
    let resolver = resolver(FakeTransport::default());
    let err = resolver.resolve("nope").expect_err("missing manifest must fail");
    assert!(matches!(
        find_pkg_error(&err),
        Some(PkgError::PackageNotFound { reference }) if reference == "nope"
    ));
}

#[test]
fn unreachable_host_is_distinct_from_not_found() {
    let resolver = resolver(FakeTransport {
        unreachable: true,
        ..FakeTransport::default()
    });
    let err = resolver.resolve("foo").expect_err("unreachable host must fail");
    assert!(matches!(
        find_pkg_error(&err),
        Some(PkgError::ManifestUnreachable { .. })
    ));
}

#[test]
fn malformed_remote_manifest_is_reported() {
    let resolver = resolver(FakeTransport::default().with(&format!("{HOST}/foo.json"), "not json"));
    let err = resolver.resolve("foo").expect_err("malformed manifest must fail");
    assert!(matches!(
        find_pkg_error(&err),
        Some(PkgError::MalformedManifest { .. })
    ));
}

#[test]
fn resolve_local_manifest_file() {
    let dir = test_dir();
    let path = dir.join("foo.json");
    fs::write(&path, FOO_MANIFEST).expect("must write manifest");

    let resolver = resolver(FakeTransport::default());
    let resolved = resolver
        .resolve(&path.display().to_string())
        .expect("local manifest should resolve");
    assert_eq!(resolved.origin, path.display().to_string());
    assert_eq!(resolved.version, "1.0");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_local_manifest_is_package_not_found() {
    let dir = test_dir();
    let path = dir.join("absent.json");
    let resolver = resolver(FakeTransport::default());
    let err = resolver
        .resolve(&path.display().to_string())
        .expect_err("missing file must fail");
    assert!(matches!(
        find_pkg_error(&err),
        Some(PkgError::PackageNotFound { .. })
    ));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unsupported_platform_surfaces_from_resolver() {
    let resolver = ManifestResolver::new(
        HOST,
        Platform::new("macos", "arm64"),
        template_dirs(),
        Box::new(FakeTransport::default().with(&format!("{HOST}/foo.json"), FOO_MANIFEST)),
    );
    let err = resolver.resolve("foo").expect_err("macos is not listed");
    assert!(matches!(
        find_pkg_error(&err),
        Some(PkgError::PackageUnsupported { .. })
    ));
}

#[test]
fn search_filters_by_name_and_description() {
    let transport = FakeTransport::default().with(
        &format!("{HOST}/index.json"),
        r#"{
            "ripgrep": {"version": "14.1.1", "description": "Fast grep"},
            "fd": {"version": "10.2.0", "description": "Find files quickly"},
            "bat": {"Version": "0.24.0", "Description": "A cat clone with wings"}
        }"#,
    );
    let index = fetch_catalog_index(&transport, HOST).expect("index should load");
    assert_eq!(index.len(), 3);

    let results = search_catalog(&index, "GREP");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "ripgrep");

    let results = search_catalog(&index, "f");
    let names = results.iter().map(|result| result.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["fd", "ripgrep"]);

    assert!(search_catalog(&index, "zzz").is_empty());
}

#[test]
fn missing_catalog_index_is_an_error() {
    let err = fetch_catalog_index(&FakeTransport::default(), HOST).expect_err("must fail");
    assert!(err.to_string().contains("index.json not found"), "unexpected error: {err}");
}
