use std::path::PathBuf;

use super::*;

fn template_dirs() -> TemplateDirs {
    TemplateDirs {
        bin_dir: PathBuf::from("/home/me/.pkg/bin"),
        opt_dir: PathBuf::from("/home/me/.pkg/opt"),
        tmp_dir: PathBuf::from("/home/me/.pkg/tmp"),
        zsh_completions_dir: PathBuf::from("/home/me/.pkg/share/zsh/site-functions"),
    }
}

const RIPGREP_MANIFEST: &str = r#"{
  "$schema": "../schema.json",
  "name": "ripgrep",
  "description": "Recursively search directories for a regex pattern",
  "homepage": "https://github.com/BurntSushi/ripgrep",
  "version": "14.1.1",
  "dependencies": ["pcre2", "pcre2"],
  "caveats": "Completions live in {{ pkg.completions.zsh }}",
  "sha256": {
    "linux-x64": "ABC123",
    "macos-arm64": "def456"
  },
  "url": {
    "linux-x64": "https://example.test/ripgrep-{{ version }}-x86_64-unknown-linux-musl.tar.gz",
    "macos-arm64": "https://example.test/ripgrep-{{ version }}-aarch64-apple-darwin.tar.gz"
  },
  "scripts": {
    "install": {
      "linux-x64": [
        "tar -xzf ripgrep-{{ version }}-x86_64-unknown-linux-musl.tar.gz",
        "mv ripgrep-{{ version }}-x86_64-unknown-linux-musl/rg {{ pkg.bin_dir }}"
      ],
      "macos-arm64": ["tar -xzf ripgrep.tar.gz"]
    },
    "latest": ["curl -s https://api.example.test/ripgrep/latest"],
    "completions": {
      "linux-x64": ["cp {{ pkg.tmp_dir }}/_rg {{ pkg.completions.zsh }}"]
    }
  }
}"#;

#[test]
fn platform_normalizes_runtime_names() {
    assert_eq!(Platform::new("darwin", "aarch64").to_string(), "macos-arm64");
    assert_eq!(Platform::new("linux", "x86_64").to_string(), "linux-x64");
    assert_eq!(Platform::new("Linux", "AMD64").to_string(), "linux-x64");
    assert_eq!(Platform::new("freebsd", "riscv64").to_string(), "freebsd-riscv64");
}

#[test]
fn platform_parses_key() {
    let platform: Platform = "macos-arm64".parse().expect("platform should parse");
    assert_eq!(platform.os(), "macos");
    assert_eq!(platform.arch(), "arm64");
    assert!("linux".parse::<Platform>().is_err());
    assert!("-x64".parse::<Platform>().is_err());
}

#[test]
fn current_platform_uses_normalized_arch() {
    let current = Platform::current();
    assert_ne!(current.arch(), "x86_64");
    assert_ne!(current.arch(), "aarch64");
    assert_ne!(current.os(), "darwin");
}

#[test]
fn parse_manifest_with_mixed_script_groups() {
    let manifest =
        RawManifest::from_json_str("ripgrep", RIPGREP_MANIFEST).expect("manifest should parse");
    assert_eq!(manifest.name, "ripgrep");
    assert_eq!(manifest.schema.as_deref(), Some("../schema.json"));
    assert!(matches!(
        manifest.scripts.install,
        Some(ScriptGroup::PerPlatform(_))
    ));
    assert!(matches!(manifest.scripts.latest, Some(ScriptGroup::Global(_))));
}

#[test]
fn parse_minimal_manifest_defaults_optional_fields() {
    let manifest = RawManifest::from_json_str(
        "foo",
        r#"{"name":"foo","version":"1.0","url":{},"sha256":{}}"#,
    )
    .expect("manifest should parse");
    assert!(manifest.dependencies.is_empty());
    assert!(manifest.caveats.is_empty());
    assert_eq!(manifest.scripts, ManifestScripts::default());
}

#[test]
fn malformed_json_is_a_distinct_error() {
    let err = RawManifest::from_json_str("broken", "{\"name\": ").expect_err("must fail");
    assert!(matches!(
        find_pkg_error(&err),
        Some(PkgError::MalformedManifest { reference, .. }) if reference == "broken"
    ));
}

#[test]
fn manifest_that_depends_on_itself_is_rejected() {
    let err = RawManifest::from_json_str(
        "loop",
        r#"{"name":"loop","version":"1","dependencies":["loop"]}"#,
    )
    .expect_err("self dependency must fail");
    assert!(err.to_string().contains("depends on itself"), "unexpected error: {err}");
}

#[test]
fn resolve_projects_onto_platform_and_substitutes_templates() {
    let manifest =
        RawManifest::from_json_str("ripgrep", RIPGREP_MANIFEST).expect("manifest should parse");
    let platform = Platform::new("linux", "x86_64");
    let resolved = manifest
        .resolve("https://pkg.example.test/ripgrep.json", &platform, &template_dirs())
        .expect("linux should resolve");

    assert_eq!(
        resolved.url,
        "https://example.test/ripgrep-14.1.1-x86_64-unknown-linux-musl.tar.gz"
    );
    assert_eq!(resolved.sha256, "ABC123", "checksum must stay verbatim");
    assert_eq!(
        resolved.install_script,
        vec![
            "tar -xzf ripgrep-14.1.1-x86_64-unknown-linux-musl.tar.gz".to_string(),
            "mv ripgrep-14.1.1-x86_64-unknown-linux-musl/rg /home/me/.pkg/bin".to_string(),
        ]
    );
    assert_eq!(
        resolved.completions_script,
        vec!["cp /home/me/.pkg/tmp/_rg /home/me/.pkg/share/zsh/site-functions".to_string()]
    );
    assert_eq!(
        resolved.latest_script,
        vec!["curl -s https://api.example.test/ripgrep/latest".to_string()]
    );
    assert_eq!(
        resolved.caveats,
        "Completions live in /home/me/.pkg/share/zsh/site-functions"
    );
    assert_eq!(resolved.dependencies, vec!["pcre2".to_string()]);
    assert_eq!(resolved.origin, "https://pkg.example.test/ripgrep.json");
}

#[test]
fn resolve_without_completions_entry_yields_empty_script() {
    let manifest =
        RawManifest::from_json_str("ripgrep", RIPGREP_MANIFEST).expect("manifest should parse");
    let resolved = manifest
        .resolve("ripgrep", &Platform::new("macos", "arm64"), &template_dirs())
        .expect("macos should resolve");
    assert!(resolved.completions_script.is_empty());
    assert_eq!(resolved.install_script, vec!["tar -xzf ripgrep.tar.gz".to_string()]);
}

#[test]
fn resolve_fails_closed_for_unsupported_platform() {
    let manifest =
        RawManifest::from_json_str("ripgrep", RIPGREP_MANIFEST).expect("manifest should parse");
    let platform = Platform::new("windows", "x86_64");
    assert!(!manifest.supports(&platform));

    let err = manifest
        .resolve("ripgrep", &platform, &template_dirs())
        .expect_err("windows is not listed");
    match find_pkg_error(&err) {
        Some(PkgError::PackageUnsupported { name, platform }) => {
            assert_eq!(name, "ripgrep");
            assert_eq!(platform.to_string(), "windows-x64");
        }
        other => panic!("unexpected error kind: {other:?}"),
    }
}

#[test]
fn resolve_requires_install_script_for_platform() {
    let manifest = RawManifest::from_json_str(
        "foo",
        r#"{
            "name": "foo",
            "version": "1.0",
            "url": {"linux-x64": "http://x/foo-1.0.tgz"},
            "sha256": {"linux-x64": "00"},
            "scripts": {"install": {"macos-arm64": ["true"]}}
        }"#,
    )
    .expect("manifest should parse");
    let err = manifest
        .resolve("foo", &Platform::new("linux", "x64"), &template_dirs())
        .expect_err("missing install script must fail");
    assert!(matches!(
        find_pkg_error(&err),
        Some(PkgError::PackageUnsupported { .. })
    ));
}

#[test]
fn global_install_group_applies_to_every_listed_platform() {
    let manifest = RawManifest::from_json_str(
        "foo",
        r#"{
            "name": "foo",
            "version": "2.0",
            "url": {"linux-x64": "http://x/foo-{{ version }}.tgz"},
            "sha256": {"linux-x64": "00"},
            "scripts": {"install": ["cp foo {{ pkg.bin_dir }}"]}
        }"#,
    )
    .expect("manifest should parse");
    let resolved = manifest
        .resolve("foo", &Platform::new("linux", "x64"), &template_dirs())
        .expect("global install group should resolve");
    assert_eq!(resolved.url, "http://x/foo-2.0.tgz");
    assert_eq!(resolved.install_script, vec!["cp foo /home/me/.pkg/bin".to_string()]);
}

#[test]
fn artifact_file_name_strips_query_and_fragment() {
    let manifest = RawManifest::from_json_str(
        "foo",
        r#"{
            "name": "foo",
            "version": "1.0",
            "url": {"linux-x64": "https://x.test/dl/foo-1.0.tgz?token=abc#frag"},
            "sha256": {"linux-x64": "00"},
            "scripts": {"install": ["true"]}
        }"#,
    )
    .expect("manifest should parse");
    let mut resolved = manifest
        .resolve("foo", &Platform::new("linux", "x64"), &template_dirs())
        .expect("must resolve");
    assert_eq!(
        resolved.artifact_file_name().expect("must infer file name"),
        "foo-1.0.tgz"
    );

    resolved.url = "https://x.test/dl/".to_string();
    assert!(resolved.artifact_file_name().is_err());
}

#[test]
fn error_messages_render_on_one_line() {
    let err = PkgError::DependencyCycle {
        chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
    };
    assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");

    let err = PkgError::PackageDependencyOf {
        name: "lib".to_string(),
        dependent: "app".to_string(),
    };
    assert_eq!(err.to_string(), "cannot remove lib as it is a dependency of app");

    let err = PkgError::LockfileBusy {
        path: PathBuf::from("/p/pkg.lock.guard"),
        holder: Some("42".to_string()),
    };
    assert_eq!(
        err.to_string(),
        "lockfile is in use by another pkg process (pid 42): /p/pkg.lock.guard (delete it if no pkg process is running)"
    );
}

#[test]
fn find_pkg_error_sees_through_context() {
    let err = anyhow::Error::from(PkgError::PackageNotInstalled {
        name: "foo".to_string(),
    })
    .context("failed to remove foo");
    assert!(matches!(
        find_pkg_error(&err),
        Some(PkgError::PackageNotInstalled { name }) if name == "foo"
    ));
}
