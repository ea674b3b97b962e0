//! Ensures all workspace crates use `version.workspace = true` and that
//! the workspace version is what this crate reports.

use std::path::Path;

fn workspace_root() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
}

fn manifest(path: &Path) -> toml::Value {
    let raw = std::fs::read_to_string(path.join("Cargo.toml")).unwrap();
    raw.parse().unwrap()
}

#[test]
fn all_crates_use_workspace_version() {
    for krate in ["crates/tally-core", "crates/tally-ledger"] {
        let doc = manifest(&workspace_root().join(krate));
        let inherited = doc["package"]["version"]
            .as_table()
            .and_then(|t| t.get("workspace"))
            .and_then(|v| v.as_bool());
        assert_eq!(
            inherited,
            Some(true),
            "{krate} should use version.workspace = true"
        );
    }
}

#[test]
fn workspace_version_matches_cargo_pkg() {
    let doc = manifest(workspace_root());
    let ws_version = doc["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(ws_version, env!("CARGO_PKG_VERSION"));
    assert_eq!(ws_version, tally_core::VERSION);
}

#[test]
fn internal_dependency_versions_match_workspace() {
    let doc = manifest(workspace_root());
    let ws_version = doc["workspace"]["package"]["version"].as_str().unwrap();
    for name in ["tally-core", "tally-ledger"] {
        let dep = doc["workspace"]["dependencies"][name]["version"].as_str().unwrap();
        assert_eq!(dep, ws_version, "{name} pinned to a stale version");
    }
}
