use std::fs;
use std::path::PathBuf;

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|path| path.parent())
        .expect("crates/taskbridge-app should have a workspace root parent")
        .to_path_buf()
}

fn crate_dirs() -> Vec<PathBuf> {
    let crates_dir = repo_root().join("crates");
    let entries = fs::read_dir(&crates_dir).expect("read crates directory");
    let mut dirs = entries
        .map(|entry| entry.expect("read crate entry").path())
        .filter(|path| path.is_dir() && path.join("Cargo.toml").exists())
        .collect::<Vec<_>>();
    dirs.sort();
    dirs
}

#[test]
fn workspace_manifest_lists_every_crate() {
    let root = repo_root();
    let workspace_manifest =
        fs::read_to_string(root.join("Cargo.toml")).expect("read workspace Cargo.toml");

    for path in crate_dirs() {
        let crate_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .expect("crate directory name must be valid UTF-8");
        let expected_member = format!("\"crates/{crate_name}\"");
        assert!(
            workspace_manifest.contains(&expected_member),
            "workspace manifest is missing member {expected_member}",
        );
    }
}

fn path_dependencies(manifest: &str) -> Vec<String> {
    manifest
        .lines()
        .filter(|line| line.contains('{'))
        .filter_map(|line| line.split_once("path = \"").map(|(_, rest)| rest))
        .filter_map(|rest| rest.split_once('"').map(|(path, _)| path.to_owned()))
        .collect()
}

#[test]
fn workspace_path_dependencies_point_at_member_crates() {
    let root = repo_root();
    let workspace_manifest =
        fs::read_to_string(root.join("Cargo.toml")).expect("read workspace Cargo.toml");

    let paths = path_dependencies(&workspace_manifest);
    assert!(!paths.is_empty(), "workspace should declare its crates as path dependencies");
    for path in paths {
        assert!(
            path.starts_with("crates/"),
            "path dependency {path} must live under crates/",
        );
        assert!(
            root.join(&path).join("Cargo.toml").exists(),
            "path dependency {path} has no Cargo.toml",
        );
        assert!(
            workspace_manifest.contains(&format!("\"{path}\"")),
            "path dependency {path} is not a workspace member",
        );
    }
}

#[test]
fn crate_manifests_inherit_dependencies_from_workspace() {
    for path in crate_dirs() {
        let manifest_path = path.join("Cargo.toml");
        let manifest = fs::read_to_string(&manifest_path)
            .unwrap_or_else(|_| panic!("read {}", manifest_path.display()));
        assert!(
            path_dependencies(&manifest).is_empty(),
            "{} should use `.workspace = true` instead of a path dependency",
            manifest_path.display(),
        );
    }
}

#[test]
fn binary_is_named_taskbridge() {
    let manifest = fs::read_to_string(repo_root().join("crates/taskbridge-app/Cargo.toml"))
        .expect("read app Cargo.toml");
    assert!(manifest.contains("name = \"taskbridge\""));
}
