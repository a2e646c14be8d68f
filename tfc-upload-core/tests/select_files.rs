mod common;

use std::path::PathBuf;
use tempfile::tempdir;

use common::{git, git_init, tools_available, write_file};
use tfc_upload_core::config::SelectionPolicy;
use tfc_upload_core::error::UploadError;
use tfc_upload_core::select::FileSetSelector;

fn sorted(paths: &[PathBuf]) -> Vec<String> {
    let mut v: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    v.sort();
    v
}

struct TestCase {
    name: &'static str,
    policy: SelectionPolicy,
    expected: Vec<&'static str>,
}

#[test]
fn test_full_walk_policy_matrix() {
    let root = tempdir().unwrap();
    write_file(root.path(), "main.tf", "resource {}");
    write_file(root.path(), "modules/vpc/vpc.tf", "module {}");
    write_file(root.path(), ".git/HEAD", "ref: refs/heads/main");
    write_file(root.path(), ".terraform/terraform.tfstate", "{}");
    write_file(root.path(), ".terraform/modules/net/net.tf", "net");
    write_file(root.path(), "terraform.d/plugins/linux_amd64/provider", "bin");

    let test_cases = vec![
        TestCase {
            name: "plain walk skips vcs and state directories",
            policy: SelectionPolicy::default(),
            expected: vec![
                "main.tf",
                "modules/vpc/vpc.tf",
                "terraform.d/plugins/linux_amd64/provider",
            ],
        },
        TestCase {
            name: "modules appended from the state directory",
            policy: SelectionPolicy {
                include_modules: true,
                ..Default::default()
            },
            expected: vec![
                ".terraform/modules/net/net.tf",
                "main.tf",
                "modules/vpc/vpc.tf",
                "terraform.d/plugins/linux_amd64/provider",
            ],
        },
        TestCase {
            name: "plugins already walked are not duplicated",
            policy: SelectionPolicy {
                include_local_plugins: true,
                ..Default::default()
            },
            expected: vec![
                "main.tf",
                "modules/vpc/vpc.tf",
                "terraform.d/plugins/linux_amd64/provider",
            ],
        },
    ];

    for case in test_cases {
        let files = FileSetSelector::new(root.path(), case.policy)
            .select()
            .unwrap_or_else(|e| panic!("{}: {e}", case.name));
        assert_eq!(sorted(files.as_slice()), case.expected, "{}", case.name);
    }
}

#[test]
fn test_absent_optional_directories_are_not_errors() {
    let root = tempdir().unwrap();
    write_file(root.path(), "main.tf", "x");

    let policy = SelectionPolicy {
        include_modules: true,
        include_local_plugins: true,
        ..Default::default()
    };
    let files = FileSetSelector::new(root.path(), policy).select().unwrap();
    assert_eq!(sorted(files.as_slice()), vec!["main.tf"]);
}

#[test]
fn test_tracked_only_lists_git_index() {
    if !tools_available(&["git"]) {
        return;
    }
    let root = tempdir().unwrap();
    git_init(root.path());
    write_file(root.path(), "main.tf", "tracked");
    write_file(root.path(), "vars/prod.tfvars", "tracked");
    write_file(root.path(), "scratch.txt", "untracked");
    write_file(root.path(), ".terraform/modules/net/net.tf", "cached module");
    git(root.path(), &["add", "main.tf", "vars/prod.tfvars"]);

    let tracked = FileSetSelector::new(
        root.path(),
        SelectionPolicy {
            tracked_only: true,
            ..Default::default()
        },
    )
    .select()
    .unwrap();
    assert_eq!(sorted(tracked.as_slice()), vec!["main.tf", "vars/prod.tfvars"]);

    let with_modules = FileSetSelector::new(
        root.path(),
        SelectionPolicy {
            tracked_only: true,
            include_modules: true,
            ..Default::default()
        },
    )
    .select()
    .unwrap();
    assert_eq!(
        sorted(with_modules.as_slice()),
        vec![".terraform/modules/net/net.tf", "main.tf", "vars/prod.tfvars"]
    );
}

#[test]
fn test_tracked_file_deleted_from_work_tree_is_skipped() {
    if !tools_available(&["git"]) {
        return;
    }
    let root = tempdir().unwrap();
    git_init(root.path());
    write_file(root.path(), "main.tf", "kept");
    write_file(root.path(), "gone.tf", "deleted later");
    git(root.path(), &["add", "-A"]);
    std::fs::remove_file(root.path().join("gone.tf")).unwrap();

    let files = FileSetSelector::new(
        root.path(),
        SelectionPolicy {
            tracked_only: true,
            ..Default::default()
        },
    )
    .select()
    .unwrap();
    assert_eq!(sorted(files.as_slice()), vec!["main.tf"]);
}

#[test]
fn test_tracked_only_outside_repository_fails() {
    if !tools_available(&["git"]) {
        return;
    }
    let root = tempdir().unwrap();
    write_file(root.path(), "main.tf", "x");

    let err = FileSetSelector::new(
        root.path(),
        SelectionPolicy {
            tracked_only: true,
            ..Default::default()
        },
    )
    .select()
    .unwrap_err();
    assert!(matches!(err, UploadError::NoVcsDetected(_)), "got {err}");
}
