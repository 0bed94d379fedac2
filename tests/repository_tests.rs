// End-to-end repository behavior: install, run, aggregate, report

#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use tempfile::TempDir;

use henv::{EnvironmentManager, HenvError, Hook, Repository, XargsConfig};

fn repository(hooks: Vec<Hook>) -> (TempDir, TempDir, Repository) {
    let root = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let manager = Arc::new(EnvironmentManager::new(cache.path()).unwrap());
    let repo = Repository::new(root.path(), hooks, manager);
    (root, cache, repo)
}

#[tokio::test]
async fn install_populates_environment_directories() {
    let (_root, cache, repo) = repository(vec![
        Hook::new("echo", "echo", "system"),
        Hook::new("list", "ls", "system"),
    ]);
    repo.install().await.unwrap();

    let entries: Vec<_> = std::fs::read_dir(cache.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .collect();
    // Both hooks share one identity: same language, version and deps.
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn run_a_hook_with_files() {
    let (_root, _cache, repo) = repository(vec![Hook::new("echo", "echo", "system")]);
    repo.install().await.unwrap();

    let result = repo
        .run_hook("echo", &["/dev/null".to_string()])
        .await
        .unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output, "/dev/null\n");
}

#[tokio::test]
async fn run_a_hook_lots_of_files() {
    let (_root, _cache, repo) = repository(vec![Hook::new("echo", "echo", "system")]);
    let files = vec!["/dev/null".to_string(); 15000];
    let result = repo.run_hook("echo", &files).await.unwrap();

    assert_eq!(result.exit_code, 0);
    assert!(result.batch_count > 1);
    assert_eq!(result.output.split_whitespace().count(), 15000);
}

#[tokio::test]
async fn fixed_args_precede_filenames_in_every_batch() {
    let (_root, _cache, repo) = repository(vec![
        Hook::new("echo", "echo", "system").with_args(vec!["prefix".to_string()])
    ]);
    let files: Vec<String> = (0..5000).map(|i| format!("f{i}")).collect();
    let result = repo.run_hook("echo", &files).await.unwrap();

    assert_eq!(result.exit_code, 0);
    for line in result.output.lines() {
        assert!(line.starts_with("prefix "), "batch lost its fixed args: {line}");
    }
}

#[tokio::test]
async fn hook_runs_in_the_repository_root() {
    let (root, _cache, repo) = repository(vec![
        Hook::new("prints-cwd", "pwd", "system").with_pass_filenames(false)
    ]);
    let result = repo.run_hook("prints-cwd", &[]).await.unwrap();

    assert_eq!(result.exit_code, 0);
    let reported = std::fs::canonicalize(result.output.trim()).unwrap();
    assert_eq!(reported, std::fs::canonicalize(root.path()).unwrap());
}

#[tokio::test]
async fn failing_hook_surfaces_all_batch_output() {
    let script_dir = TempDir::new().unwrap();
    let script = script_dir.path().join("flaky.sh");
    {
        let mut f = std::fs::File::create(&script).unwrap();
        writeln!(f, "#!/bin/sh").unwrap();
        writeln!(f, "status=0").unwrap();
        writeln!(f, "for f in \"$@\"; do").unwrap();
        writeln!(f, "  case \"$f\" in *broken*) echo \"fail $f\"; status=1 ;; *) echo \"pass $f\" ;; esac").unwrap();
        writeln!(f, "done").unwrap();
        writeln!(f, "exit $status").unwrap();
    }
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let (_root, _cache, repo) = repository(vec![Hook::new(
        "flaky",
        script.to_string_lossy(),
        "system",
    )]);
    let repo = repo.with_xargs_config(XargsConfig::with_max_length(512));

    let mut files: Vec<String> = (0..120).map(|i| format!("ok-{i:03}.txt")).collect();
    files[10] = "broken-010.txt".to_string();
    let result = repo.run_hook("flaky", &files).await.unwrap();

    assert_eq!(result.exit_code, 1);
    assert!(result.output.contains("fail broken-010.txt"));
    assert!(result.output.contains("pass ok-119.txt"));
    assert_eq!(result.output.lines().count(), 120);
}

#[tokio::test]
async fn missing_hook_entry_is_a_process_error() {
    let (_root, _cache, repo) = repository(vec![Hook::new(
        "ghost",
        "henv-no-such-entry",
        "system",
    )]);
    let err = repo.run_hook("ghost", &[]).await.unwrap_err();
    assert!(matches!(err, HenvError::Process(_)));
    assert!(err.to_string().contains("Command not found"));
}

#[tokio::test]
async fn languages_reports_the_union_of_tags() {
    let (_root, _cache, repo) = repository(vec![
        Hook::new("a", "echo", "system"),
        Hook::new("b", "flake8", "conda"),
        Hook::new("c", "ls", "system"),
    ]);
    let languages = repo.languages();
    assert_eq!(languages.len(), 2);
    assert!(languages.contains("conda"));
    assert!(languages.contains("system"));
}

#[tokio::test]
async fn unknown_language_tag_fails_install() {
    let (_root, _cache, repo) = repository(vec![Hook::new("x", "x", "fortran")]);
    let err = repo.install().await.unwrap_err();
    assert!(matches!(err, HenvError::Config(_)));
}
