//! Integration tests for the taskorder CLI.
//!
//! Each test runs the binary inside a fresh temp directory so the default
//! `.taskorder/` paths never touch the working tree.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a taskorder Command isolated from the caller's env.
fn taskorder(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("taskorder");
    cmd.current_dir(dir.path())
        .env_remove("TASKORDER_CONFIG")
        .env_remove("TASKORDER_REMOTE_URL")
        .env_remove("TASKORDER_REMOTE_TOKEN")
        .env_remove("TASKORDER_PORT")
        .env_remove("RUST_LOG");
    cmd
}

fn add(dir: &TempDir, collection: &str, title: &str) {
    taskorder(dir)
        .args(["add", collection, title])
        .assert()
        .success();
}

fn list_json(dir: &TempDir, collection: &str) -> Vec<serde_json::Value> {
    let output = taskorder(dir)
        .args(["list", collection, "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

fn titles(items: &[serde_json::Value]) -> Vec<String> {
    items
        .iter()
        .map(|i| i["title"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("renumber"));
    }

    #[test]
    fn test_version() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_database_and_config() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Board database initialized"));

        assert!(dir.path().join(".taskorder/board.db").exists());
        assert!(dir.path().join(".taskorder/taskorder.toml").exists());

        // Second init keeps the existing config
        taskorder(&dir)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Config already exists"));
    }
}

// =============================================================================
// Key calculation
// =============================================================================

mod key {
    use super::*;

    #[test]
    fn test_key_between_neighbours() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .args(["key", "--prev", "10", "--next", "20"])
            .assert()
            .success()
            .stdout("15\n");
    }

    #[test]
    fn test_key_edges() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir).arg("key").assert().success().stdout("100000\n");
        taskorder(&dir)
            .args(["key", "--next", "50"])
            .assert()
            .success()
            .stdout("25\n");
        taskorder(&dir)
            .args(["key", "--prev", "20"])
            .assert()
            .success()
            .stdout("120\n");
    }

    #[test]
    fn test_key_negative_neighbour() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .args(["key", "--prev", "-5", "--next", "5"])
            .assert()
            .success()
            .stdout("0\n");
    }

    #[test]
    fn test_key_rejects_non_finite() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .args(["key", "--prev", "inf"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("finite"));
    }
}

// =============================================================================
// Local collections
// =============================================================================

mod collections {
    use super::*;

    #[test]
    fn test_add_and_list() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .args(["add", "tasks", "Buy seeds"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Added #1"));
        add(&dir, "tasks", "Water beds");

        taskorder(&dir)
            .args(["list", "tasks"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Buy seeds").and(predicate::str::contains("Water beds")));

        let items = list_json(&dir, "tasks");
        assert_eq!(titles(&items), vec!["Buy seeds", "Water beds"]);
        assert_eq!(items[0]["sort_key"], 100000.0);
        assert_eq!(items[1]["sort_key"], 100100.0);
    }

    #[test]
    fn test_list_empty_collection() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .args(["list", "nothing"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No items in nothing"));
    }

    #[test]
    fn test_move_to_front() {
        let dir = TempDir::new().unwrap();
        add(&dir, "tasks", "A");
        add(&dir, "tasks", "B");
        add(&dir, "tasks", "C");

        taskorder(&dir)
            .args(["move", "tasks", "3", "0"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Moved 3 in tasks (key 50000)"));

        let items = list_json(&dir, "tasks");
        assert_eq!(titles(&items), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_move_between() {
        let dir = TempDir::new().unwrap();
        add(&dir, "tasks", "A");
        add(&dir, "tasks", "B");
        add(&dir, "tasks", "C");

        taskorder(&dir)
            .args(["move", "tasks", "1", "1"])
            .assert()
            .success();

        let items = list_json(&dir, "tasks");
        assert_eq!(titles(&items), vec!["B", "A", "C"]);
        assert_eq!(items[1]["sort_key"], 100150.0);
    }

    #[test]
    fn test_move_in_place_is_noop() {
        let dir = TempDir::new().unwrap();
        add(&dir, "tasks", "A");
        taskorder(&dir)
            .args(["move", "tasks", "1", "0"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already at that position"));
    }

    #[test]
    fn test_move_unknown_item_fails() {
        let dir = TempDir::new().unwrap();
        add(&dir, "tasks", "A");
        taskorder(&dir)
            .args(["move", "tasks", "99", "0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Item 99 not found"));
    }

    #[test]
    fn test_move_collision_renumbers() {
        let dir = TempDir::new().unwrap();
        for (title, key) in [("A", "0"), ("B", "0"), ("C", "5")] {
            taskorder(&dir)
                .args(["add", "tasks", title, "--key", key])
                .assert()
                .success();
        }

        taskorder(&dir)
            .args(["move", "tasks", "3", "0"])
            .assert()
            .success()
            .stdout(predicate::str::contains("renumbered"));

        let items = list_json(&dir, "tasks");
        assert_eq!(titles(&items), vec!["C", "A", "B"]);
        let keys: Vec<f64> = items.iter().map(|i| i["sort_key"].as_f64().unwrap()).collect();
        assert_eq!(keys, vec![1000.0, 2000.0, 3000.0]);
    }

    #[test]
    fn test_renumber() {
        let dir = TempDir::new().unwrap();
        for (title, key) in [("A", "0.5"), ("B", "0.75")] {
            taskorder(&dir)
                .args(["add", "tasks", title, "--key", key])
                .assert()
                .success();
        }

        taskorder(&dir)
            .args(["renumber", "tasks"])
            .assert()
            .success()
            .stdout(predicate::str::contains("2 keys rewritten"));

        let items = list_json(&dir, "tasks");
        assert_eq!(titles(&items), vec!["A", "B"]);
        assert_eq!(items[1]["sort_key"], 2000.0);
    }

    #[test]
    fn test_db_path_flag() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .args(["--db-path", "custom/board.db", "add", "tasks", "Elsewhere"])
            .assert()
            .success();
        assert!(dir.path().join("custom/board.db").exists());
        assert!(!dir.path().join(".taskorder/board.db").exists());
    }

    #[test]
    fn test_remote_requires_url() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .args(["list", "tbl_tasks", "--remote"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No remote configured"));
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("using defaults")
                    .and(predicate::str::contains("[ordering]"))
                    .and(predicate::str::contains("port = 3142")),
            );
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created taskorder.toml"));

        let content = fs::read_to_string(dir.path().join(".taskorder/taskorder.toml")).unwrap();
        assert!(content.contains("append_gap"));
    }

    #[test]
    fn test_config_init_at_explicit_path() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .args(["--config", "alt.toml", "config", "init"])
            .assert()
            .success();
        assert!(dir.path().join("alt.toml").exists());
    }

    #[test]
    fn test_config_append_gap_applies() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".taskorder")).unwrap();
        fs::write(
            dir.path().join(".taskorder/taskorder.toml"),
            "[ordering]\nappend_gap = 10.0\n",
        )
        .unwrap();
        add(&dir, "tasks", "A");
        add(&dir, "tasks", "B");
        add(&dir, "tasks", "C");

        taskorder(&dir)
            .args(["move", "tasks", "1", "2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("key 100030"));
    }

    #[test]
    fn test_config_validate_reports_problems() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("bad.toml"),
            "[ordering]\nrenumber_step = 0.0\n",
        )
        .unwrap();
        taskorder(&dir)
            .args(["--config", "bad.toml", "config", "validate"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("renumber_step"));
    }

    #[test]
    fn test_negative_renumber_step_refuses_to_run() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("bad.toml"),
            "[ordering]\nrenumber_step = -1000.0\n",
        )
        .unwrap();
        taskorder(&dir)
            .args(["--config", "bad.toml", "add", "tasks", "A"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("renumber_step"));
        assert!(!dir.path().join(".taskorder/board.db").exists());
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = TempDir::new().unwrap();
        taskorder(&dir)
            .args(["--config", "missing.toml", "list", "tasks"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read config file"));
    }
}

// =============================================================================
// Remote Store Tests
// =============================================================================

mod remote {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::get};
    use serde_json::{Value, json};

    /// Serves two records and rejects every update.
    fn spawn_read_only_table() -> String {
        let app = Router::new().route(
            "/api/v2/tables/{table}/records",
            get(|| async {
                Json(json!({
                    "list": [
                        {"Id": 1, "Sort Order": 10},
                        {"Id": 2, "Sort Order": 20}
                    ],
                    "pageInfo": {"isLastPage": true}
                }))
            })
            .patch(|Json(_): Json<Value>| async { StatusCode::SERVICE_UNAVAILABLE }),
        );

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            runtime.block_on(async move {
                axum::serve(listener, app).await.unwrap();
            })
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_failed_remote_move_prints_reloaded_order() {
        let dir = TempDir::new().unwrap();
        let base = spawn_read_only_table();

        taskorder(&dir)
            .env("TASKORDER_REMOTE_URL", &base)
            .args(["move", "tbl", "2", "0", "--remote"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("not persisted"))
            .stdout(predicate::str::is_match(r"0\s+1\s+10\n\s*1\s+2\s+20").unwrap())
            .stderr(predicate::str::contains("Move not persisted"));
    }
}
