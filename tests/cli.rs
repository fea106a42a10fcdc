//! CLI integration tests for the vellum binary.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir_str(&self) -> String {
        self.temp_dir.path().to_string_lossy().to_string()
    }

    fn cmd(&self, user: &str) -> Command {
        let mut cmd = Command::cargo_bin("vellum").expect("failed to find binary");
        cmd.env("NO_COLOR", "1")
            .args(["--data-dir", &self.data_dir_str(), "--user", user]);
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd("admin").arg("init").assert()
    }

    /// Runs a command as `user`, asserts success and parses its JSON output.
    fn json(&self, user: &str, args: &[&str]) -> Value {
        let output = self
            .cmd(user)
            .args(args)
            .output()
            .expect("failed to run command");
        assert!(
            output.status.success(),
            "command {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("failed to parse JSON")
    }

    /// Initializes the data dir with organization `acme`, project `crm` and
    /// collection `contacts`, all owned by `admin`.
    fn seeded() -> Self {
        let ctx = Self::new();
        ctx.init().success();
        ctx.json("admin", &["org", "create", "--code", "acme", "--name", "Acme"]);
        ctx.json("admin", &["project", "create", "--org", "acme", "--code", "crm"]);
        ctx.json(
            "admin",
            &[
                "collection", "create", "--org", "acme", "--project", "crm", "--code", "contacts",
            ],
        );
        ctx
    }
}

const WS: [&str; 4] = ["--org", "acme", "--project", "crm"];

fn with_ws<'a>(head: &[&'a str], tail: &[&'a str]) -> Vec<&'a str> {
    let mut args = head.to_vec();
    for arg in WS {
        args.push(arg);
    }
    args.extend_from_slice(tail);
    args
}

fn usage(collection: &Value, attribute: &str) -> Option<u64> {
    collection["attributes"]
        .as_array()?
        .iter()
        .find(|a| a["id"] == attribute)?["usage_count"]
        .as_u64()
}

#[test]
fn test_init_creates_database_and_config() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("\"created_config\": true"));

    ctx.temp_dir.child("vellum.db").assert(predicate::path::exists());
    ctx.temp_dir
        .child("vellum.toml")
        .assert(predicate::str::contains("db_file = \"vellum.db\""));

    ctx.init()
        .success()
        .stdout(predicate::str::contains("\"created_config\": false"));
}

#[test]
fn test_commands_require_init() {
    let ctx = TestContext::new();

    ctx.cmd("admin")
        .args(["org", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("vellum init"));
}

#[test]
fn test_document_lifecycle() {
    let ctx = TestContext::seeded();

    let created = ctx.json(
        "admin",
        &with_ws(
            &["doc", "create"],
            &["--collection", "contacts", "--data", r#"{"name":"Ada","city":"London"}"#],
        ),
    );
    let id = created["id"].as_str().expect("id not a string").to_string();
    assert_eq!(created["data"]["name"], "Ada");

    let patched = ctx.json(
        "admin",
        &with_ws(
            &["doc", "update"],
            &["--collection", "contacts", "--id", &id, "--data", r#"{"phone":"555"}"#],
        ),
    );
    assert_eq!(patched["data"]["city"], "London");
    assert_eq!(patched["data"]["phone"], "555");

    let replaced = ctx.json(
        "admin",
        &with_ws(
            &["doc", "update"],
            &[
                "--collection",
                "contacts",
                "--id",
                &id,
                "--data",
                r#"{"name":"Ada"}"#,
                "--replace",
            ],
        ),
    );
    assert!(replaced["data"].get("city").is_none());

    let collection = ctx.json(
        "admin",
        &with_ws(&["collection", "show"], &["--collection", "contacts"]),
    );
    assert_eq!(collection["documents_count"], 1);
    assert_eq!(usage(&collection, "name"), Some(1));
    assert_eq!(usage(&collection, "city"), Some(0));

    ctx.json(
        "admin",
        &with_ws(&["doc", "delete"], &["--collection", "contacts", "--id", &id]),
    );
    let collection = ctx.json(
        "admin",
        &with_ws(&["collection", "show"], &["--collection", "contacts"]),
    );
    assert_eq!(collection["documents_count"], 0);
    assert_eq!(usage(&collection, "name"), Some(0));
}

#[test]
fn test_import_from_file() {
    let ctx = TestContext::seeded();
    let file = ctx.temp_dir.child("people.json");
    file.write_str(r#"[{"name":"Ada"},{"name":"Grace"},{"city":"Oslo"}]"#)
        .expect("failed to write import file");
    let path = file.path().to_string_lossy().to_string();

    let imported = ctx.json(
        "admin",
        &with_ws(&["doc", "import"], &["--collection", "contacts", "--file", &path]),
    );
    assert_eq!(imported["imported"], 3);

    let listed = ctx.json(
        "admin",
        &with_ws(&["doc", "list"], &["--collection", "contacts"]),
    );
    assert_eq!(listed.as_array().map(Vec::len), Some(3));
}

#[test]
fn test_import_rejects_non_object_items() {
    let ctx = TestContext::seeded();
    let file = ctx.temp_dir.child("mixed.json");
    file.write_str(r#"[{"name":"Ada"},5,{"$date":"2024-01-01T00:00:00Z"}]"#)
        .expect("failed to write import file");
    let path = file.path().to_string_lossy().to_string();

    ctx.cmd("admin")
        .args(with_ws(
            &["doc", "import"],
            &["--collection", "contacts", "--file", &path],
        ))
        .assert()
        .failure()
        .stderr(predicate::str::contains("item 1"))
        .stderr(predicate::str::contains("Expected a JSON object"));

    let listed = ctx.json(
        "admin",
        &with_ws(&["doc", "list"], &["--collection", "contacts"]),
    );
    assert_eq!(listed.as_array().map(Vec::len), Some(0));
}

#[test]
fn test_read_only_member_is_denied_writes() {
    let ctx = TestContext::seeded();
    let created = ctx.json(
        "admin",
        &with_ws(
            &["doc", "create"],
            &["--collection", "contacts", "--data", r#"{"name":"Ada"}"#],
        ),
    );
    let id = created["id"].as_str().expect("id not a string").to_string();

    ctx.json(
        "admin",
        &["org", "share", "--org", "acme", "--member", "bob", "--roles", "read"],
    );
    ctx.json(
        "admin",
        &with_ws(&["project", "share"], &["--member", "bob", "--roles", "read,write"]),
    );

    ctx.cmd("bob")
        .args(with_ws(
            &["doc", "update"],
            &["--collection", "contacts", "--id", &id, "--data", r#"{"name":"Eve"}"#],
        ))
        .assert()
        .failure()
        .stderr(predicate::str::contains("permission denied"));

    ctx.cmd("carol")
        .args(with_ws(&["collection", "list"], &[]))
        .assert()
        .failure()
        .stderr(predicate::str::contains("permission denied"));
}

#[test]
fn test_attribute_constraint_and_removal() {
    let ctx = TestContext::seeded();
    ctx.json(
        "admin",
        &with_ws(
            &["attribute", "set"],
            &[
                "--collection",
                "contacts",
                "--id",
                "age",
                "--constraint",
                r#"{"type":"number"}"#,
            ],
        ),
    );

    let created = ctx.json(
        "admin",
        &with_ws(
            &["doc", "create"],
            &["--collection", "contacts", "--data", r#"{"age":"42","name":"Ada"}"#],
        ),
    );
    assert_eq!(created["data"]["age"], 42);
    let id = created["id"].as_str().expect("id not a string").to_string();

    let collection = ctx.json(
        "admin",
        &with_ws(
            &["attribute", "remove"],
            &["--collection", "contacts", "--id", "age"],
        ),
    );
    assert_eq!(usage(&collection, "age"), None);

    let fetched = ctx.json(
        "admin",
        &with_ws(&["doc", "get"], &["--collection", "contacts", "--id", &id]),
    );
    assert!(fetched["data"].get("age").is_none());
    assert_eq!(fetched["data"]["name"], "Ada");
}

#[test]
fn test_links_and_favorites() {
    let ctx = TestContext::seeded();
    ctx.json(
        "admin",
        &with_ws(&["collection", "create"], &["--code", "companies"]),
    );
    let ada = ctx.json(
        "admin",
        &with_ws(
            &["doc", "create"],
            &["--collection", "contacts", "--data", r#"{"name":"Ada"}"#],
        ),
    );
    let acme = ctx.json(
        "admin",
        &with_ws(
            &["doc", "create"],
            &["--collection", "companies", "--data", r#"{"name":"Acme"}"#],
        ),
    );
    let ada_id = ada["id"].as_str().expect("id not a string").to_string();
    let acme_id = acme["id"].as_str().expect("id not a string").to_string();

    let link_type = ctx.json(
        "admin",
        &with_ws(
            &["link", "create-type"],
            &["--name", "works at", "--from", "contacts", "--to", "companies"],
        ),
    );
    let type_id = link_type["id"].as_str().expect("id not a string").to_string();
    ctx.json(
        "admin",
        &with_ws(
            &["link", "create"],
            &["--link-type", &type_id, "--from", &ada_id, "--to", &acme_id],
        ),
    );

    ctx.json(
        "admin",
        &with_ws(
            &["favorite", "add"],
            &["--collection", "contacts", "--document", &ada_id],
        ),
    );
    let favorites = ctx.json(
        "admin",
        &with_ws(&["favorite", "list"], &["--type", "document"]),
    );
    assert_eq!(favorites, serde_json::json!([ada_id.clone()]));

    ctx.json(
        "admin",
        &with_ws(&["doc", "delete"], &["--collection", "contacts", "--id", &ada_id]),
    );

    let links = ctx.json(
        "admin",
        &with_ws(
            &["link", "list"],
            &["--collection", "companies", "--document", &acme_id],
        ),
    );
    assert_eq!(links.as_array().map(Vec::len), Some(0));
    let favorites = ctx.json(
        "admin",
        &with_ws(&["favorite", "list"], &["--type", "document"]),
    );
    assert_eq!(favorites, serde_json::json!([]));
}

#[test]
fn test_project_limit() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.json(
        "admin",
        &["org", "create", "--code", "tiny", "--max-projects", "1"],
    );
    ctx.json("admin", &["project", "create", "--org", "tiny", "--code", "one"]);

    ctx.cmd("admin")
        .args(["project", "create", "--org", "tiny", "--code", "two"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("limit exceeded"));
}
