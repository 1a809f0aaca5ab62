//! Fixture scaffolding for MCP tool integration tests: builds a small
//! service catalog plus a date/hour-partitioned log tree under a temp dir.

use std::path::{Path, PathBuf};

/// The window every fixture log file lives within. Fixed rather than
/// `Utc::now()`-relative so tests are deterministic regardless of when
/// they run.
pub const FIXTURE_HOUR: (i32, u32, u32, u32) = (2026, 1, 15, 9);

/// Write a one-service catalog and matching log tree under `root`.
/// `root/logs/{YYYY}/{MM}/{DD}/{HH}/app.log` gets `lines`, one per call.
/// Returns the catalog file's path.
pub fn write_catalog(root: &Path, lines: &[&str]) -> PathBuf {
    let (y, m, d, h) = FIXTURE_HOUR;
    let hour_dir = root.join("logs").join(format!("{y:04}")).join(format!("{m:02}")).join(format!("{d:02}")).join(format!("{h:02}"));
    std::fs::create_dir_all(&hour_dir).expect("failed to create fixture log directory");
    std::fs::write(hour_dir.join("app.log"), lines.join("\n") + "\n").expect("failed to write fixture log file");

    let template = root.join("logs").join("{YYYY}/{MM}/{DD}/{HH}/*.log").to_string_lossy().to_string();
    let catalog_path = root.join("services.toml");
    std::fs::write(
        &catalog_path,
        format!(
            r#"
[[services]]
name = "hub-ca-auth"
alternate_names = ["auth-service"]
path_template = "{template}"
"#
        ),
    )
    .expect("failed to write fixture catalog");
    catalog_path
}

/// Write a three-service, locale-qualified catalog (`hub-ca-auth`,
/// `hub-us-auth`, `hub-na-auth`), each with one matching log line under
/// the fixture hour. Used by fuzzy-resolution tests that expect a bare
/// `"auth"` query to fan out across all three locale families.
pub fn write_multi_locale_catalog(root: &Path, line: &str) -> PathBuf {
    let (y, m, d, h) = FIXTURE_HOUR;
    let mut catalog_body = String::new();
    for locale in ["ca", "us", "na"] {
        let hour_dir =
            root.join("logs").join(locale).join(format!("{y:04}")).join(format!("{m:02}")).join(format!("{d:02}")).join(format!("{h:02}"));
        std::fs::create_dir_all(&hour_dir).expect("failed to create fixture log directory");
        std::fs::write(hour_dir.join("app.log"), format!("{line}\n")).expect("failed to write fixture log file");

        let template = root.join("logs").join(locale).join("{YYYY}/{MM}/{DD}/{HH}/*.log").to_string_lossy().to_string();
        catalog_body.push_str(&format!(
            r#"
[[services]]
name = "hub-{locale}-auth"
path_template = "{template}"
"#
        ));
    }
    let catalog_path = root.join("services.toml");
    std::fs::write(&catalog_path, catalog_body).expect("failed to write fixture catalog");
    catalog_path
}
