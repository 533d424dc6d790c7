//! Declaration-file error messages, atomic rewrite safety, and entry
//! validation against real files.

use assert_fs::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use truck_core::{declarations, ConfigError, Provenance};

#[test]
fn missing_declaration_file_message_names_file() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = declarations::load_at(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::DeclarationNotFound { .. }));
    assert!(err.to_string().contains("truck.json"));
}

#[test]
fn corrupt_declaration_file_reports_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child("truck.json")
        .write_str("[{\"url\": \"https://x/a.json\",")
        .expect("write");

    let err = declarations::load_at(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("truck.json"));
}

#[rstest]
#[case(r#"[{"url": "https://x/a.json"}]"#, "missing version")]
#[case(r#"[{"version": "1.0"}]"#, "missing url")]
#[case(r#"[{}]"#, "expected")]
#[case(r#"[{"name": "a", "version": "1.0"}]"#, "not both")]
#[case(r#"[{"url": "?q=1", "version": "1.0"}]"#, "cannot derive")]
#[case(r#"[{"name": "../../x"}]"#, "path separators")]
#[case(r#"[{"name": "a\\b"}]"#, "path separators")]
#[case(r#"[{"name": ".."}]"#, "path separators")]
fn invalid_entries_are_rejected(#[case] json: &str, #[case] reason: &str) {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child("truck.json").write_str(json).expect("write");

    let err = declarations::load_dependencies_at(dir.path()).unwrap_err();
    assert!(
        err.to_string().contains(reason),
        "expected '{reason}' in '{err}'"
    );
}

#[test]
fn set_version_preserves_order_and_leaves_no_tmp() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("truck.json");
    file.write_str(
        r#"[
  {"url": "https://host/specs/zendesk-sdk.json", "version": "3.0.1"},
  {"name": "legacy-assets"},
  {"url": "https://host/specs/analytics.json", "version": "1.4"}
]"#,
    )
    .expect("write");

    declarations::set_version_at(dir.path(), "Zendesk-SDK", "3.0.2").expect("set_version");

    file.assert(predicate::str::contains("3.0.2"));
    file.assert(predicate::str::contains("3.0.1").not());
    dir.child("truck.json.tmp").assert(predicate::path::missing());

    let deps = declarations::load_dependencies_at(dir.path()).expect("reload");
    let names: Vec<_> = deps.iter().map(|d| d.name.to_string()).collect();
    assert_eq!(names, ["zendesk-sdk", "legacy-assets", "analytics"]);
    assert_eq!(deps[1].provenance, Provenance::Discovered);
}
