//! End-to-end sync / pull / clean behaviour against an in-memory transport.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use tempfile::TempDir;
use truck_core::{DependencyDeclaration, Settings, TargetName};
use truck_sync::{
    manifest, ArtifactCache, CleanSelector, DependencyOutcome, Fetcher, InstalledManifest,
    MemoryTransport, SyncEngine, SyncError, SyncMode, SyncState,
};
use zip::write::SimpleFileOptions;

struct Fixture {
    _home: TempDir,
    settings: Settings,
    transport: MemoryTransport,
    engine: SyncEngine,
    specs: RefCell<BTreeMap<String, serde_json::Map<String, serde_json::Value>>>,
}

impl Fixture {
    fn new() -> Self {
        let home = TempDir::new().expect("home");
        let settings = Settings::new(home.path().join("project"))
            .with_cache_root(home.path().join("cache"))
            .with_progress(false);
        fs::create_dir_all(&settings.work_dir).expect("work dir");
        let transport = MemoryTransport::new();
        let fetcher = Fetcher::new(
            Box::new(transport.clone()),
            ArtifactCache::new(&settings.cache_root),
        );
        let engine = SyncEngine::new(settings.clone(), fetcher);
        Self {
            _home: home,
            settings,
            transport,
            engine,
            specs: RefCell::default(),
        }
    }

    /// Publish `version` of `name` with the given archive entries, adding it
    /// to the spec served for `name`.
    fn publish(&self, name: &str, version: &str, entries: &[(&str, &str)]) {
        let binary_url = format!("https://host/{name}/{version}/{name}.zip");
        self.transport.insert(binary_url.clone(), zip_bytes(entries));
        let mut specs = self.specs.borrow_mut();
        let spec = specs.entry(name.to_string()).or_default();
        spec.insert(version.to_string(), binary_url.into());
        self.transport
            .insert(spec_url(name), serde_json::Value::Object(spec.clone()).to_string());
    }

    fn root(&self) -> &Path {
        &self.settings.install_root
    }

    fn pin(&self, name: &str) -> Option<InstalledManifest> {
        manifest::load(&self.settings, &TargetName::from(name)).expect("load pin")
    }
}

fn spec_url(name: &str) -> String {
    format!("https://host/specs/{name}.json")
}

fn declare(name: &str, version: &str) -> DependencyDeclaration {
    DependencyDeclaration::declared(spec_url(name), version).expect("declaration")
}

fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        zip.start_file(*name, SimpleFileOptions::default())
            .expect("start file");
        zip.write_all(body.as_bytes()).expect("write entry");
    }
    zip.finish().expect("finish zip").into_inner()
}

fn synced_names(outcomes: &[DependencyOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .filter(|o| matches!(o, DependencyOutcome::Synced { .. }))
        .map(|o| o.name().to_string())
        .collect()
}

#[test]
fn second_sync_is_a_no_op() {
    let fx = Fixture::new();
    fx.publish("sdk", "1.0", &[("Sdk.framework/Sdk", "bin"), ("README.md", "hi")]);
    let declared = [declare("sdk", "1.0")];

    let first = fx.engine.sync(&declared, SyncMode::Stale).expect("sync");
    assert_eq!(synced_names(&first.outcomes), ["sdk"]);
    assert!(fx.root().join("Sdk.framework/Sdk").is_file());
    let pin = fx.pin("sdk").expect("pinned");
    assert_eq!(pin.version, "1.0");
    assert_eq!(pin.files.len(), 2);
    assert!(!fx.settings.scratch_dir().exists(), "scratch removed after batch");

    let requests = fx.transport.requests();
    let second = fx.engine.sync(&declared, SyncMode::Stale).expect("sync again");
    assert!(second.is_up_to_date());
    assert_eq!(second.up_to_date, [TargetName::from("sdk")]);
    assert_eq!(fx.transport.requests(), requests, "no network on second run");
    assert!(!fx.settings.scratch_dir().exists(), "empty batch touches no scratch");
}

#[test]
fn one_failing_dependency_does_not_stop_its_siblings() {
    let fx = Fixture::new();
    fx.publish("first", "1", &[("first.txt", "1")]);
    fx.publish("third", "1", &[("third.txt", "3")]);
    manifest::save(
        &fx.settings,
        &TargetName::from("second"),
        &InstalledManifest::new("0.9", Default::default()),
    )
    .expect("old pin");

    let declared = [declare("first", "1"), declare("second", "1"), declare("third", "1")];
    let report = fx.engine.sync(&declared, SyncMode::Stale).expect("sync");

    assert_eq!(synced_names(&report.outcomes), ["first", "third"]);
    let failed: Vec<_> = report.failures().map(|o| o.name().to_string()).collect();
    assert_eq!(failed, ["second"]);
    assert!(matches!(
        &report.outcomes[1],
        DependencyOutcome::Failed { error: SyncError::Fetch { .. }, .. }
    ));

    assert_eq!(fx.pin("first").expect("pin").version, "1");
    assert_eq!(fx.pin("third").expect("pin").version, "1");
    assert_eq!(fx.pin("second").expect("old pin kept").version, "0.9");
}

#[test]
fn replacing_a_dependency_keeps_files_shared_with_another() {
    let fx = Fixture::new();
    fx.publish("alpha", "1", &[("shared.txt", "a"), ("alpha-only.txt", "a")]);
    fx.publish("alpha", "2", &[("alpha-v2.txt", "a2")]);
    fx.publish("beta", "1", &[("shared.txt", "b"), ("beta-only.txt", "b")]);

    let v1 = [declare("alpha", "1"), declare("beta", "1")];
    fx.engine.sync(&v1, SyncMode::Stale).expect("initial sync");
    assert!(fx.root().join("shared.txt").is_file());

    let v2 = [declare("alpha", "2"), declare("beta", "1")];
    let report = fx.engine.sync(&v2, SyncMode::Stale).expect("upgrade");
    assert_eq!(synced_names(&report.outcomes), ["alpha"]);

    assert!(fx.root().join("shared.txt").is_file(), "beta still owns it");
    assert!(!fx.root().join("alpha-only.txt").exists());
    assert!(fx.root().join("alpha-v2.txt").is_file());
    assert!(fx.root().join("beta-only.txt").is_file());
}

#[test]
fn cleaning_one_target_protects_shared_files() {
    let fx = Fixture::new();
    fx.publish("alpha", "1", &[("shared.txt", "a"), ("alpha-only.txt", "a")]);
    fx.publish("beta", "1", &[("shared.txt", "b")]);
    let declared = [declare("alpha", "1"), declare("beta", "1")];
    fx.engine.sync(&declared, SyncMode::Stale).expect("sync");

    let report = fx
        .engine
        .clean(&declared, &CleanSelector::parse("ALPHA"))
        .expect("clean");
    assert_eq!(report.cleaned.len(), 1);
    assert_eq!(report.cleaned[0].protected, ["shared.txt"]);
    assert_eq!(report.cleaned[0].removed, ["alpha-only.txt"]);

    assert!(fx.root().join("shared.txt").is_file());
    assert!(!fx.root().join("alpha-only.txt").exists());
    assert!(fx.pin("alpha").is_none());
    assert!(fx.pin("beta").is_some());
}

#[test]
fn clean_nonexistent_removes_only_undeclared_targets() {
    let fx = Fixture::new();
    fx.publish("alpha", "1", &[("shared.txt", "a"), ("alpha-only.txt", "a")]);
    fx.publish("beta", "1", &[("shared.txt", "b"), ("beta-only.txt", "b")]);
    fx.engine
        .sync(&[declare("alpha", "1"), declare("beta", "1")], SyncMode::Stale)
        .expect("sync");

    let still_declared = [declare("beta", "1")];
    let report = fx
        .engine
        .clean(&still_declared, &CleanSelector::Nonexistent)
        .expect("clean");

    let cleaned: Vec<_> = report.cleaned.iter().map(|c| c.name.to_string()).collect();
    assert_eq!(cleaned, ["alpha"]);
    assert!(fx.root().join("shared.txt").is_file());
    assert!(fx.root().join("beta-only.txt").is_file());
    assert!(!fx.root().join("alpha-only.txt").exists());
}

#[test]
fn clean_all_removes_every_pin_and_file() {
    let fx = Fixture::new();
    fx.publish("alpha", "1", &[("shared.txt", "a")]);
    fx.publish("beta", "1", &[("shared.txt", "b"), ("beta-only.txt", "b")]);
    let declared = [declare("alpha", "1"), declare("beta", "1")];
    fx.engine.sync(&declared, SyncMode::Stale).expect("sync");

    let report = fx.engine.clean(&declared, &CleanSelector::All).expect("clean");
    assert_eq!(report.cleaned.len(), 2);
    assert!(!fx.root().join("shared.txt").exists());
    assert!(!fx.root().join("beta-only.txt").exists());
    assert!(manifest::discover(&fx.settings).expect("discover").is_empty());
}

#[test]
fn clean_drops_the_pin_even_when_a_file_cannot_be_removed() {
    let fx = Fixture::new();
    fx.publish("sdk", "1.0", &[("lib.a", "archive")]);
    let declared = [declare("sdk", "1.0")];
    fx.engine.sync(&declared, SyncMode::Stale).expect("sync");

    let outside = fx.settings.work_dir.join("x");
    fs::write(&outside, "not ours").expect("outside file");
    let files: BTreeSet<String> = ["lib.a", "../x"].into_iter().map(String::from).collect();
    manifest::save(
        &fx.settings,
        &TargetName::from("sdk"),
        &InstalledManifest::new("1.0", files),
    )
    .expect("rewrite pin");

    let report = fx
        .engine
        .clean(&declared, &CleanSelector::Target("sdk".into()))
        .expect("clean");
    let cleaned = &report.cleaned[0];
    assert_eq!(cleaned.warnings.len(), 1, "{:?}", cleaned.warnings);
    assert!(cleaned.warnings[0].contains("../x"));
    assert!(!fx.root().join("lib.a").exists());
    assert!(outside.is_file());
    assert!(fx.pin("sdk").is_none());
}

#[test]
fn pull_restores_deleted_files_from_cache() {
    let fx = Fixture::new();
    fx.publish("sdk", "1.0", &[("lib.a", "archive")]);
    let declared = [declare("sdk", "1.0")];
    fx.engine.sync(&declared, SyncMode::Stale).expect("sync");
    fs::remove_file(fx.root().join("lib.a")).expect("delete");

    let requests = fx.transport.requests();
    let report = fx.engine.sync(&declared, SyncMode::All).expect("pull");
    assert_eq!(synced_names(&report.outcomes), ["sdk"]);
    assert!(fx.root().join("lib.a").is_file());
    assert_eq!(fx.transport.requests(), requests, "spec and binary served from cache");
}

#[test]
fn corrupt_archive_fails_without_touching_the_old_pin() {
    let fx = Fixture::new();
    fx.publish("sdk", "1.0", &[("lib.a", "v1")]);
    fx.engine
        .sync(&[declare("sdk", "1.0")], SyncMode::Stale)
        .expect("sync v1");

    fx.transport.insert(
        spec_url("sdk"),
        r#"{"1.0": "https://host/sdk/1.0/sdk.zip", "2.0": "https://host/sdk/2.0/broken.zip"}"#,
    );
    fx.transport
        .insert("https://host/sdk/2.0/broken.zip", "not a zip at all");

    let report = fx
        .engine
        .sync(&[declare("sdk", "2.0")], SyncMode::Stale)
        .expect("sync v2");
    assert!(matches!(
        &report.outcomes[0],
        DependencyOutcome::Failed { error: SyncError::Archive { .. }, .. }
    ));
    assert_eq!(fx.pin("sdk").expect("pin").version, "1.0");
}

#[test]
fn status_reports_every_state() {
    let fx = Fixture::new();
    fx.publish("current", "1", &[("c.txt", "c")]);
    fx.publish("bumped", "1", &[("b.txt", "b")]);
    fx.publish("gone", "1", &[("g.txt", "g")]);
    fx.engine
        .sync(
            &[declare("current", "1"), declare("bumped", "1"), declare("gone", "1")],
            SyncMode::Stale,
        )
        .expect("sync");

    let declared = [declare("current", "1"), declare("bumped", "2"), declare("fresh", "1")];
    let rows = fx.engine.status(&declared).expect("status");
    let states: Vec<_> = rows
        .iter()
        .map(|r| (r.name.to_string(), r.state.clone()))
        .collect();
    assert_eq!(
        states,
        [
            ("current".to_string(), SyncState::Current),
            (
                "bumped".to_string(),
                SyncState::Stale {
                    installed: "1".to_string()
                }
            ),
            ("fresh".to_string(), SyncState::NeverSynced),
            ("gone".to_string(), SyncState::Orphaned),
        ]
    );
    assert!(rows[0].is_in_sync());
    assert!(!rows[1].is_in_sync());
}

#[test]
fn nuke_cache_forces_network_again() {
    let fx = Fixture::new();
    fx.publish("sdk", "1.0", &[("lib.a", "v1")]);
    let declared = [declare("sdk", "1.0")];
    fx.engine.sync(&declared, SyncMode::Stale).expect("sync");
    assert!(fx.engine.nuke_cache().expect("nuke"));

    let requests = fx.transport.requests();
    fx.engine.sync(&declared, SyncMode::All).expect("pull");
    assert_eq!(fx.transport.requests(), requests + 2);
}
