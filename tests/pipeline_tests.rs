//! End-to-end tests: all three stages over small on-disk archives.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

use digestnorm::config::Config;
use digestnorm::error::DigestError;
use digestnorm::model::email::Email;
use digestnorm::model::flag::Flag;
use digestnorm::model::stats::Stage;
use digestnorm::pipeline::snapshot::{read_json, OutputLayout};
use digestnorm::pipeline::{snapshot_exists, Pipeline, Tables};
use digestnorm::resolve::{ArtifactDenylist, RemovedArtifact};
use digestnorm::spam::SpamEntry;

const DELIM: &str = "From cypherpunks@MHonArc.venona  Wed Dec 17 23:17:14 2003";

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn config_for(out: &Path) -> Config {
    let mut config = Config::default();
    config.pipeline.output_dir = out.to_path_buf();
    config
}

/// Contents of every file in a stage directory, keyed by file name.
fn stage_files(root: &Path, stage: Stage) -> BTreeMap<String, Vec<u8>> {
    let dir = OutputLayout::new(root).stage_dir(stage);
    std::fs::read_dir(&dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            (name, std::fs::read(&path).unwrap())
        })
        .collect()
}

#[test]
fn test_unresolved_sender_without_date() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("cyp-1993.txt");
    input
        .write_str(&format!(
            "{DELIM}\nFrom: hughes\nSubject: remailer ideas\n\nA remailer should strip all headers.\n\
             {DELIM}\nFrom: Perry E. Metzger <perry@imsi.com>\nDate: Fri, 4 Jun 93 10:11:12 EDT\n\
             Subject: Re: remailer ideas\n\nAgreed, and add random delay as well.\n"
        ))
        .unwrap();
    let out = temp.child("out");

    let tables = Tables::embedded().unwrap();
    let config = config_for(out.path());
    let pipeline = Pipeline::new(&config, &tables).unwrap();
    let stats = pipeline.run_all(&[input.path().to_path_buf()], None).unwrap();

    assert_eq!(stats.len(), 3);
    assert!(stats.iter().all(|s| s.is_conserved()));
    assert_eq!(stats[2].removed_count, 0);

    let emails = pipeline.read_main(Stage::Filter).unwrap();
    assert_eq!(emails.len(), 2);
    let hughes: Vec<&Email> = emails
        .iter()
        .filter(|e| e.from_email == "hughes@ah.com")
        .collect();
    assert_eq!(hughes.len(), 1);
    assert_eq!(hughes[0].from_name, "Eric Hughes");
    assert_eq!(hughes[0].from_raw, "hughes");
    assert!(hughes[0].flags.contains(Flag::ResolvedEntity));

    assert!(emails[0].flags.contains(Flag::UnparsedDate));
    assert!(!emails[1].flags.contains(Flag::UnparsedDate));
    assert_eq!(
        emails[1].date_parsed.unwrap().to_rfc3339(),
        "1993-06-04T10:11:12-04:00"
    );

    out.child("filtered/spam_detected.json")
        .assert(predicate::str::diff("[]\n"));
}

#[test]
fn test_snapshot_files_written() {
    let temp = TempDir::new().unwrap();
    let tables = Tables::embedded().unwrap();
    let config = config_for(temp.path());
    let pipeline = Pipeline::new(&config, &tables).unwrap();
    pipeline.run_all(&[fixture("cyp-1994.txt")], None).unwrap();

    for file in [
        "parsed/parsed_emails.json",
        "parsed/flagged_for_review.json",
        "parsed/parse_stats.json",
        "cleaned/cleaned_emails.json",
        "cleaned/removed_artifacts.json",
        "cleaned/remaining_flags.json",
        "cleaned/cleanup_stats.json",
        "filtered/emails_no_spam.json",
        "filtered/spam_detected.json",
        "filtered/filter_stats.json",
    ] {
        temp.child(file).assert(predicate::path::is_file());
    }
    for dir in ["parsed", "cleaned", "filtered"] {
        temp.child(format!("{dir}.tmp"))
            .assert(predicate::path::missing());
        temp.child(format!("{dir}.old"))
            .assert(predicate::path::missing());
    }

    temp.child("filtered/filter_stats.json")
        .assert(predicate::str::contains("\"money-scheme\": 1"));
    temp.child("parsed/parsed_emails.json")
        .assert(predicate::str::contains("\"date_parsed\": null"));
}

#[test]
fn test_spam_moves_to_side_collection() {
    let temp = TempDir::new().unwrap();
    let tables = Tables::embedded().unwrap();
    let config = config_for(temp.path());
    let pipeline = Pipeline::new(&config, &tables).unwrap();
    let stats = pipeline.run_all(&[fixture("cyp-1994.txt")], None).unwrap();

    assert_eq!(stats[0].output_count, 4);
    assert_eq!(stats[1].output_count, 4);
    assert_eq!(stats[2].output_count, 3);
    assert_eq!(stats[2].removed_count, 1);

    let layout = pipeline.layout();
    let spam: Vec<SpamEntry> =
        read_json(&layout.stage_dir(Stage::Filter).join("spam_detected.json")).unwrap();
    assert_eq!(spam.len(), 1);
    assert_eq!(spam[0].email.subject, "MAKE MONEY FAST");
    assert!(spam[0].categories.contains(&"money-scheme".to_string()));
    assert!(spam[0].email.flags.contains(Flag::Spam));
}

#[test]
fn test_rerun_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let tables = Tables::embedded().unwrap();
    let config = config_for(temp.path());
    let pipeline = Pipeline::new(&config, &tables).unwrap();

    pipeline.run_all(&[fixture("cyp-1994.txt")], None).unwrap();
    let before: Vec<_> = [Stage::Parse, Stage::Clean, Stage::Filter]
        .into_iter()
        .map(|s| stage_files(temp.path(), s))
        .collect();

    pipeline.run_all(&[fixture("cyp-1994.txt")], None).unwrap();
    let after: Vec<_> = [Stage::Parse, Stage::Clean, Stage::Filter]
        .into_iter()
        .map(|s| stage_files(temp.path(), s))
        .collect();

    assert_eq!(before, after);
}

#[test]
fn test_ids_stable_and_flags_only_grow() {
    let temp = TempDir::new().unwrap();
    let tables = Tables::embedded().unwrap();
    let config = config_for(temp.path());
    let pipeline = Pipeline::new(&config, &tables).unwrap();
    pipeline.run_all(&[fixture("cyp-1994.txt")], None).unwrap();

    let parsed = pipeline.read_main(Stage::Parse).unwrap();
    let cleaned = pipeline.read_main(Stage::Clean).unwrap();
    let filtered = pipeline.read_main(Stage::Filter).unwrap();

    for later in cleaned.iter().chain(&filtered) {
        let earlier = parsed.iter().find(|p| p.id == later.id).unwrap();
        assert!(later.flags.is_superset_of(&earlier.flags));
        assert_eq!(later.body, earlier.body);
        assert_eq!(later.line_number, earlier.line_number);
    }

    let gnu = cleaned.iter().find(|e| e.from_raw == "gnu").unwrap();
    assert_eq!(gnu.from_email, "gnu@toad.com");
    assert_eq!(gnu.from_name, "John Gilmore");
}

#[test]
fn test_denylisted_artifact_removed() {
    let temp = TempDir::new().unwrap();
    let tables = Tables::embedded().unwrap();
    let config = config_for(temp.path());
    let pipeline = Pipeline::new(&config, &tables).unwrap();
    let parsed = pipeline.run_parse(&[fixture("cyp-1994.txt")], None).unwrap();

    let target = &parsed.emails[3];
    let denylist = ArtifactDenylist::from_toml_str(
        &format!(
            "scheme = \"sha256-16/v1\"\n\n[[artifact]]\nid = \"{}\"\nreason = \"duplicate announcement\"\n",
            target.id
        ),
        "test denylist",
    )
    .unwrap();
    let tables = Tables {
        denylist,
        ..Tables::embedded().unwrap()
    };
    let pipeline = Pipeline::new(&config, &tables).unwrap();
    let stats = pipeline.run_clean().unwrap();

    assert_eq!(stats.input_count, 4);
    assert_eq!(stats.output_count, 3);
    assert_eq!(stats.removed_count, 1);

    let removed: Vec<RemovedArtifact> = read_json(
        &pipeline
            .layout()
            .stage_dir(Stage::Clean)
            .join("removed_artifacts.json"),
    )
    .unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].email.id, target.id);
    assert_eq!(removed[0].reason, "duplicate announcement");
    assert!(pipeline
        .read_main(Stage::Clean)
        .unwrap()
        .iter()
        .all(|e| e.id != target.id));
}

#[test]
fn test_stale_denylist_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let parse_tables = Tables::embedded().unwrap();
    Pipeline::new(&config, &parse_tables)
        .unwrap()
        .run_parse(&[fixture("cyp-1994.txt")], None)
        .unwrap();

    let denylist = ArtifactDenylist::from_toml_str(
        "scheme = \"sha256-16/v1\"\n\n[[artifact]]\nid = \"0123456789abcdef\"\nreason = \"gone\"\n",
        "test denylist",
    )
    .unwrap();
    let tables = Tables {
        denylist,
        ..Tables::embedded().unwrap()
    };
    let err = Pipeline::new(&config, &tables)
        .unwrap()
        .run_clean()
        .unwrap_err();

    match err {
        DigestError::StaleDenylist(ids) => assert_eq!(ids, vec!["0123456789abcdef"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(snapshot_exists(temp.path(), Stage::Parse));
    assert!(!snapshot_exists(temp.path(), Stage::Clean));
    temp.child("cleaned").assert(predicate::path::missing());
}

#[test]
fn test_stage_needs_previous_snapshot() {
    let temp = TempDir::new().unwrap();
    let tables = Tables::embedded().unwrap();
    let config = config_for(temp.path());
    let pipeline = Pipeline::new(&config, &tables).unwrap();

    let err = pipeline.run_filter().unwrap_err();
    assert!(matches!(err, DigestError::Io { .. }));
    assert!(!snapshot_exists(temp.path(), Stage::Filter));
}

#[test]
fn test_embedded_tables_load() {
    let tables = Tables::embedded().unwrap();
    assert!(!tables.aliases.is_empty());
    assert!(tables.denylist.is_empty());
    assert_eq!(tables.signals.min_signals, 2);
}
