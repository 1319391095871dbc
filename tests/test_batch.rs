mod common;
use common::*;
use spindlestats::{run_batch, ErrorLog, FileOutcome, PipelineStep};

fn error_lines(cfg: &spindlestats::BatchConfig) -> Vec<String> {
    std::fs::read_to_string(&cfg.error_log)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

#[test]
fn end_to_end_single_subject() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = batch_layout(dir.path());
    add_subject(&cfg, "subj1", &SCORES, 11);

    let errors = ErrorLog::new(&cfg.error_log);
    let report = run_batch(&cfg, &errors, |_| {}).unwrap();

    assert_eq!(report.n_written(), 1);
    assert_eq!(report.n_failed(), 0);
    assert!(error_lines(&cfg).is_empty());
    assert_eq!(sheet_names(&cfg.output), vec!["Title", "subj1"]);

    // Three stacked tables: S1 has 6 rows (3 stages × 2 channels), S2 has 3.
    let cells = sheet_cells(&cfg.output, "subj1");
    let at = |r: u32| cells.get(&(r, 0)).map(String::as_str);
    assert_eq!(at(0), Some("Stage"));
    assert_eq!(cells.get(&(0, 1)).map(String::as_str), Some("Channel"));
    assert_eq!(at(11), Some("Stage"));
    assert_eq!(cells.get(&(11, 1)).map(String::as_str), Some("Count"));
    assert_eq!(at(19), Some("Channel"));
    assert_eq!(at(20), Some("C3"));
    assert_eq!(at(21), Some("C4"));
}

#[test]
fn missing_scoring_file_is_logged_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = batch_layout(dir.path());
    add_subject(&cfg, "a", &SCORES, 1);
    write_recording(&cfg.recording_path("b.edf"), 2, 2);
    add_subject(&cfg, "c", &SCORES, 3);

    let report = run_batch(&cfg, &ErrorLog::new(&cfg.error_log), |_| {}).unwrap();
    assert_eq!(report.n_written(), 2);
    assert_eq!(report.n_failed(), 1);
    match report.outcome("b.edf") {
        Some(FileOutcome::Failed(f)) => assert_eq!(f.step, PipelineStep::LoadLabels),
        other => panic!("unexpected outcome for b.edf: {other:?}"),
    }

    let lines = error_lines(&cfg);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("b.edf: "), "{}", lines[0]);
    assert_eq!(sheet_names(&cfg.output), vec!["Title", "a", "c"]);
}

#[test]
fn unmapped_stage_fails_only_that_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = batch_layout(dir.path());
    add_subject(&cfg, "good", &SCORES, 4);
    add_subject(&cfg, "bad", &["W", "2", "X", "3"], 5);

    let report = run_batch(&cfg, &ErrorLog::new(&cfg.error_log), |_| {}).unwrap();
    assert_eq!(report.n_written(), 1);

    let lines = error_lines(&cfg);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("bad.edf: "));
    assert!(lines[0].contains("mapping not found"), "{}", lines[0]);
}

#[test]
fn non_recordings_are_skipped_in_sorted_order() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = batch_layout(dir.path());
    add_subject(&cfg, "s2", &SCORES, 6);
    add_subject(&cfg, "s1", &SCORES, 7);
    std::fs::write(cfg.archive_dir.join("notes.txt"), b"x").unwrap();
    std::fs::write(cfg.archive_dir.join("S3.EDF"), b"x").unwrap();

    let mut seen = Vec::new();
    let report = run_batch(&cfg, &ErrorLog::new(&cfg.error_log), |name| seen.push(name.to_string())).unwrap();

    assert_eq!(seen, vec!["S3.EDF", "notes.txt", "s1.edf", "s2.edf"]);
    assert_eq!(report.n_skipped(), 2);
    assert_eq!(report.n_written(), 2);
    assert!(error_lines(&cfg).is_empty());
}

#[test]
fn rerun_replaces_subject_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = batch_layout(dir.path());
    add_subject(&cfg, "subj1", &SCORES, 8);
    let errors = ErrorLog::new(&cfg.error_log);

    run_batch(&cfg, &errors, |_| {}).unwrap();
    // Rescore: everything N2, so S1 and S2 shrink.
    write_scoring(&cfg.scoring_path_for("subj1.edf"), &["2", "2", "2", "2"]);
    let report = run_batch(&cfg, &errors, |_| {}).unwrap();

    match report.outcome("subj1.edf") {
        Some(FileOutcome::Written { replaced, .. }) => assert!(*replaced),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(sheet_names(&cfg.output), vec!["Title", "subj1"]);

    // S1: 2 rows (N2 × 2 channels) → S2 at row 7, one row → S3 at row 13.
    let cells = sheet_cells(&cfg.output, "subj1");
    assert_eq!(cells.get(&(7, 0)).map(String::as_str), Some("Stage"));
    assert_eq!(cells.get(&(13, 0)).map(String::as_str), Some("Channel"));
    assert!(!cells.contains_key(&(3, 0)), "stale S1 rows survived the rewrite");
}

#[test]
fn missing_archive_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = spindlestats::BatchConfig::default().rooted_at(dir.path());
    assert!(run_batch(&cfg, &ErrorLog::new(&cfg.error_log), |_| {}).is_err());
}

#[test]
fn default_layout_reads_ods_scoring() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = spindlestats::BatchConfig::default().rooted_at(dir.path());
    assert_eq!(cfg.scoring_suffix, "_ODS.ods");
    std::fs::create_dir_all(&cfg.archive_dir).unwrap();
    std::fs::create_dir_all(&cfg.scoring_dir).unwrap();
    write_recording(&cfg.recording_path("subj1.edf"), 2, 12);
    std::fs::copy(ODS_FIXTURE, cfg.scoring_path_for("subj1.edf")).unwrap();

    let report = run_batch(&cfg, &ErrorLog::new(&cfg.error_log), |_| {}).unwrap();
    assert_eq!(report.n_written(), 1, "errors: {:?}", error_lines(&cfg));
    assert_eq!(sheet_names(&cfg.output), vec!["Title", "subj1"]);
    let cells = sheet_cells(&cfg.output, "subj1");
    assert_eq!(cells.get(&(0, 0)).map(String::as_str), Some("Stage"));
}
