//! Tamper detection across both audit representations.

use std::fs;

use serde_json::json;

use hvdc_audit::{verify_trail, AuditConfig, IntegrityStatus, RiskLevel};

fn config(dir: &std::path::Path) -> AuditConfig {
    AuditConfig {
        dir: dir.join("artifacts"),
        ..Default::default()
    }
}

#[test]
fn edited_row_is_flagged_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _) = config(dir.path()).open();

    for action in ["extract_a", "extract_b", "extract_c"] {
        ledger
            .record(action, "system", &json!({"files": 2}), RiskLevel::Low, &["FANR"])
            .unwrap();
    }

    let text = fs::read_to_string(ledger.path()).unwrap();
    fs::write(ledger.path(), text.replace("extract_b", "extract_z")).unwrap();

    let report = ledger.verify_integrity().unwrap();
    assert_eq!(report.status, IntegrityStatus::Compromised);
    assert_eq!(report.verified, 2);
    assert_eq!(report.corrupted, 1);
    assert_eq!(report.details.len(), 1);
    assert_eq!(report.details[0].line, 3);
    assert_eq!(report.details[0].action.as_deref(), Some("extract_z"));
}

#[test]
fn each_non_hash_field_is_covered() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _) = config(dir.path()).open();
    let entry = ledger
        .record(
            "graph_deploy",
            "hvdc-deploy",
            &json!({"target": "EXTRACTED"}),
            RiskLevel::High,
            &["FUSEKI", "DEPLOYMENT"],
        )
        .unwrap();
    let original = fs::read_to_string(ledger.path()).unwrap();

    let edits = [
        (entry.ts.clone(), entry.ts.replace("T", " ")),
        ("graph_deploy".to_string(), "graph_delete".to_string()),
        ("hvdc-deploy".to_string(), "someone".to_string()),
        ("EXTRACTED".to_string(), "OFCO".to_string()),
        ("HIGH".to_string(), "LOW".to_string()),
        ("FUSEKI,DEPLOYMENT".to_string(), "FUSEKI".to_string()),
        ("localhost".to_string(), "10.0.0.9".to_string()),
    ];

    for (from, to) in edits {
        fs::write(ledger.path(), original.replacen(&from, &to, 1)).unwrap();
        let report = ledger.verify_integrity().unwrap();
        assert_eq!(report.corrupted, 1, "edit {from} -> {to} went undetected");
    }
}

#[test]
fn event_log_detects_change_without_locating_it() {
    let dir = tempfile::tempdir().unwrap();
    let (_, events) = config(dir.path()).open();
    for i in 0..3 {
        events.append(json!({"action": "step", "i": i})).unwrap();
    }
    events.write_checkpoint().unwrap();

    let text = fs::read_to_string(events.path()).unwrap();
    fs::write(events.path(), text.replacen("\"i\":1", "\"i\":9", 1)).unwrap();

    let report = events.verify_checkpoint().unwrap();
    assert_eq!(report.status, IntegrityStatus::Compromised);
    // Stats still read every line; nothing marks which one changed.
    assert_eq!(events.stats().unwrap().line_count, 3);
}

#[test]
fn non_utf8_row_is_counted_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _) = config(dir.path()).open();
    for action in ["extract_a", "extract_b", "extract_c"] {
        ledger
            .record(action, "system", &json!({}), RiskLevel::Low, &["FANR"])
            .unwrap();
    }

    let mut bytes = fs::read(ledger.path()).unwrap();
    let at = bytes
        .windows(b"extract_b".len())
        .position(|w| w == b"extract_b")
        .unwrap();
    bytes[at + 8] = 0xFF;
    fs::write(ledger.path(), bytes).unwrap();

    let report = ledger.verify_integrity().unwrap();
    assert_eq!(report.status, IntegrityStatus::Compromised);
    assert_eq!(report.verified, 2);
    assert_eq!(report.corrupted, 1);
    assert_eq!(report.details[0].line, 3);
}

#[test]
fn repeated_verification_stays_verified() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, events) = config(dir.path()).open();
    ledger
        .record("extract", "system", &json!({"files": 1}), RiskLevel::Low, &["FANR"])
        .unwrap();
    events.append(json!({"action": "extraction_completed"})).unwrap();

    let first = verify_trail(&ledger, &events, "ops", true).unwrap();
    assert_eq!(first.status, IntegrityStatus::Verified);
    assert!(first.events.is_none());
    assert!(first.checkpoint.is_some());

    // No flag this time: the existing checkpoint is still refreshed.
    let second = verify_trail(&ledger, &events, "ops", false).unwrap();
    assert_eq!(second.status, IntegrityStatus::Verified);
    assert_eq!(second.events.unwrap().status, IntegrityStatus::Verified);
    assert!(second.checkpoint.is_some());

    let third = verify_trail(&ledger, &events, "ops", false).unwrap();
    assert!(!third.is_compromised());
    assert_eq!(third.ledger.verified, 3);

    let actions: Vec<String> = ledger.entries().unwrap().into_iter().map(|e| e.action).collect();
    assert_eq!(actions, vec!["extract", "audit_verify", "audit_verify", "audit_verify"]);
    let stats = events.stats().unwrap();
    assert_eq!(stats.actions.get("audit_verified"), Some(&3));
}

#[test]
fn tampered_event_log_keeps_old_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, events) = config(dir.path()).open();
    ledger
        .record("extract", "system", &json!({}), RiskLevel::Low, &[])
        .unwrap();
    events.append(json!({"action": "step", "i": 1})).unwrap();
    verify_trail(&ledger, &events, "ops", true).unwrap();
    let saved = fs::read_to_string(events.checkpoint_path()).unwrap();

    let text = fs::read_to_string(events.path()).unwrap();
    fs::write(events.path(), text.replacen("\"i\":1", "\"i\":2", 1)).unwrap();

    let report = verify_trail(&ledger, &events, "ops", true).unwrap();
    assert!(report.is_compromised());
    assert!(report.checkpoint.is_none());
    assert_eq!(fs::read_to_string(events.checkpoint_path()).unwrap(), saved);

    let last = ledger.entries().unwrap().pop().unwrap();
    assert_eq!(last.action, "audit_verify");
    assert_eq!(last.risk_level, RiskLevel::Critical);
}
