use notegate::audit::{AuditEntry, AuditKind, AuditLogger};
use notegate::config::AuditConfig;
use notegate::guard::Operation;

fn logger(capacity: usize) -> AuditLogger {
    AuditLogger::new(&AuditConfig {
        enabled: true,
        capacity,
        debug: false,
    })
}

#[test]
fn oldest_entries_are_evicted_first() {
    let log = logger(3);
    for i in 0..5 {
        log.log_tool_call("read_note", Some(&format!("n{i}.md")), None, Ok(()));
    }
    assert_eq!(log.len(), 3);
    let paths: Vec<String> = log
        .get_recent(10)
        .into_iter()
        .filter_map(|e| e.event.path)
        .collect();
    assert_eq!(paths, ["n2.md", "n3.md", "n4.md"]);
}

#[test]
fn recent_and_per_tool_queries_keep_chronological_order() {
    let log = logger(100);
    log.log_tool_call("read_note", Some("a.md"), None, Ok(()));
    log.log_tool_call("write_note", Some("b.md"), None, Err("operation denied by user"));
    log.log_tool_call("read_note", Some("c.md"), None, Ok(()));
    log.log_resource_read("d.md", Some("127.0.0.1"), Ok(()));

    let recent = log.get_recent(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].event.path.as_deref(), Some("c.md"));
    assert_eq!(recent[1].event.kind, AuditKind::ResourceRead);

    let reads = log.get_for_tool("read_note", 10);
    assert_eq!(reads.len(), 2);
    assert_eq!(reads[0].event.path.as_deref(), Some("a.md"));
    assert_eq!(reads[1].event.path.as_deref(), Some("c.md"));
    assert_eq!(log.get_for_tool("read_note", 1)[0].event.path.as_deref(), Some("c.md"));
    assert!(log.get_recent(1)[0].timestamp >= log.get_recent(4)[0].timestamp);
}

#[test]
fn disabled_logger_records_nothing() {
    let log = AuditLogger::new(&AuditConfig {
        enabled: false,
        capacity: 10,
        debug: false,
    });
    log.log_tool_call("read_note", None, None, Ok(()));
    assert!(!log.is_enabled());
    assert!(log.is_empty());
}

#[test]
fn approval_entries_carry_the_operation() {
    let log = logger(10);
    let op = Operation::new("complete_task")
        .with_path("Tasks.md")
        .with_action("complete")
        .with_client(Some("127.0.0.1".into()));
    log.log_approval_request("abc", &op);
    log.log_approval_response("abc", &op, false, "timed_out");

    let entries = log.get_recent(2);
    assert_eq!(entries[0].event.kind, AuditKind::ApprovalRequest);
    assert_eq!(entries[0].event.details.as_ref().unwrap()["approvalId"], "abc");
    assert_eq!(entries[1].event.kind, AuditKind::ApprovalResponse);
    assert!(!entries[1].event.success);
    assert_eq!(
        entries[1].event.error.as_deref(),
        Some("operation denied: timed_out")
    );
    assert_eq!(entries[1].event.client_id.as_deref(), Some("127.0.0.1"));
}

#[test]
fn export_round_trips_and_clear_empties() {
    let log = logger(10);
    log.log_tool_call("list_notes", Some("Projects"), None, Ok(()));
    log.log_tool_call("write_note", Some("x.md"), None, Err("denied"));

    let exported = log.export().unwrap();
    let parsed: Vec<AuditEntry> = serde_json::from_str(&exported).unwrap();
    assert_eq!(parsed, log.get_recent(10));

    log.clear();
    assert!(log.is_empty());
}
