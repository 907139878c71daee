use serde_json::json;
use workq_dispatch::engine::batch_body;
use workq_dispatch::job::{Job, RawJob, STATUS_UNANSWERED};

#[test]
fn new_raw_job_is_unanswered() {
    let job = RawJob::new("example.com");
    assert_eq!(job.identifier(), "example.com");
    assert_eq!(job.status, STATUS_UNANSWERED);
    assert!(!job.succeeded());
}

#[test]
fn zero_or_missing_status_is_success() {
    let mut job = RawJob::new("example.com");
    job.materialize(json!({"status": 0, "title": "Example Domain"})).unwrap();
    assert!(job.succeeded());
    assert_eq!(job.response.as_ref().unwrap()["title"], "Example Domain");

    let mut job = RawJob::new("example.com");
    job.materialize(json!({"title": "Example Domain"})).unwrap();
    assert!(job.succeeded());
}

#[test]
fn non_zero_status_is_failure() {
    let mut job = RawJob::new("nx.example");
    job.materialize(json!({"status": 3})).unwrap();
    assert_eq!(job.status, 3);
    assert!(!job.succeeded());
}

#[test]
fn non_object_response_is_rejected_and_leaves_job_unanswered() {
    let mut job = RawJob::new("example.com");
    assert!(job.materialize(json!(["not", "an", "object"])).is_err());
    assert!(!job.succeeded());
    assert!(job.response.is_none());
}

#[test]
fn raw_job_serializes_without_empty_response() {
    let line = serde_json::to_string(&RawJob::new("a.com")).unwrap();
    assert_eq!(line, r#"{"request":"a.com","status":-1}"#);
}

#[test]
fn batch_body_is_newline_terminated_in_order() {
    let batch = vec![
        RawJob::new("one.com"),
        RawJob::new("https://two.com/path"),
        RawJob::new("three.com"),
    ];
    let body = batch_body(&batch);
    assert_eq!(body, "one.com\nhttps://two.com/path\nthree.com\n");
    assert_eq!(body.lines().count(), batch.len());

    let empty: Vec<RawJob> = Vec::new();
    assert_eq!(batch_body(&empty), "");
}
