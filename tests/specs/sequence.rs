// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequence specs
//!
//! One bundle through real scripts, real local and remote downloads, and the
//! real package installer front end.

use crate::prelude::*;

#[tokio::test]
async fn script_with_local_attachment_succeeds() {
    let ws = Workspace::new();
    let audit = FakeAuditSink::new();
    let mut step = script(
        "check-attachment",
        "#!/bin/sh\ngrep -q 'Some attachment content' \"$ATTACH_DIR/data.txt\"\n",
    );
    step.attachments = vec![Attachment::new("data.txt", ws.local_file("data.txt", "Some attachment content"))];

    let outcome = ws.runner(audit.clone()).run_bundle(bundle(1, vec![step])).await;

    assert!(outcome.is_success(), "{:?} {:?}", outcome, audit.entries());
    assert_eq!(audit.error_count(), 0);
}

#[tokio::test]
async fn failing_script_reports_three_errors() {
    let ws = Workspace::new();
    let audit = FakeAuditSink::new();

    let outcome = ws
        .runner(audit.clone())
        .run_bundle(bundle(2, vec![script("fail", "#!/bin/sh\necho 'about to fail'\nexit 1\n")]))
        .await;

    assert!(!outcome.is_success());
    let errors = audit.errors();
    assert_eq!(errors.len(), 3, "{:?}", errors);
    assert!(errors[0].contains("about to fail"));
    assert!(errors[1].contains("exited with status 1"));
}

#[tokio::test]
async fn unreachable_attachment_reports_two_errors() {
    let ws = Workspace::new();
    let audit = FakeAuditSink::new();
    let mut step = script("fetch", "#!/bin/sh\nexit 0\n");
    step.packages = Some("curl".to_string());
    step.attachments = vec![Attachment::new("tool.tgz", "http://127.0.0.1:1/tool.tgz")];

    let outcome = ws.runner(audit.clone()).run_bundle(bundle(3, vec![step])).await;

    assert!(!outcome.is_success());
    let errors = audit.errors();
    assert_eq!(errors.len(), 2, "{:?}", errors);
    assert!(errors[0].contains("after 2 attempt(s)"), "{}", errors[0]);
}

#[tokio::test]
async fn invalid_package_spec_reports_two_errors() {
    let ws = Workspace::new();
    let audit = FakeAuditSink::new();
    let marker = ws.path().join("ran");
    let mut step = script("install", &format!("#!/bin/sh\ntouch {}\n", marker.display()));
    step.packages = Some("__INVALID__".to_string());

    let outcome = ws.runner(audit.clone()).run_bundle(bundle(4, vec![step])).await;

    assert!(!outcome.is_success());
    assert_eq!(audit.error_count(), 2, "{:?}", audit.errors());
    assert!(!marker.exists(), "run phase must not start after an install failure");
}

#[tokio::test]
async fn parameters_reach_the_script_environment() {
    let ws = Workspace::new();
    let audit = FakeAuditSink::new();
    let mut step = script("greet", "#!/bin/sh\necho \"hello $GREETING\"\n");
    step.parameters.insert("GREETING".to_string(), "world".to_string());

    let outcome = ws.runner(audit.clone()).run_bundle(bundle(5, vec![step])).await;

    assert!(outcome.is_success());
    let entries = format!("{:?}", audit.entries());
    assert!(entries.contains("hello world"), "{}", entries);
}

#[tokio::test]
async fn later_steps_see_earlier_side_effects() {
    let ws = Workspace::new();
    let audit = FakeAuditSink::new();
    let shared = ws.path().join("shared.txt");
    let steps = vec![
        script("write", &format!("#!/bin/sh\necho ready > {}\n", shared.display())),
        script("read", &format!("#!/bin/sh\ngrep -q ready {}\n", shared.display())),
    ];

    let outcome = ws.runner(audit.clone()).run_bundle(bundle(6, steps)).await;

    assert!(outcome.is_success(), "{:?}", audit.errors());
}
