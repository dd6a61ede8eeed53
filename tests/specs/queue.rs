// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue specs
//!
//! Bundles pushed through a live queue, ending with the in-band shutdown
//! signal.

use crate::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn bundles_run_in_order_then_shutdown_drains() {
    let ws = Workspace::new();
    let log = ws.path().join("order.log");
    let shutdown = FakeShutdownProcessor::new();
    let fired = Arc::new(AtomicBool::new(false));
    let queue = {
        let fired = Arc::clone(&fired);
        BundlesQueue::new(ws.file_runner(), shutdown.clone(), move || {
            fired.store(true, Ordering::SeqCst);
        })
    };
    queue.activate();

    for sequence in 1..=3 {
        let source = format!("#!/bin/sh\necho {} >> {}\n", sequence, log.display());
        queue.push(bundle(sequence, vec![script(&format!("step-{}", sequence), &source)]));
    }
    queue.push(Work::Shutdown);
    queue.closed().await;

    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(shutdown.processed(), 1);
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "1\n2\n3\n");

    let stats = queue.stats().await.unwrap();
    assert_eq!((stats.succeeded, stats.failed), (3, 0));
}

#[tokio::test]
async fn failed_bundle_is_audited_to_file() {
    let ws = Workspace::new();
    let queue = BundlesQueue::new(ws.file_runner(), FakeShutdownProcessor::new(), || {});
    queue.activate();

    queue.push(bundle(10, vec![script("broken", "#!/bin/sh\nexit 3\n")]));
    queue.push(bundle(11, vec![script("fine", "#!/bin/sh\nexit 0\n")]));
    queue.close();
    queue.closed().await;

    let failed = std::fs::read_to_string(ws.audit_dir().join("10.log")).unwrap();
    assert_eq!(failed.matches("[error]").count(), 3, "{}", failed);
    assert!(failed.contains("exited with status 3"));

    let passed = std::fs::read_to_string(ws.audit_dir().join("11.log")).unwrap();
    assert!(!passed.contains("[error]"), "{}", passed);
    assert!(passed.contains("[status] completed: 1 step(s)"));
}
