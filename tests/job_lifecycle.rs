//! End-to-end lifecycle tests over the public API.
//!
//! These exercise whole job trees the way a launcher layer would: contexts
//! flowing from parent to child, cancellation cascading down the tree,
//! failures walking up it, and waiters observing termination from other
//! threads.

#[macro_use]
mod common;

use common::init_test_logging;
use futures_lite::future;
use joblet::{
    Continuation, Error, ErrorKind, ExceptionHandler, Job, JobContext, JobHandle, JobName,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn init_test(name: &str) {
    init_test_logging();
    test_phase!(name);
}

#[test]
fn cancellation_cascades_through_a_tree() {
    init_test("cancellation_cascades_through_a_tree");
    let root = JobHandle::<()>::new(JobContext::new().with(JobName::new("root")));
    let left = JobHandle::<()>::new(root.context());
    let right = JobHandle::<()>::new(root.context());
    let leaf = JobHandle::<()>::new(left.context());

    let cancelled = Arc::new(AtomicUsize::new(0));
    for job in [&left, &right, &leaf] {
        let counter = Arc::clone(&cancelled);
        job.invoke_on_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    root.cancel();

    assert_with_log!(
        cancelled.load(Ordering::SeqCst) == 3,
        "all descendants notified",
        3usize,
        cancelled.load(Ordering::SeqCst)
    );
    for job in [&root, &left, &right, &leaf] {
        assert_with_log!(!job.is_active(), "job inactive", false, job.is_active());
    }
    test_complete!("cancellation_cascades_through_a_tree");
}

#[test]
fn child_of_cancelled_parent_is_cancelled_at_construction() {
    init_test("child_of_cancelled_parent_is_cancelled_at_construction");
    let parent = JobHandle::<()>::new(JobContext::new());
    parent.cancel();

    let child = JobHandle::<()>::new(parent.context());
    assert_with_log!(!child.is_active(), "child inactive", false, child.is_active());

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let handle = child.invoke_on_cancel(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_with_log!(
        fired.load(Ordering::SeqCst) == 1,
        "late cancel handler fired inline",
        1usize,
        fired.load(Ordering::SeqCst)
    );
    assert_with_log!(handle.is_noop(), "noop handle", true, handle.is_noop());
    test_complete!("child_of_cancelled_parent_is_cancelled_at_construction");
}

#[test]
fn failure_walks_up_and_cancels_siblings_transitively() {
    init_test("failure_walks_up_and_cancels_siblings_transitively");
    let root = JobHandle::<()>::new(JobContext::new());
    let worker = JobHandle::<u32>::new(root.context());
    let sibling = JobHandle::<u32>::new(root.context());

    worker
        .resume_with(Err(Error::user("disk on fire")))
        .expect("resume");

    // The failure cancelled the root, and the root's cancel list reached
    // the sibling.
    assert_with_log!(!root.is_active(), "root cancelled", false, root.is_active());
    assert_with_log!(
        !sibling.is_active(),
        "sibling cancelled",
        false,
        sibling.is_active()
    );
    test_complete!("failure_walks_up_and_cancels_siblings_transitively");
}

#[test]
fn top_level_job_reports_unconsumed_failures() {
    init_test("top_level_job_reports_unconsumed_failures");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let ctx = JobContext::new()
        .with(JobName::new("main"))
        .with(ExceptionHandler::new(move |error: &Error| {
            sink.lock().expect("lock").push(error.to_string());
        }));

    let main_job = JobHandle::<()>::top_level(ctx);
    main_job
        .resume_with(Err(Error::user("unhandled")))
        .expect("resume");

    let seen = seen.lock().expect("lock");
    assert_with_log!(seen.len() == 1, "one report", 1usize, seen.len());
    assert_with_log!(
        seen[0] == "User: unhandled",
        "report content",
        "User: unhandled",
        seen[0].as_str()
    );
    test_complete!("top_level_job_reports_unconsumed_failures");
}

#[test]
fn join_observes_completion_from_another_thread() {
    init_test("join_observes_completion_from_another_thread");
    let job = JobHandle::<String>::new(JobContext::new());

    let producer = {
        let continuation = job.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(15));
            continuation
                .resume_with(Ok("payload".to_string()))
                .expect("resume");
        })
    };

    let joined = future::block_on(job.join());
    assert_with_log!(joined.is_ok(), "join ok", true, joined.is_ok());
    assert_with_log!(job.is_completed(), "terminal", true, job.is_completed());
    producer.join().expect("producer join");
    test_complete!("join_observes_completion_from_another_thread");
}

#[test]
fn join_reports_dead_parent_for_completed_child() {
    init_test("join_reports_dead_parent_for_completed_child");
    let parent = JobHandle::<()>::new(JobContext::new());
    let child = JobHandle::<u32>::new(parent.context());

    child.resume_with(Ok(10)).expect("resume");
    parent.cancel();

    let err = future::block_on(child.join()).expect_err("join must fail");
    assert_with_log!(
        err.kind() == ErrorKind::Cancelled,
        "cancelled kind",
        ErrorKind::Cancelled,
        err.kind()
    );
    assert_with_log!(
        err.message() == Some("Parent cancelled."),
        "message",
        Some("Parent cancelled."),
        err.message()
    );
    test_complete!("join_reports_dead_parent_for_completed_child");
}

#[test]
fn continuation_trait_resumes_like_the_inherent_method() {
    init_test("continuation_trait_resumes_like_the_inherent_method");
    let job = JobHandle::<u32>::new(JobContext::new());
    let continuation: &dyn Continuation<u32> = &job;

    continuation.resume_with(Ok(5)).expect("resume");
    let err = continuation
        .resume_with(Ok(6))
        .expect_err("second resume fails");
    assert_with_log!(
        err.kind() == ErrorKind::AlreadyCompleted,
        "already completed",
        ErrorKind::AlreadyCompleted,
        err.kind()
    );
    test_complete!("continuation_trait_resumes_like_the_inherent_method");
}

#[test]
fn erased_jobs_compose_across_value_types() {
    init_test("erased_jobs_compose_across_value_types");
    // A parent producing a String supervises a child producing a number;
    // the erased trait is what links them.
    let parent = JobHandle::<String>::new(JobContext::new().with(JobName::new("writer")));
    let child = JobHandle::<u64>::new(parent.context());

    let erased: Arc<dyn Job> = Arc::new(parent.clone());
    assert_with_log!(erased.is_active(), "parent active", true, erased.is_active());
    assert_with_log!(
        format!("{parent}").starts_with("writer#"),
        "display name",
        true,
        format!("{parent}").starts_with("writer#")
    );

    erased.cancel();
    assert_with_log!(!child.is_active(), "child cancelled", false, child.is_active());
    test_complete!("erased_jobs_compose_across_value_types");
}
