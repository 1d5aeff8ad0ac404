use std::time::Duration;

use horus_host::{HorusError, TaskOutcome, TaskPoll, TaskRegistry};
use serde_json::json;

async fn wait_done(tasks: &TaskRegistry, id: u64) -> TaskOutcome {
    for _ in 0..200 {
        match tasks.poll(id).await.unwrap() {
            TaskPoll::Pending => tokio::time::sleep(Duration::from_millis(5)).await,
            TaskPoll::Done(outcome) => return outcome,
        }
    }
    panic!("task {id} never finished");
}

#[tokio::test]
async fn ids_increase_and_results_are_consumed_once() {
    let tasks = TaskRegistry::new();
    let first = tasks.submit("first", async { Ok::<_, HorusError>(json!({"value": 1})) });
    let second = tasks.submit("second", async { Ok::<_, HorusError>(2u32) });
    assert!(second > first);
    assert_eq!(tasks.len(), 2);

    let outcome = wait_done(&tasks, first).await;
    assert_eq!(outcome, TaskOutcome::Succeeded { result: json!({"value": 1}) });
    assert!(!outcome.is_error());
    assert!(matches!(tasks.poll(first).await, Err(HorusError::UnknownTask(id)) if id == first));

    assert_eq!(wait_done(&tasks, second).await.body(), json!(2));
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn unknown_ids_are_rejected() {
    let tasks = TaskRegistry::new();
    assert!(matches!(tasks.poll(42).await, Err(HorusError::UnknownTask(42))));
    assert!(matches!(tasks.cancel(42), Err(HorusError::UnknownTask(42))));
}

#[tokio::test]
async fn pending_until_the_work_finishes() {
    let tasks = TaskRegistry::new();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let id = tasks.submit("gated", async move {
        let _ = rx.await;
        Ok::<_, HorusError>("done")
    });
    assert!(matches!(tasks.poll(id).await.unwrap(), TaskPoll::Pending));
    assert!(matches!(tasks.poll(id).await.unwrap(), TaskPoll::Pending));
    tx.send(()).unwrap();
    assert_eq!(wait_done(&tasks, id).await.body(), json!("done"));
}

#[tokio::test]
async fn errors_become_records() {
    let tasks = TaskRegistry::new();
    let id = tasks.submit("failing", async {
        Err::<(), _>(HorusError::Kernel("ipykernel missing".into()))
    });
    let outcome = wait_done(&tasks, id).await;
    assert!(outcome.is_error());
    assert_eq!(
        outcome.body(),
        json!({"error": true, "type": "kernel_error", "error_msg": "kernel error: ipykernel missing"})
    );
}

#[tokio::test]
async fn flagged_results_count_as_errors() {
    let tasks = TaskRegistry::new();
    let id = tasks.submit("install", async {
        Ok::<_, HorusError>(json!({"error": true, "message": "install failed"}))
    });
    let outcome = wait_done(&tasks, id).await;
    assert!(matches!(outcome, TaskOutcome::Succeeded { .. }));
    assert!(outcome.is_error());
}

#[tokio::test]
async fn cancelled_task_reports_cancellation() {
    let tasks = TaskRegistry::new();
    let id = tasks.submit("forever", async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok::<_, HorusError>(())
    });
    tasks.cancel(id).unwrap();
    let outcome = wait_done(&tasks, id).await;
    assert_eq!(outcome, TaskOutcome::Cancelled);
    assert_eq!(outcome.body()["type"], "cancelled");
    assert!(tasks.poll(id).await.is_err());
}
