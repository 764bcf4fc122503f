//! End-to-end tests combining presets, retries and the published state

use anyhow::{anyhow, Result};
use opslot::presets::{file_operation, file_upload_steps};
use opslot::{
    retry, Operation, OperationCallbacks, OperationConfig, OperationStatus, Preset,
    ProgressController, RetryOptions,
};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

async fn upload(progress: ProgressController<String>, name: &str) -> Result<String> {
    for step in file_upload_steps() {
        progress.set_current_step(&step.id, Some(&step.label))?;
        tokio::time::sleep(ms(25)).await;
        progress.complete_step(&step.id, None)?;
    }
    Ok(format!("uploads/{name}"))
}

#[tokio::test(start_paused = true)]
async fn test_upload_preset_records_every_transition() -> Result<()> {
    let op: Operation<String> = file_operation(OperationConfig::default())?;
    let mut rx = op.subscribe();

    let recorder = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            seen.push((state.status, state.progress, state.show_overlay));
            if state.status == OperationStatus::Succeeded && !state.show_overlay {
                break;
            }
        }
        seen
    });

    let path = op
        .execute_with_steps(|progress| upload(progress, "avatar.png"))
        .await?;
    assert_eq!(path, "uploads/avatar.png");

    let seen = recorder.await?;
    let (first_status, first_progress, first_overlay) = seen[0];
    assert_eq!(first_status, OperationStatus::Running);
    assert_eq!(first_progress, 0.0);
    assert!(first_overlay);

    let progress_values: Vec<f64> = seen
        .iter()
        .filter(|(status, _, _)| *status == OperationStatus::Running)
        .map(|(_, progress, _)| *progress)
        .collect();
    assert!(progress_values.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(progress_values.contains(&75.0));

    let last = seen.last().copied().unwrap();
    assert_eq!(last, (OperationStatus::Succeeded, 100.0, false));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_retry_inside_execute_recovers() -> Result<()> {
    let successes = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let callbacks = {
        let successes = successes.clone();
        let errors = errors.clone();
        OperationCallbacks::default()
            .on_success(move |_: &u32| {
                successes.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |_| {
                errors.fetch_add(1, Ordering::SeqCst);
            })
    };
    let op = Operation::with_callbacks(OperationConfig::default(), callbacks)?;
    let attempts = AtomicU32::new(0);
    let options = RetryOptions::new(3, ms(100), 2.0);

    let started = Instant::now();
    let value = op
        .execute(|| {
            retry(
                || async {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt < 3 {
                        Err(anyhow!("flaky backend (attempt {attempt})"))
                    } else {
                        Ok(attempt)
                    }
                },
                &options,
            )
        })
        .await?;

    assert_eq!(value, 3);
    // Two waits of 100ms and 200ms, already past the minimum duration.
    assert!(started.elapsed() >= ms(300));
    assert!(started.elapsed() < ms(320));
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
    assert_eq!(op.snapshot().status, OperationStatus::Succeeded);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retry_surfaces_original_error() {
    let op: Operation<u32> = Operation::new(OperationConfig::default()).unwrap();
    let attempts = AtomicU32::new(0);
    let options = RetryOptions::new(2, ms(10), 2.0);

    let result = op
        .execute(|| {
            retry(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "connection refused",
                    ))
                },
                &options,
            )
        })
        .await;

    let err = assert_err!(result);
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    let state = op.snapshot();
    assert_eq!(state.status, OperationStatus::Failed);
    assert_eq!(state.error.as_deref(), Some("connection refused"));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_upload_ignores_its_result() {
    let cancelled = Arc::new(AtomicUsize::new(0));
    let callbacks = {
        let cancelled = cancelled.clone();
        OperationCallbacks::default().on_cancel(move || {
            cancelled.fetch_add(1, Ordering::SeqCst);
        })
    };
    let op: Operation<String> = Preset::FileUpload
        .build(OperationConfig::default(), callbacks)
        .unwrap();

    let task = tokio::spawn({
        let op = op.clone();
        async move {
            op.execute_with_steps(|progress| upload(progress, "big.iso"))
                .await
        }
    });

    tokio::time::sleep(ms(40)).await;
    assert!(op.snapshot().progress > 0.0);
    assert!(op.cancel());

    // The upload itself keeps going and still reports its value to the caller.
    let path = assert_ok!(task.await.unwrap());
    assert_eq!(path, "uploads/big.iso");

    let state = op.snapshot();
    assert_eq!(state.status, OperationStatus::Idle);
    assert_eq!(state.progress, 0.0);
    assert_eq!(state.steps.completed_count(), 0);
    assert_eq!(cancelled.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_config_file_drives_timing() -> Result<()> {
    let yaml = r#"
min_loading_time: 1s
show_success_for: 0s
progress_steps:
  - id: sign
    label: Signing
"#;
    let config = OperationConfig::from_yaml_str(yaml)?;
    let op: Operation<&'static str> = Operation::new(config)?;
    let log = Arc::new(Mutex::new(Vec::new()));

    let started = Instant::now();
    op.execute_with_steps({
        let log = log.clone();
        move |progress: ProgressController<&'static str>| async move {
            progress.complete_step("sign", Some("Signed"))?;
            log.lock().unwrap().push("signed");
            Ok::<_, opslot::OperationError>("ok")
        }
    })
    .await?;

    assert!(started.elapsed() >= ms(1000));
    assert_eq!(*log.lock().unwrap(), vec!["signed"]);

    tokio::time::sleep(ms(10_000)).await;
    let state = op.snapshot();
    assert!(state.success);
    assert!(!state.show_overlay);
    assert_eq!(state.message.as_deref(), Some("Signed"));
    Ok(())
}
