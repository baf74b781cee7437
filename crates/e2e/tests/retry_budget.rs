//! Retry budget behavior as seen by harness callers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use test_case::test_case;
use vscode_e2e::{E2eError, E2eResult};
use vscode_e2e_common::{RetryRunner, Settings, ThrottleFactor, Wait};

async fn fail_times(failures: usize, max_attempts: usize) -> (vscode_e2e_common::Result<&'static str>, usize) {
    let calls = AtomicUsize::new(0);
    let result = RetryRunner::new()
        .max_attempts(max_attempts)
        .label("open editor")
        .run(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < failures {
                    Err(E2eError::AssertionFailed(format!("attempt {} failed", n + 1)))
                } else {
                    Ok("opened")
                }
            }
        })
        .await;
    (result, calls.load(Ordering::SeqCst))
}

#[test_case(0, 3 ; "first try")]
#[test_case(1, 3 ; "one transient failure")]
#[test_case(2, 3 ; "last attempt succeeds")]
#[test_case(4, 5 ; "larger budget")]
#[tokio::test]
async fn recovers_within_budget(failures: usize, max_attempts: usize) {
    let (result, calls) = fail_times(failures, max_attempts).await;
    assert_eq!(result.unwrap(), "opened");
    assert_eq!(calls, failures + 1);
}

#[test_case(1 ; "single attempt")]
#[test_case(2 ; "two attempts")]
#[test_case(3 ; "default budget")]
#[tokio::test]
async fn exhaustion_reports_label_and_last_error(max_attempts: usize) {
    let (result, calls) = fail_times(usize::MAX, max_attempts).await;
    assert_eq!(calls, max_attempts);

    let err = result.unwrap_err();
    assert!(err.is_retry_exhausted());
    let message = err.to_string();
    assert!(message.contains("open editor"));
    assert!(message.contains(&format!("attempt {} failed", max_attempts)));
}

#[tokio::test]
async fn delay_separates_attempts() {
    let stamps = Arc::new(Mutex::new(Vec::new()));
    let delay = Duration::from_millis(40);

    let result: E2eResult<u32> = RetryRunner::new()
        .delay(delay)
        .run(|| {
            let stamps = stamps.clone();
            async move {
                let mut stamps = stamps.lock().unwrap();
                stamps.push(Instant::now());
                if stamps.len() == 1 {
                    Err(E2eError::AssertionFailed("not yet".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .map_err(E2eError::from);

    assert_eq!(result.unwrap(), 7);
    let stamps = stamps.lock().unwrap();
    assert_eq!(stamps.len(), 2);
    assert!(stamps[1].duration_since(stamps[0]) >= delay);
}

#[tokio::test]
async fn throttled_fixed_wait_is_scaled() {
    let settings = Settings {
        throttle_factor: ThrottleFactor::new(3),
        ..Settings::default()
    };

    let start = Instant::now();
    Wait::fixed(Duration::from_millis(20)).resolve(&settings).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn predicate_wait_times_out_with_message() {
    let wait = Wait::Predicate(
        vscode_e2e_common::PredicateWait::new(|| async { false })
            .timeout(Duration::from_millis(30))
            .interval(Duration::from_millis(10))
            .message("notification never appeared"),
    );

    let err = wait.resolve(&Settings::default()).await.unwrap_err();
    assert!(err.to_string().contains("notification never appeared"));
}
