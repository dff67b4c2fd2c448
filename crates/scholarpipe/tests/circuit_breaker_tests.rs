use scholarpipe::services::circuit_breaker::{
    BreakerConfig, BreakerDecision, BreakerRegistry, CircuitState, SourceBreaker,
};
use std::time::Duration;
use tokio::time::sleep;

fn config(threshold: u64, cool_down_ms: u64) -> BreakerConfig {
    BreakerConfig {
        threshold,
        cool_down: Duration::from_millis(cool_down_ms),
    }
}

#[tokio::test]
async fn test_breaker_trips_after_threshold_failures() {
    let cb = SourceBreaker::new("portal".to_string(), config(3, 60_000));

    // Three consecutive failures open the circuit.
    cb.on_failure().await;
    cb.on_failure().await;
    assert_eq!(cb.state(), CircuitState::Closed);
    cb.on_failure().await;
    assert_eq!(cb.state(), CircuitState::Open);

    // The next attempt inside the cool-down is skipped.
    assert_eq!(cb.try_acquire().await, BreakerDecision::Skip);
}

#[tokio::test]
async fn test_breaker_trial_after_cool_down() {
    let cb = SourceBreaker::new("portal".to_string(), config(1, 100));

    cb.on_failure().await;
    assert_eq!(cb.try_acquire().await, BreakerDecision::Skip);

    sleep(Duration::from_millis(150)).await;

    // Cool-down elapsed: exactly one trial attempt is admitted.
    assert_eq!(cb.try_acquire().await, BreakerDecision::Trial);
    assert_eq!(cb.state(), CircuitState::HalfOpen);

    cb.on_success().await;
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.failure_count(), 0);
}

#[tokio::test]
async fn test_success_resets_counter_mid_streak() {
    let cb = SourceBreaker::new("portal".to_string(), config(3, 60_000));

    cb.on_failure().await;
    cb.on_failure().await;
    cb.on_success().await;

    // The streak restarts; two more failures are not enough to open.
    cb.on_failure().await;
    cb.on_failure().await;
    assert_eq!(cb.state(), CircuitState::Closed);
    cb.on_failure().await;
    assert_eq!(cb.state(), CircuitState::Open);
}

#[tokio::test]
async fn test_failed_trial_restarts_cool_down() {
    let cb = SourceBreaker::new("portal".to_string(), config(1, 100));

    cb.on_failure().await;
    sleep(Duration::from_millis(150)).await;
    assert_eq!(cb.try_acquire().await, BreakerDecision::Trial);

    // Trial fails: back to open, cool-down restarted.
    cb.on_failure().await;
    assert_eq!(cb.state(), CircuitState::Open);
    assert_eq!(cb.try_acquire().await, BreakerDecision::Skip);

    sleep(Duration::from_millis(150)).await;
    assert_eq!(cb.try_acquire().await, BreakerDecision::Trial);
}

#[tokio::test]
async fn test_registry_resets_every_breaker() {
    let registry = BreakerRegistry::new(
        vec!["a".to_string(), "b".to_string(), "c".to_string()],
        config(1, 60_000),
    );

    for id in ["a", "b"] {
        registry.get(id).unwrap().on_failure().await;
        assert_eq!(registry.get(id).unwrap().state(), CircuitState::Open);
    }

    registry.reset_all().await;
    for id in ["a", "b", "c"] {
        let breaker = registry.get(id).unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    // Resetting again changes nothing.
    registry.reset_all().await;
    assert_eq!(registry.get("a").unwrap().state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_snapshots_sorted_by_source() {
    let registry = BreakerRegistry::new(
        vec!["zeta".to_string(), "alpha".to_string()],
        BreakerConfig::default(),
    );
    let snaps = registry.snapshots().await;
    assert_eq!(snaps.len(), 2);
    assert_eq!(snaps[0].source_id, "alpha");
    assert_eq!(snaps[1].source_id, "zeta");
}
