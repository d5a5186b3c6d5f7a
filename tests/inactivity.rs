use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tokio::{task::JoinHandle, time::sleep};
use tower::ServiceExt; // for `oneshot`

use lightswitch::{
    api::create_router,
    config::Config,
    services::{ActivityProbe, LifecycleApi, MockLifecycle, StaticProbe},
    state::AppState,
    tasks::spawn_inactivity_controller,
};

struct Harness {
    state: Arc<AppState>,
    lifecycle: Arc<MockLifecycle>,
    probe: Arc<StaticProbe>,
    coordinator: Option<JoinHandle<()>>,
}

impl Harness {
    fn start(timeout_secs: u64) -> Self {
        Self::start_with(Config::with_timeout(Duration::from_secs(timeout_secs)))
    }

    fn start_with(config: Config) -> Self {
        let lifecycle = Arc::new(MockLifecycle::new());
        let probe = Arc::new(StaticProbe::new());
        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&lifecycle) as Arc<dyn LifecycleApi>,
            Arc::clone(&probe) as Arc<dyn ActivityProbe>,
        ));
        let coordinator = spawn_inactivity_controller(Arc::clone(&state));

        Self {
            state,
            lifecycle,
            probe,
            coordinator,
        }
    }

    async fn ping(&self) {
        let response = create_router(Arc::clone(&self.state))
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    async fn healthcheck(&self) {
        let response = create_router(Arc::clone(&self.state))
            .oneshot(
                Request::builder()
                    .uri("/healthcheck")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    fn suspended(&self) -> bool {
        self.lifecycle.was_suspend_called()
    }
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[tokio::test(start_paused = true)]
async fn suspends_after_inactivity_timeout() {
    let h = Harness::start(2);
    assert!(!h.suspended(), "suspension should not be called immediately");

    sleep(ms(1999)).await;
    assert!(!h.suspended(), "suspension fired before the timeout");

    sleep(ms(201)).await;
    assert!(h.suspended(), "suspension should fire by 2.2s");
    assert!(h.state.shutdown.is_closed());
}

#[tokio::test(start_paused = true)]
async fn ping_resets_the_timer() {
    let h = Harness::start(2);

    sleep(ms(1500)).await;
    h.ping().await;

    sleep(ms(1990)).await; // 3.49s
    assert!(!h.suspended(), "suspension should wait for a full timeout after the ping");

    sleep(ms(210)).await; // 3.7s
    assert!(h.suspended());
}

#[tokio::test(start_paused = true)]
async fn repeated_pings_keep_instance_alive() {
    let h = Harness::start(2);

    for i in 0..5 {
        sleep(ms(1000)).await;
        h.ping().await;
        assert!(!h.suspended(), "suspension called after ping {}", i);
    }

    sleep(ms(1900)).await;
    assert!(!h.suspended());

    sleep(ms(300)).await;
    assert!(h.suspended(), "suspension should fire about 2s after the last ping");
}

#[tokio::test(start_paused = true)]
async fn pings_just_inside_the_timeout_never_suspend() {
    let h = Harness::start(3);

    for _ in 0..20 {
        sleep(ms(2999)).await;
        h.ping().await;
    }
    assert!(!h.suspended());
    assert_eq!(h.state.tracker.signal_count(), 20);
}

#[tokio::test(start_paused = true)]
async fn never_suspends_before_timeout_for_any_duration() {
    for timeout_secs in [1, 3, 5, 30] {
        let h = Harness::start(timeout_secs);
        let timeout = Duration::from_secs(timeout_secs);

        sleep(timeout - ms(1)).await;
        assert!(!h.suspended(), "premature suspend with timeout {}s", timeout_secs);

        sleep(ms(101)).await;
        assert!(h.suspended(), "no suspend with timeout {}s", timeout_secs);
    }
}

#[tokio::test(start_paused = true)]
async fn keep_online_disables_suspension() {
    let mut config = Config::with_timeout(Duration::from_secs(1));
    config.keep_online = "yes".to_string();
    let h = Harness::start_with(config);
    assert!(h.coordinator.is_none());

    h.ping().await;
    sleep(ms(3000)).await;

    assert!(!h.suspended(), "suspension should not be called when keep online is set");
    assert!(!h.state.timer.is_armed());
    assert!(!h.state.shutdown.is_closed());
}

#[tokio::test(start_paused = true)]
async fn fresh_fallback_activity_defers_suspension() {
    let h = Harness::start(2);
    h.probe.report_fresh(ms(500));

    sleep(ms(5000)).await;
    assert!(!h.suspended(), "fallback activity should keep the instance up");
    assert!(h.state.timer.is_armed());

    // The next expiry after the fallback goes quiet suspends (at 6s)
    h.probe.report_nothing();
    sleep(ms(1200)).await;
    assert!(h.suspended());
}

#[tokio::test(start_paused = true)]
async fn suspends_only_once() {
    let h = Harness::start(1);

    sleep(ms(10_000)).await;
    assert_eq!(h.lifecycle.suspend_calls(), 1);
    assert_eq!(h.lifecycle.status_calls(), 1);

    // The coordinator has finished and the latch stays closed
    let coordinator = h.coordinator.unwrap();
    assert!(coordinator.is_finished());
    h.state.shutdown.wait().await;
}

#[tokio::test(start_paused = true)]
async fn healthcheck_does_not_touch_the_timer() {
    let h = Harness::start(2);
    let before = h.state.tracker.last_signal_at();

    for _ in 0..10 {
        sleep(ms(300)).await;
        h.healthcheck().await;
    }

    assert_eq!(h.state.tracker.last_signal_at(), before);
    assert_eq!(h.state.tracker.signal_count(), 0);
    assert!(h.suspended(), "health checks must not defer suspension");
}

#[tokio::test(start_paused = true)]
async fn failed_suspend_still_shuts_down() {
    let h = Harness::start(2);
    h.lifecycle.fail_suspend(500);

    sleep(ms(2100)).await;
    assert_eq!(h.lifecycle.suspend_calls(), 1);
    assert!(h.state.shutdown.is_closed());
}

#[tokio::test(start_paused = true)]
async fn cancelled_timer_never_fires() {
    let h = Harness::start(2);

    sleep(ms(1000)).await;
    h.state.timer.cancel();
    h.state.timer.cancel();

    sleep(ms(5000)).await;
    assert!(!h.suspended());
    assert!(!h.state.shutdown.is_closed());
}
