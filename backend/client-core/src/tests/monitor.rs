// Unit tests for the debounced connection monitor (paused tokio clock)

use crate::monitor::{ConnectionMonitor, LinkState};
use crate::state::store::Store;

use std::time::Duration;

use tokio::time::sleep;

const GRACE: Duration = Duration::from_secs(2);

fn monitor() -> (ConnectionMonitor, Store) {
    let store = Store::new();
    (ConnectionMonitor::new(store.clone(), GRACE), store)
}

async fn dialog_shown(store: &Store) -> bool {
    store
        .read(|state| state.general.show_connection_lost_dialog)
        .await
}

/// **VALUE**: Verifies a short outage never raises the indicator.
///
/// **WHY THIS MATTERS**: Network blips under the grace interval must not flash a dialog.
///
/// **BUG THIS CATCHES**: Would catch a timer that fires regardless of the reconnect.
#[tokio::test(start_paused = true)]
async fn given_reconnect_within_grace_when_timer_elapses_then_indicator_stays_false() {
    // GIVEN: A connected channel
    let (monitor, store) = monitor();
    monitor.on_connect().await;

    // WHEN: Down at t=0, back at t=1s, observed at t=5s
    monitor.on_disconnect().await;
    sleep(Duration::from_secs(1)).await;
    monitor.on_connect().await;
    sleep(Duration::from_secs(4)).await;

    // THEN: Never raised
    assert!(!dialog_shown(&store).await);
    assert_eq!(monitor.state().await, LinkState::Connected);
}

/// **VALUE**: Verifies a sustained outage raises the indicator and reconnect clears it.
///
/// **WHY THIS MATTERS**: This is the user's only signal that the view is stale.
///
/// **BUG THIS CATCHES**: Would catch early raising, or clearing only after another delay.
#[tokio::test(start_paused = true)]
async fn given_outage_longer_than_grace_when_observed_then_raised_then_cleared_on_reconnect() {
    // GIVEN: A connected channel that drops at t=0
    let (monitor, store) = monitor();
    monitor.on_connect().await;
    monitor.on_disconnect().await;

    // WHEN: Just before the grace interval
    sleep(GRACE - Duration::from_millis(1)).await;

    // THEN: Pending, not shown
    assert!(!dialog_shown(&store).await);
    assert_eq!(monitor.state().await, LinkState::PendingLost);

    // WHEN: The grace interval has fully elapsed
    sleep(Duration::from_millis(2)).await;

    // THEN: Shown
    assert!(dialog_shown(&store).await);
    assert_eq!(monitor.state().await, LinkState::Lost);

    // WHEN: Reconnecting at t=5s
    sleep(Duration::from_secs(3)).await;
    monitor.on_connect().await;

    // THEN: Cleared at once
    assert!(!dialog_shown(&store).await);
    assert_eq!(monitor.state().await, LinkState::Connected);
}

/// **VALUE**: Verifies overlapping cycles inside one grace interval do not raise early.
///
/// **WHY THIS MATTERS**: The first cycle's timer fires while the channel is down again. It
/// must not count the earlier outage toward the second one.
///
/// **BUG THIS CATCHES**: Would catch a check that only reads "is it down right now".
#[tokio::test(start_paused = true)]
async fn given_flapping_channel_when_first_timer_fires_then_only_latest_outage_counts() {
    // GIVEN: Down at 0, up at 1s, down again at 1.5s
    let (monitor, store) = monitor();
    monitor.on_connect().await;
    monitor.on_disconnect().await;
    sleep(Duration::from_secs(1)).await;
    monitor.on_connect().await;
    sleep(Duration::from_millis(500)).await;
    monitor.on_disconnect().await;

    // WHEN: The first timer fires at 2s
    sleep(Duration::from_millis(600)).await;

    // THEN: Still pending
    assert!(!dialog_shown(&store).await);
    assert_eq!(monitor.state().await, LinkState::PendingLost);

    // WHEN: The second outage reaches 2s (t=3.5s)
    sleep(Duration::from_millis(1500)).await;

    // THEN: Raised
    assert!(dialog_shown(&store).await);
}

/// **VALUE**: Verifies nothing is reported before the first successful connect.
///
/// **WHY THIS MATTERS**: At start-up the channel is "unknown", not "lost".
///
/// **BUG THIS CATCHES**: Would catch starting the state machine in Connected.
#[tokio::test(start_paused = true)]
async fn given_no_connect_yet_when_disconnect_reported_then_state_stays_unknown() {
    let (monitor, store) = monitor();

    monitor.on_disconnect().await;
    sleep(GRACE * 3).await;

    assert_eq!(monitor.state().await, LinkState::Unknown);
    assert!(!dialog_shown(&store).await);
}
