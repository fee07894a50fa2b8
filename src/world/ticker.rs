use crate::world::authority::WorldAuthority;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run [`WorldAuthority::reward_tick`] every `period` until `shutdown` fires.
///
/// The first tick happens one full period after start. A failed tick is
/// logged and the schedule carries on.
pub fn spawn_reward_ticker(
    authority: Arc<WorldAuthority>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);
        info!(period_ms = period.as_millis() as u64, "Reward ticker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                tick = ticks.next() => {
                    if tick.is_none() {
                        break;
                    }
                    if let Err(e) = authority.reward_tick().await {
                        error!(error = %e, "Site reward tick failed");
                    }
                }
            }
        }
        info!("Reward ticker stopped");
    })
}
