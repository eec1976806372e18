/// The sample-and-deliver loop of the current-conditions task
use log::{debug, warn};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

use super::retry::{retry, RetryPolicy};
use super::timing::{delay_until_next, next_fire};
use crate::config::TaskConfiguration;
use crate::delivery::DeliveryGateway;
use crate::device::SharedDevice;
use crate::utils::format_datetime;

/// Everything one running loop needs, copied out of the recorder when it starts
pub(crate) struct CycleContext {
    pub device: SharedDevice,
    pub gateway: DeliveryGateway,
    pub retry: RetryPolicy,
    pub task: TaskConfiguration,
}

/// Run cycles until the task is aborted. The first cycle starts immediately and there
/// is exactly one pending wait between two cycles.
pub(crate) async fn run(ctx: CycleContext) {
    loop {
        let deadline = run_once(&ctx).await;
        sleep_until(deadline).await;
    }
}

/// Read, dispatch and compute the deadline of the next cycle
async fn run_once(ctx: &CycleContext) -> Instant {
    let device = &ctx.device;
    let reading = retry(&ctx.retry, "reading current conditions", move |_| async move {
        device.lock().await.read_once().await
    })
    .await;

    let reading = match reading {
        Some(reading) => reading,
        None => {
            warn!(
                "No current conditions this cycle, trying again in {} s",
                ctx.task.interval_secs
            );
            return deadline(Instant::now(), ctx.task.interval());
        }
    };

    // Anchor the next cycle to the moment the reading arrived, not to when the
    // dispatch below returns
    let received_at = Instant::now();
    let interval = ctx.task.interval();
    let next = next_fire(reading.time, interval);
    let delay = delay_until_next(reading.time, interval);

    debug!(
        "Read current conditions at {}, next reading at {}",
        format_datetime(&reading.time),
        format_datetime(&next)
    );

    // Fire and forget
    drop(ctx.gateway.dispatch(reading));

    deadline(received_at, delay)
}

// Deadlines too far out to represent are clamped to roughly 30 years
fn deadline(from: Instant, delay: Duration) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);
    from.checked_add(delay).unwrap_or(from + FAR_FUTURE)
}
