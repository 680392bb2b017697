use crate::dispatcher::Dispatcher;
use crate::protocol::Verb;
use crate::registry::TargetEntry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, Instrument};

/// Start the status poll loop for a target.
///
/// The first poll fires immediately. After each reply is recorded, the next
/// tick waits for the target's interval as it reads at that moment, so an
/// interval edit applies from the cycle after the one in flight. A shutdown
/// signal stops the loop between ticks; an in-flight dispatch always completes.
pub fn start_poll_task(
    target: Arc<TargetEntry>,
    dispatcher: Dispatcher,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let span = info_span!("poll", target_id = %target.id());
    tokio::spawn(
        async move {
            loop {
                let reply = dispatcher.dispatch(&target, Verb::Status).await;
                target.record_status(Verb::Status, reply);

                if *shutdown.borrow() {
                    break;
                }

                let interval = target.poll_interval();
                debug!(interval, "next status poll scheduled");

                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
                    // Fires on the stop signal, or when the sender is gone
                    _ = shutdown.changed() => break,
                }
            }

            info!("status polling stopped");
        }
        .instrument(span),
    )
}

/// Run a single user-triggered command and record its reply.
///
/// Independent of the poll loop: it neither resets nor cancels the timer.
pub fn spawn_command(target: Arc<TargetEntry>, dispatcher: Dispatcher, verb: Verb) -> JoinHandle<()> {
    let span = info_span!("command", target_id = %target.id(), verb = %verb);
    tokio::spawn(
        async move {
            let reply = dispatcher.dispatch(&target, verb).await;
            target.record_status(verb, reply);
        }
        .instrument(span),
    )
}
