use std::sync::Arc;

use futures::Stream;
use jobscout_shutdown_signal::ShutdownSignal;
use tracing::error;

use crate::store::JobStore;
use crate::Job;

/// Returns a stream that yields every job that is available to be processed.
/// It stops when the shutdown signal is triggered or when there is no more
/// job to claim.
pub(crate) fn job_stream(
    store: Arc<dyn JobStore>,
    shutdown_signal: ShutdownSignal,
    worker_id: String,
) -> impl Stream<Item = Job> {
    futures::stream::unfold((), move |()| {
        let store = store.clone();
        let worker_id = worker_id.clone();

        let job_fut = async move {
            let claimed = store.claim_batch(&worker_id, 1).await.map_err(|e| {
                error!("Could not claim job : {:?}", e);
                e
            });

            match claimed {
                Ok(mut jobs) => jobs.pop().map(|job| (job, ())),
                Err(_) => None,
            }
        };
        let shutdown_fut = shutdown_signal.clone();

        async move {
            tokio::select! {
                res = job_fut => res,
                _ = shutdown_fut => None
            }
        }
    })
}
