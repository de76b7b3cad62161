//! In-process hand-off between job creation and the polling worker.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use hyperbot_core::domain::uipath::JobId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("job queue is closed; job {0} was not enqueued")]
    Closed(JobId),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job_id: JobId) -> Result<(), QueueError>;
}

/// Bounded mpsc queue; the receiving half belongs to [`crate::JobWorker`].
#[derive(Clone, Debug)]
pub struct ChannelJobQueue {
    sender: mpsc::Sender<JobId>,
}

impl ChannelJobQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<JobId>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobQueue for ChannelJobQueue {
    async fn enqueue(&self, job_id: JobId) -> Result<(), QueueError> {
        self.sender.send(job_id).await.map_err(|_| QueueError::Closed(job_id))
    }
}

#[cfg(test)]
mod tests {
    use hyperbot_core::domain::uipath::JobId;

    use super::{ChannelJobQueue, JobQueue, QueueError};

    #[tokio::test]
    async fn enqueued_ids_arrive_in_order() {
        let (queue, mut receiver) = ChannelJobQueue::bounded(4);

        queue.enqueue(JobId(1)).await.expect("first");
        queue.enqueue(JobId(2)).await.expect("second");

        assert_eq!(receiver.recv().await, Some(JobId(1)));
        assert_eq!(receiver.recv().await, Some(JobId(2)));
    }

    #[tokio::test]
    async fn enqueue_fails_once_receiver_is_dropped() {
        let (queue, receiver) = ChannelJobQueue::bounded(1);
        drop(receiver);

        assert_eq!(queue.enqueue(JobId(9)).await, Err(QueueError::Closed(JobId(9))));
    }
}
