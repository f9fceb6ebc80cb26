use async_trait::async_trait;

use crate::types::ProbeStatus;

/// A unit of work the [`WorkerPool`](crate::WorkerPool) can run.
///
/// `execute` reads nothing but the task's own target and writes its outcome
/// back into the task. It must not panic on network failure and must bound
/// its own waiting time; a failed probe leaves its result fields empty and
/// sets its status to [`ProbeStatus::Failed`].
#[async_trait]
pub trait Probe: Send + 'static {
    async fn execute(&mut self);

    fn target(&self) -> &str;

    fn status(&self) -> ProbeStatus;
}
