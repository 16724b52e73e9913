#![warn(
    clippy::unwrap_used,
    clippy::cast_lossless,
    clippy::unimplemented,
    clippy::indexing_slicing,
    clippy::expect_used
)]
use std::{any, future, pin};

use bevy::tasks::{AsyncComputeTaskPool, TaskPool};

#[cfg(not(target_arch = "wasm32"))]
pub type AsyncReturn<Output> = pin::Pin<Box<dyn future::Future<Output = Output> + Send + 'static>>;
#[cfg(target_arch = "wasm32")]
pub type AsyncReturn<Output> = pin::Pin<Box<dyn future::Future<Output = Output> + 'static>>;

/// A unit of background work. `perform` runs on the async compute pool and its outcome is
/// handed back through [`JobQueue::take_next`] on the thread that owns the queue.
pub trait Job: any::Any + Sized + Send + 'static {
    type Outcome: any::Any + Send + Sync;

    fn name(&self) -> String;

    fn perform(self, context: Context) -> AsyncReturn<Self::Outcome>;
}

pub struct Context {
    pub progress_tx: async_channel::Sender<Progress>,
}

impl Context {
    pub fn send_progress(&self, progress: Progress) -> async_channel::Send<u8> {
        self.progress_tx.send(progress)
    }
}

pub type Progress = u8;

pub struct JobOutcomePayload {
    pub job_outcome_type_id: any::TypeId,
    pub job_outcome: Box<dyn any::Any + Send + Sync>,
}

pub struct InProgressJob {
    pub name: String,
    pub progress: Progress,
    pub progress_recv: async_channel::Receiver<Progress>,
    pub outcome_recv: async_channel::Receiver<JobOutcomePayload>,
}

/// Jobs in flight plus the outcomes that arrived but were not taken yet.
#[derive(Default)]
pub struct JobQueue {
    in_progress: Vec<InProgressJob>,
    finished: Vec<JobOutcomePayload>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<J: Job>(&mut self, job: J) {
        let (outcome_tx, outcome_recv) = async_channel::unbounded::<JobOutcomePayload>();
        let (progress_tx, progress_recv) = async_channel::unbounded::<Progress>();

        let job_name = job.name();
        self.in_progress.push(InProgressJob {
            name: job_name.clone(),
            progress: 0,
            progress_recv,
            outcome_recv,
        });

        AsyncComputeTaskPool::init(TaskPool::default)
            .spawn(async move {
                let instant = instant::Instant::now();
                let outcome = job.perform(Context { progress_tx }).await;
                bevy::log::trace!("Completed job '{}' in {:?}", job_name, instant.elapsed());
                if let Err(e) = outcome_tx
                    .send(JobOutcomePayload {
                        job_outcome_type_id: any::TypeId::of::<J>(),
                        job_outcome: Box::new(outcome),
                    })
                    .await
                {
                    bevy::log::error!(
                        "Failed to send result from job {} back to main thread: {:?}",
                        job_name,
                        e
                    );
                }
            })
            .detach();
    }

    /// Collects finished outcomes and progress updates. Returns how many jobs finished.
    pub fn poll(&mut self) -> usize {
        let mut finished = 0;
        let mut index = 0;
        while index < self.in_progress.len() {
            let Some(in_progress_job) = self.in_progress.get_mut(index) else {
                break;
            };
            while let Ok(progress) = in_progress_job.progress_recv.try_recv() {
                in_progress_job.progress = progress;
            }
            match in_progress_job.outcome_recv.try_recv() {
                Ok(outcome) => {
                    self.finished.push(outcome);
                    self.in_progress.swap_remove(index);
                    finished += 1;
                }
                Err(async_channel::TryRecvError::Closed) => {
                    bevy::log::error!("Job {} stopped without an outcome", in_progress_job.name);
                    self.in_progress.swap_remove(index);
                }
                Err(async_channel::TryRecvError::Empty) => index += 1,
            }
        }
        finished
    }

    pub fn take_next<J: Job>(&mut self) -> Option<J::Outcome> {
        let index = self.finished.iter().position(|outcome_payload| {
            any::TypeId::of::<J>() == outcome_payload.job_outcome_type_id
                && outcome_payload.job_outcome.is::<J::Outcome>()
        })?;
        let outcome_payload = self.finished.remove(index);
        outcome_payload
            .job_outcome
            .downcast()
            .map(|outcome| *outcome)
            .ok()
    }

    pub fn in_progress_count(&self) -> usize {
        self.in_progress.len()
    }

    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    pub fn in_progress(&self) -> impl Iterator<Item = &InProgressJob> {
        self.in_progress.iter()
    }

    pub fn is_idle(&self) -> bool {
        self.in_progress.is_empty() && self.finished.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct Add(u32, u32);
    impl Job for Add {
        type Outcome = u32;
        fn name(&self) -> String {
            format!("add {} {}", self.0, self.1)
        }
        fn perform(self, context: Context) -> AsyncReturn<Self::Outcome> {
            Box::pin(async move {
                let _ = context.send_progress(50).await;
                self.0 + self.1
            })
        }
    }

    struct Greet;
    impl Job for Greet {
        type Outcome = String;
        fn name(&self) -> String {
            "greet".into()
        }
        fn perform(self, _context: Context) -> AsyncReturn<Self::Outcome> {
            Box::pin(async move { "hello".to_string() })
        }
    }

    fn wait_for(queue: &mut JobQueue, count: usize) {
        for _ in 0..500 {
            queue.poll();
            if queue.finished_count() >= count {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("jobs did not finish in time");
    }

    #[test]
    fn outcomes_are_taken_by_job_type() {
        let mut queue = JobQueue::new();
        queue.spawn(Add(1, 2));
        queue.spawn(Greet);
        assert_eq!(queue.in_progress_count(), 2);

        wait_for(&mut queue, 2);
        assert_eq!(queue.in_progress_count(), 0);
        assert_eq!(queue.take_next::<Greet>(), Some("hello".to_string()));
        assert_eq!(queue.take_next::<Greet>(), None);
        assert_eq!(queue.take_next::<Add>(), Some(3));
        assert!(queue.is_idle());
    }

    #[test]
    fn empty_queue_has_nothing() {
        let mut queue = JobQueue::new();
        assert_eq!(queue.poll(), 0);
        assert_eq!(queue.take_next::<Add>(), None);
        assert!(queue.is_idle());
    }
}
