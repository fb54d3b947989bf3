use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use flume::Receiver;
use tracing::debug;

use crate::job::pipeline::{JobContext, panic_message, run_job};
use crate::job::{CancellationToken, GenerationJob, GenerationResult, JobEvent, JobState};
use crate::render::Renderer;
use crate::{TilepackError, TilepackResult};

const WORKER_NAME: &str = "tilepack-worker";

/// Clears the busy flag of a [`Generator`] when the worker is done, even if it panics.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Starts generation jobs, one at a time.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    active: Arc<AtomicBool>,
}

impl Generator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a job is currently running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Starts `job` on a new worker thread. The renderer moves into the worker and is only
    /// ever called from there.
    ///
    /// Fails with [`TilepackError::JobAlreadyRunning`] while another job of this generator
    /// has not finished.
    pub fn submit<R: Renderer + 'static>(
        &self,
        job: GenerationJob,
        mut renderer: R,
    ) -> TilepackResult<JobHandle> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TilepackError::JobAlreadyRunning);
        }
        let guard = ActiveGuard(Arc::clone(&self.active));

        let (events, receiver) = flume::unbounded();
        let ctx = JobContext {
            events,
            cancel: CancellationToken::default(),
            state: Arc::new(Mutex::new(JobState::Idle)),
        };
        let cancel = ctx.cancel.clone();
        let state = Arc::clone(&ctx.state);

        debug!("Submitting tile generation job for {}", job.output.display());
        let thread = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || {
                let _guard = guard;
                run_job(&job, &mut renderer, &ctx)
            })
            .map_err(TilepackError::WorkerSpawn)?;

        Ok(JobHandle {
            thread,
            events: receiver,
            cancel,
            state,
        })
    }
}

/// Controls a running job.
#[derive(Debug)]
pub struct JobHandle {
    thread: JoinHandle<TilepackResult<GenerationResult>>,
    events: Receiver<JobEvent>,
    cancel: CancellationToken,
    state: Arc<Mutex<JobState>>,
}

impl JobHandle {
    /// Asks the worker to stop before the next tile.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Events of this job. The channel closes when the worker ends.
    #[must_use]
    pub fn events(&self) -> &Receiver<JobEvent> {
        &self.events
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the worker and returns the job result.
    pub fn join(self) -> TilepackResult<GenerationResult> {
        self.thread.join().unwrap_or_else(|panic| {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            *state = JobState::Failed;
            Err(TilepackError::WorkerPanicked(panic_message(&*panic)))
        })
    }
}
