//! Bounded scheduler.
//!
//! Every submitted run is a tokio task tracked by a [`TaskTracker`]. A run
//! first waits for its predecessor (if any) to stop, then for one of K
//! semaphore permits, which tokio hands out in FIFO order. Only then does it
//! move the task to `Downloading` and hand over to the worker.
//!
//! While the queue is held, fresh runs wait before taking a permit and
//! give a permit back if the hold began in the meantime. Resumes are not
//! held.
//!
//! Lock order: `runs` before the task's own state lock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Semaphore, watch};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use modelfetch_core::{DownloadId, DownloadStatus, DownloadTask};

/// Cancellable handle to the latest run of one task.
#[derive(Debug, Clone)]
pub struct RunHandle {
    run_id: u64,
    /// Cancelled by pause, cancel, or withdrawal of a pending resume.
    pub token: CancellationToken,
    /// Cancelled when the run has fully stopped.
    pub done: CancellationToken,
    started: bool,
}

impl RunHandle {
    /// Wait until the run has stopped.
    pub async fn stopped(&self) {
        self.done.cancelled().await;
    }
}

/// Why a run is being submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// First run of a queued task.
    Fresh,
    /// Continuation of a paused task from its partial file.
    Resume,
}

impl RunMode {
    const fn expected_status(self) -> DownloadStatus {
        match self {
            Self::Fresh => DownloadStatus::Queued,
            Self::Resume => DownloadStatus::Paused,
        }
    }
}

/// Outcome of trying to start a run that holds a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Begin {
    Started,
    /// Queue is held; give the permit back and wait for release.
    Held,
    /// Superseded, cancelled, or the task left the expected status.
    Stale,
}

#[derive(Debug)]
pub struct Scheduler {
    permits: Arc<Semaphore>,
    capacity: usize,
    held: watch::Sender<bool>,
    tracker: TaskTracker,
    runs: Arc<Mutex<HashMap<DownloadId, RunHandle>>>,
    aborts: Mutex<Vec<AbortHandle>>,
    next_run: AtomicU64,
}

impl Scheduler {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            held: watch::Sender::new(false),
            tracker: TaskTracker::new(),
            runs: Arc::new(Mutex::new(HashMap::new())),
            aborts: Mutex::new(Vec::new()),
            next_run: AtomicU64::new(1),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<DownloadId, RunHandle>> {
        lock_runs(&self.runs)
    }

    /// Stop fresh runs from starting. Taken under the runs lock so no run
    /// can be between its hold check and its transition to `Downloading`.
    pub fn hold_queue(&self) {
        let _runs = self.runs();
        self.held.send_replace(true);
    }

    pub fn release_queue(&self) {
        let _runs = self.runs();
        self.held.send_replace(false);
    }

    /// Submit a run for `task`.
    ///
    /// `work` receives the run token and is polled only after the task has
    /// been moved to `Downloading` while holding a permit. For
    /// [`RunMode::Resume`], returns `false` without submitting if the task
    /// is not paused or a resume is already pending.
    pub fn submit<F, Fut>(&self, task: &Arc<DownloadTask>, mode: RunMode, work: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut runs = self.runs();
        let id = task.id().clone();

        let previous = runs.get(&id).cloned();
        if mode == RunMode::Resume {
            if task.status() != DownloadStatus::Paused {
                return false;
            }
            if previous.as_ref().is_some_and(|run| !run.token.is_cancelled()) {
                return false;
            }
        }

        let handle = RunHandle {
            run_id: self.next_run.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
            done: CancellationToken::new(),
            started: false,
        };
        runs.insert(id.clone(), handle.clone());

        let job = RunJob {
            id,
            task: Arc::clone(task),
            mode,
            handle,
            previous,
            permits: Arc::clone(&self.permits),
            held: self.held.subscribe(),
            runs: Arc::clone(&self.runs),
        };
        let join = self.tracker.spawn(job.run(work));
        drop(runs);

        let mut aborts = self.aborts.lock().unwrap_or_else(PoisonError::into_inner);
        aborts.retain(|handle| !handle.is_finished());
        aborts.push(join.abort_handle());
        true
    }

    /// Cancel the run token of `id`'s current run. Returns the handle so
    /// the caller can wait for the run to stop.
    pub fn interrupt(&self, id: &DownloadId) -> Option<RunHandle> {
        let runs = self.runs();
        let handle = runs.get(id)?;
        handle.token.cancel();
        Some(handle.clone())
    }

    /// Withdraw a resume of a paused task that has not started yet.
    pub fn withdraw_pending(&self, task: &DownloadTask) -> bool {
        let runs = self.runs();
        let Some(handle) = runs.get(task.id()) else {
            return false;
        };
        if handle.started || handle.token.is_cancelled() {
            return false;
        }
        if task.status() != DownloadStatus::Paused {
            return false;
        }
        handle.token.cancel();
        true
    }

    /// Spawn auxiliary work that shutdown should also wait for.
    pub fn spawn_tracked<Fut>(&self, fut: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(fut);
    }

    /// Number of runs not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop tracking new work and wait for every run to finish.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Abort every run still alive.
    pub fn abort_all(&self) -> usize {
        let aborts = self.aborts.lock().unwrap_or_else(PoisonError::into_inner);
        let mut aborted = 0;
        for handle in aborts.iter().filter(|handle| !handle.is_finished()) {
            handle.abort();
            aborted += 1;
        }
        aborted
    }
}

fn lock_runs(
    runs: &Mutex<HashMap<DownloadId, RunHandle>>,
) -> MutexGuard<'_, HashMap<DownloadId, RunHandle>> {
    runs.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One submitted run, moved into its tokio task.
struct RunJob {
    id: DownloadId,
    task: Arc<DownloadTask>,
    mode: RunMode,
    handle: RunHandle,
    previous: Option<RunHandle>,
    permits: Arc<Semaphore>,
    held: watch::Receiver<bool>,
    runs: Arc<Mutex<HashMap<DownloadId, RunHandle>>>,
}

impl RunJob {
    async fn run<F, Fut>(self, work: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()>,
    {
        // Signals `done` on every exit path, including abort.
        let _done = self.handle.done.clone().drop_guard();

        if let Some(previous) = &self.previous {
            previous.stopped().await;
        }

        let permit = loop {
            if self.mode == RunMode::Fresh && !self.wait_for_release().await {
                self.finish();
                return;
            }

            let permit = tokio::select! {
                biased;
                () = self.handle.token.cancelled() => {
                    self.finish();
                    return;
                }
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        self.finish();
                        return;
                    }
                },
            };

            match self.begin() {
                Begin::Started => break permit,
                Begin::Held => drop(permit),
                Begin::Stale => {
                    drop(permit);
                    self.finish();
                    return;
                }
            }
        };

        tracing::debug!(
            target: "modelfetch.download",
            id = %self.id,
            mode = ?self.mode,
            "Run acquired a pool slot"
        );
        work(self.handle.token.clone()).await;

        drop(permit);
        self.finish();
    }

    /// Wait until the queue is not held. `false` if the run was cancelled
    /// or the scheduler is gone.
    async fn wait_for_release(&self) -> bool {
        let mut held = self.held.clone();
        tokio::select! {
            biased;
            () = self.handle.token.cancelled() => false,
            released = held.wait_for(|held| !*held) => released.is_ok(),
        }
    }

    /// Atomically check the run is still current and move the task to
    /// `Downloading`.
    fn begin(&self) -> Begin {
        let mut runs = lock_runs(&self.runs);
        let Some(current) = runs.get_mut(&self.id) else {
            return Begin::Stale;
        };
        if current.run_id != self.handle.run_id || current.token.is_cancelled() {
            return Begin::Stale;
        }
        if self.mode == RunMode::Fresh && *self.held.borrow() {
            return Begin::Held;
        }
        if !self
            .task
            .transition_from(self.mode.expected_status(), DownloadStatus::Downloading)
        {
            return Begin::Stale;
        }
        current.started = true;
        Begin::Started
    }

    fn finish(&self) {
        let mut runs = lock_runs(&self.runs);
        if runs
            .get(&self.id)
            .is_some_and(|current| current.run_id == self.handle.run_id)
        {
            runs.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelfetch_core::{DownloadRequest, ModelKind};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn task(id: &str) -> Arc<DownloadTask> {
        Arc::new(DownloadTask::new(
            DownloadId::new(id),
            DownloadRequest::new("https://example.com/x", id, ModelKind::Other),
            format!("/tmp/{id}.part"),
        ))
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let scheduler = Scheduler::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let tasks: Vec<_> = (0..5).map(|i| task(&format!("t{i}"))).collect();

        for t in &tasks {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let release = Arc::clone(&release);
            let t2 = Arc::clone(t);
            scheduler.submit(t, RunMode::Fresh, move |_token| async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                release.notified().await;
                running.fetch_sub(1, Ordering::SeqCst);
                t2.transition(DownloadStatus::Completed);
            });
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(running.load(Ordering::SeqCst), 2);
        let queued = tasks
            .iter()
            .filter(|t| t.status() == DownloadStatus::Queued)
            .count();
        assert_eq!(queued, 3);

        for _ in 0..20 {
            release.notify_waiters();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        scheduler.drain().await;
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert!(tasks.iter().all(|t| t.status() == DownloadStatus::Completed));
    }

    #[tokio::test]
    async fn test_cancelled_queued_run_never_starts() {
        let scheduler = Scheduler::new(1);
        let blocker = task("blocker");
        let queued = task("queued");
        let release = Arc::new(Notify::new());
        let started = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&release);
        scheduler.submit(&blocker, RunMode::Fresh, move |_| async move {
            r.notified().await;
        });
        let s = Arc::clone(&started);
        scheduler.submit(&queued, RunMode::Fresh, move |_| async move {
            s.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(queued.cancel());
        let handle = scheduler.interrupt(queued.id()).unwrap();
        handle.stopped().await;
        release.notify_one();
        scheduler.drain().await;

        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert_eq!(queued.status(), DownloadStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_resume_requires_paused_and_no_pending_resume() {
        let scheduler = Scheduler::new(1);
        let t = task("t");
        assert!(!scheduler.submit(&t, RunMode::Resume, |_| async {}));

        t.transition(DownloadStatus::Downloading);
        t.transition(DownloadStatus::Paused);

        // Hold the only permit so the resume stays pending.
        let permit = Arc::clone(&scheduler.permits).acquire_owned().await.unwrap();
        assert!(scheduler.submit(&t, RunMode::Resume, |_| async {}));
        assert!(!scheduler.submit(&t, RunMode::Resume, |_| async {}));

        assert!(scheduler.withdraw_pending(&t));
        assert!(!scheduler.withdraw_pending(&t));
        drop(permit);
        scheduler.drain().await;
        assert_eq!(t.status(), DownloadStatus::Paused);
    }

    #[tokio::test]
    async fn test_resume_waits_for_previous_run() {
        let scheduler = Scheduler::new(2);
        let t = task("t");
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&order);
        scheduler.submit(&t, RunMode::Fresh, move |token| async move {
            token.cancelled().await;
            tokio::time::sleep(Duration::from_millis(30)).await;
            o.lock().unwrap().push("first stopped");
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(t.transition(DownloadStatus::Paused));
        scheduler.interrupt(t.id());

        let o = Arc::clone(&order);
        assert!(scheduler.submit(&t, RunMode::Resume, move |_| async move {
            o.lock().unwrap().push("second started");
        }));
        scheduler.drain().await;

        assert_eq!(*order.lock().unwrap(), ["first stopped", "second started"]);
        assert_eq!(t.status(), DownloadStatus::Downloading);
    }

    #[tokio::test]
    async fn test_held_queue_keeps_fresh_runs_waiting() {
        let scheduler = Scheduler::new(2);
        let fresh = task("fresh");
        let paused = task("paused");
        paused.transition(DownloadStatus::Downloading);
        paused.transition(DownloadStatus::Paused);
        let started = Arc::new(Mutex::new(Vec::new()));

        scheduler.hold_queue();
        for (t, mode, name) in [
            (&fresh, RunMode::Fresh, "fresh"),
            (&paused, RunMode::Resume, "resume"),
        ] {
            let s = Arc::clone(&started);
            assert!(scheduler.submit(t, mode, move |_| async move {
                s.lock().unwrap().push(name);
            }));
        }

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(*started.lock().unwrap(), ["resume"]);
        assert_eq!(fresh.status(), DownloadStatus::Queued);

        scheduler.release_queue();
        scheduler.drain().await;
        assert_eq!(*started.lock().unwrap(), ["resume", "fresh"]);
        assert_eq!(fresh.status(), DownloadStatus::Downloading);
    }
}
