//! Loading a database on a worker thread.
//!
//! The loader owns the open [`Database`] and a private [`Collection`]. The
//! caller can poll progress, raise the kill flag, or wait for completion.
//! A killed load still hands back the games read so far, with
//! [`LoadOutcome::killed`] set.

use std::io::{BufRead, Seek};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::collection::Collection;
use super::database::{Database, LoadOutcome};
use super::error::DbError;
use super::ids::GameIdAllocator;
use super::log;
use super::progress::{PERMILL_DONE, Progress};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub struct LoadedGames {
    pub collection: Collection,
    pub outcome: LoadOutcome,
}

type Slot = Arc<Mutex<Option<Result<LoadedGames, DbError>>>>;

#[derive(Debug)]
pub struct BackgroundLoad {
    result: Slot,
    kill: Arc<AtomicBool>,
    permill: Arc<AtomicU32>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundLoad {
    /// Starts loading every game of `db` for searching. New ids come from
    /// `ids`.
    pub fn start<R>(mut db: Database<R>, ids: GameIdAllocator) -> Result<Self, DbError>
    where
        R: BufRead + Seek + Send + 'static,
    {
        let result: Slot = Arc::new(Mutex::new(None));
        let kill = Arc::new(AtomicBool::new(false));
        let permill = Arc::new(AtomicU32::new(0));

        let slot = Arc::clone(&result);
        let kill_flag = Arc::clone(&kill);
        let shared_permill = Arc::clone(&permill);
        let handle = thread::Builder::new()
            .name("bindb-load".into())
            .spawn(move || {
                let mut collection = Collection::with_allocator(ids);
                let mut report = |p: u32, _: Option<&str>| {
                    shared_permill.store(p, Ordering::Relaxed);
                    ControlFlow::Continue(())
                };
                let loaded = db
                    .load_into(&mut collection, false, &mut report, &kill_flag)
                    .map(|outcome| LoadedGames {
                        collection,
                        outcome,
                    });
                if let Err(e) = &loaded {
                    log::error(format!("Background load of {} failed: {}", db.name(), e));
                }
                shared_permill.store(PERMILL_DONE, Ordering::Relaxed);
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(loaded);
            })
            .map_err(|e| DbError::Io(format!("Cannot start background load: {e}")))?;

        Ok(Self {
            result,
            kill,
            permill,
            handle: Some(handle),
        })
    }

    /// Progress of the load so far.
    pub fn permill(&self) -> u32 {
        self.permill.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Asks the loader to stop after the current game.
    pub fn kill(&self) {
        self.kill.store(true, Ordering::Relaxed);
    }

    /// Blocks until the load is done, reporting the remaining progress.
    /// `Break` from `progress` kills the load, which still returns the games
    /// read so far.
    pub fn wait(mut self, progress: &mut (impl Progress + ?Sized)) -> Result<LoadedGames, DbError> {
        let base = self.permill();
        while !self.is_finished() {
            let done = self.permill().saturating_sub(base);
            let span = PERMILL_DONE.saturating_sub(base);
            if progress.fraction(u64::from(done), u64::from(span)).is_break() {
                self.kill();
            }
            thread::sleep(POLL_INTERVAL);
        }
        self.join()?;
        self.result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or(Err(DbError::Killed))
    }

    fn join(&mut self) -> Result<(), DbError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| DbError::Io("background load thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for BackgroundLoad {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.kill();
            let _ = self.join();
        }
    }
}
