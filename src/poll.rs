//! Periodic now-playing updates.
//!
//! [`NowPlayingPoller::spawn`] starts a task that fetches
//! `GET /currently-playing` right away and then once per interval, for as
//! long as the returned [`PollHandle`] lives. Each fetch finishes before the
//! next one starts. Cancelling the handle, explicitly or by dropping it,
//! also aborts a fetch that is in flight, so no stale snapshot is published
//! after teardown.
//!
//! # Example
//!
//! ```rust
//! let handle = NowPlayingPoller::spawn(Arc::clone(&session), config.poll_interval)?;
//! let mut updates = handle.updates();
//! while updates.changed().await.is_ok() {
//!     if let Some(track) = updates.borrow().as_ref().and_then(NowPlaying::track) {
//!         println!("{} - {}", track.artist_names(), track.name);
//!     }
//! }
//! ```

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    protocol::player::NowPlaying,
    session::Session,
};

/// Spawns now-playing polling tasks.
pub struct NowPlayingPoller;

impl NowPlayingPoller {
    /// Starts polling on the current Tokio runtime.
    ///
    /// Snapshots are `None` while logged out and after a failed fetch.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`](crate::error::ErrorKind::InvalidArgument)
    /// if `interval` is zero.
    pub fn spawn(session: Arc<Session>, interval: Duration) -> Result<PollHandle> {
        if interval.is_zero() {
            return Err(Error::invalid_argument("poll interval must not be zero"));
        }

        let (tx, rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(Self::run(session, interval, tx, cancel.clone()));

        Ok(PollHandle {
            cancel,
            task: Some(task),
            updates: rx,
        })
    }

    async fn run(
        session: Arc<Session>,
        interval: Duration,
        tx: watch::Sender<Option<NowPlaying>>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!("polling now playing every {:.1}s", interval.as_secs_f32());

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let snapshot = if session.is_authenticated() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = session.backend().currently_playing() => match result {
                        Ok(now_playing) => Some(now_playing),
                        Err(e) => {
                            warn!("could not fetch currently playing track: {e}");
                            None
                        }
                    },
                }
            } else {
                None
            };

            tx.send_replace(snapshot);
        }

        debug!("stopped polling now playing");
    }
}

/// Owner of a polling task. Dropping it stops the task.
pub struct PollHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    updates: watch::Receiver<Option<NowPlaying>>,
}

impl PollHandle {
    /// Receives every published snapshot.
    #[must_use]
    pub fn updates(&self) -> watch::Receiver<Option<NowPlaying>> {
        self.updates.clone()
    }

    /// The most recent snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<NowPlaying> {
        self.updates.borrow().clone()
    }

    /// Stops polling. A fetch in flight is aborted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops polling and waits for the task to finish.
    ///
    /// # Errors
    ///
    /// Returns error if the task panicked.
    pub async fn stop(mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.await?;
        }

        Ok(())
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
