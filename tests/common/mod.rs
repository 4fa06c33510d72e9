#![allow(dead_code)]

use async_trait::async_trait;
use platformer_core::assets::AssetStore;
use platformer_core::audio::AudioDevice;
use platformer_core::catalog::{builtin_levels, Catalog};
use platformer_core::engine::{ImageSize, Rect, Size, Surface};
use platformer_core::error::{AssetError, HostError};
use platformer_core::host::{AudioSettings, HostChannel};
use platformer_core::loading::{Collaborators, LoadingProgress};
use platformer_core::time::{Clock, Sleeper};
use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Returns `Pending` once, waking itself, so sibling futures get polled.
pub struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

pub fn yield_now() -> YieldNow {
    YieldNow(false)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockImage {
    pub path: String,
    pub size: Size,
}

impl ImageSize for MockImage {
    fn size(&self) -> Size {
        self.size
    }
}

/// In-memory store. Every probe and fetch suspends once, like real I/O.
#[derive(Default)]
pub struct MockStore {
    existing: RefCell<HashSet<String>>,
    broken: RefCell<HashSet<String>>,
    pub probed: RefCell<Vec<String>>,
    pub fetched: RefCell<Vec<String>>,
    in_flight: Cell<usize>,
    pub max_in_flight: Cell<usize>,
}

impl MockStore {
    pub fn with_existing(paths: &[&str]) -> Self {
        let store = MockStore::default();
        for path in paths {
            store.existing.borrow_mut().insert(path.to_string());
        }
        store
    }

    pub fn add(&self, path: &str) {
        self.existing.borrow_mut().insert(path.to_string());
    }

    /// Probes still succeed, fetches fail.
    pub fn break_path(&self, path: &str) {
        self.broken.borrow_mut().insert(path.to_string());
    }

    async fn io(&self) {
        let now = self.in_flight.get() + 1;
        self.in_flight.set(now);
        self.max_in_flight.set(self.max_in_flight.get().max(now));
        yield_now().await;
        self.in_flight.set(self.in_flight.get() - 1);
    }

    fn resolve(&self, path: &str) -> Result<(), AssetError> {
        if self.broken.borrow().contains(path) {
            return Err(AssetError::LoadFailed {
                path: path.to_string(),
                reason: "decode error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl AssetStore for MockStore {
    type Image = MockImage;
    type Audio = String;

    async fn probe_exists(&self, path: &str) -> bool {
        self.probed.borrow_mut().push(path.to_string());
        self.io().await;
        self.existing.borrow().contains(path)
    }

    async fn fetch_image(&self, path: &str) -> Result<MockImage, AssetError> {
        self.fetched.borrow_mut().push(path.to_string());
        self.io().await;
        self.resolve(path)?;
        Ok(MockImage {
            path: path.to_string(),
            size: Size {
                width: 1920.0,
                height: 1080.0,
            },
        })
    }

    async fn fetch_audio(&self, path: &str) -> Result<String, AssetError> {
        self.fetched.borrow_mut().push(path.to_string());
        self.io().await;
        self.resolve(path)?;
        Ok(path.to_string())
    }
}

pub enum HostReply {
    Settings(AudioSettings),
    Fail(HostError),
    Silent,
}

/// Answers each handshake with the next queued reply; defaults once empty.
#[derive(Default)]
pub struct MockHost {
    replies: RefCell<VecDeque<HostReply>>,
    pub calls: Cell<usize>,
}

impl MockHost {
    pub fn replying(replies: Vec<HostReply>) -> Self {
        MockHost {
            replies: RefCell::new(replies.into()),
            calls: Cell::new(0),
        }
    }
}

#[async_trait(?Send)]
impl HostChannel for MockHost {
    async fn await_initial_audio_settings(&self) -> Result<AudioSettings, HostError> {
        self.calls.set(self.calls.get() + 1);
        let reply = self.replies.borrow_mut().pop_front();
        yield_now().await;
        match reply {
            Some(HostReply::Settings(settings)) => Ok(settings),
            Some(HostReply::Fail(err)) => Err(err),
            Some(HostReply::Silent) => futures::future::pending().await,
            None => Ok(AudioSettings::default()),
        }
    }
}

/// Completes immediately and remembers how long it was asked to wait.
#[derive(Default)]
pub struct InstantSleeper {
    pub requested: RefCell<Vec<u32>>,
}

#[async_trait(?Send)]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, ms: u32) {
        self.requested.borrow_mut().push(ms);
    }
}

#[derive(Default)]
pub struct ManualClock(Cell<f64>);

impl ManualClock {
    pub fn advance(&self, ms: f64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.0.get()
    }
}

#[derive(Default)]
pub struct RecordingAudio {
    pub events: RefCell<Vec<String>>,
}

impl AudioDevice for RecordingAudio {
    fn suspend_background_track(&self) {
        self.events.borrow_mut().push("suspend".to_string());
    }

    fn resume_background_track(&self) {
        self.events.borrow_mut().push("resume".to_string());
    }

    fn play_one_shot(&self, event_id: &str) {
        self.events.borrow_mut().push(format!("play:{}", event_id));
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    pub draws: RefCell<Vec<(String, Rect, Rect)>>,
}

impl Surface for RecordingSurface {
    type Image = MockImage;

    fn draw_image(&self, image: &MockImage, source: &Rect, destination: &Rect) {
        self.draws
            .borrow_mut()
            .push((image.path.clone(), *source, *destination));
    }
}

pub struct Fixture {
    pub store: Rc<MockStore>,
    pub host: Rc<MockHost>,
    pub sleeper: Rc<InstantSleeper>,
}

impl Fixture {
    pub fn new(store: MockStore, host: MockHost) -> Self {
        Fixture {
            store: Rc::new(store),
            host: Rc::new(host),
            sleeper: Rc::new(InstantSleeper::default()),
        }
    }

    pub fn deps(&self, catalog: Catalog) -> Collaborators<MockStore> {
        Collaborators {
            store: self.store.clone(),
            host: self.host.clone(),
            sleeper: self.sleeper.clone(),
            catalog: Rc::new(catalog),
        }
    }

    pub fn default_deps(&self) -> Collaborators<MockStore> {
        self.deps(Catalog::new(builtin_levels()))
    }
}

pub type ProgressLog = Rc<RefCell<Vec<LoadingProgress>>>;

pub fn progress_log() -> ProgressLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn recorder(log: &ProgressLog) -> impl FnMut(&LoadingProgress) + 'static {
    let log = log.clone();
    move |progress| log.borrow_mut().push(progress.clone())
}
