use crate::assets::{AssetStore, BrowserAssetStore};
use crate::audio::AudioDevice;
use crate::catalog::{Catalog, LevelDef};
use crate::config::GameConfig;
use crate::engine::{Game, Point, Rect, Renderer, Size, Surface};
use crate::error::LoadError;
use crate::host::AudioSettings;
use crate::loading::{Collaborators, LoadingCoordinator, LoadingPlan, LoadingProgress};
use crate::parallax::{ParallaxLayerResolver, ThemeLoad};
use crate::pause::{reason, PauseClock};
use crate::time::Clock;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// ┌──────────── Session lifecycle ────────────┐
/// │  start()                                  │
/// │   ├─► LoadingCoordinator::load()          │
/// │   ├─► PauseClock::start()                 │
/// │   └─► select_level(0) ─► load_theme()     │
/// │                                           │
/// │  every frame                              │
/// │   ├─► tick()   (skipped while paused)     │
/// │   └─► render() (placeholder if not ready) │
/// └───────────────────────────────────────────┘
///
/// One of each core component per play session, handed out by reference
/// instead of living in globals.
pub struct Session<S: AssetStore> {
    catalog: Rc<Catalog>,
    loader: LoadingCoordinator<S>,
    clock: RefCell<PauseClock>,
    backgrounds: ParallaxLayerResolver<S>,
    audio: Rc<dyn AudioDevice>,
    level: Cell<Option<usize>>,
    reference: Cell<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Victory,
    Defeat,
}

impl Outcome {
    fn reason(self) -> &'static str {
        match self {
            Outcome::Victory => reason::VICTORY,
            Outcome::Defeat => reason::DEFEAT,
        }
    }
}

impl<S: AssetStore> Session<S> {
    pub fn new(
        config: &GameConfig,
        deps: Collaborators<S>,
        clock: Rc<dyn Clock>,
        audio: Rc<dyn AudioDevice>,
        canvas: Size,
    ) -> Self {
        let backgrounds =
            ParallaxLayerResolver::new(deps.store.clone(), config.parallax.clone(), canvas);
        Session {
            catalog: deps.catalog.clone(),
            loader: LoadingCoordinator::new(
                LoadingPlan::standard(config),
                config.loading.clone(),
                deps,
            ),
            clock: RefCell::new(PauseClock::new(clock, audio.clone())),
            backgrounds,
            audio,
            level: Cell::new(None),
            reference: Cell::new(Point {
                x: canvas.width / 2.0,
                y: canvas.height / 2.0,
            }),
        }
    }

    pub fn on_progress(&self, callback: impl FnMut(&LoadingProgress) + 'static) {
        self.loader.set_progress_callback(callback);
    }

    /// Loads everything, starts the clock and enters the first level.
    ///
    /// A no-op once the session is running. Pause reasons raised while
    /// loading are still held when the clock starts.
    pub async fn start(&self) -> Result<(), LoadError> {
        if self.clock.borrow().is_started() {
            return Ok(());
        }
        self.loader.load().await?;
        if self.clock.borrow().is_started() {
            return Ok(());
        }
        let held = self.clock.borrow().pause_reasons();
        {
            let mut clock = self.clock.borrow_mut();
            clock.start();
            for reason in &held {
                clock.pause(reason, true);
            }
        }
        self.select_level(0).await;
        Ok(())
    }

    /// `None` when the catalog has no level at `index`.
    pub async fn select_level(&self, index: usize) -> Option<ThemeLoad> {
        let theme = self.catalog.get(index)?.theme.clone();
        self.level.set(Some(index));
        Some(self.backgrounds.load_theme(&theme).await)
    }

    pub fn current_level(&self) -> Option<&LevelDef> {
        self.catalog.get(self.level.get()?)
    }

    pub fn pause(&self, reason: &str, suspend_audio: bool) {
        self.clock.borrow_mut().pause(reason, suspend_audio);
    }

    pub fn resume(&self, reason: &str) {
        self.clock.borrow_mut().resume(reason);
    }

    pub fn is_paused(&self) -> bool {
        self.clock.borrow().is_paused()
    }

    pub fn pause_reasons(&self) -> Vec<String> {
        self.clock.borrow().pause_reasons()
    }

    pub fn adjusted_time(&self) -> f64 {
        self.clock.borrow().adjusted_time()
    }

    /// Holds play on the result screen and plays its sting.
    pub fn finish_level(&self, outcome: Outcome) {
        self.pause(outcome.reason(), true);
        self.audio.play_one_shot(outcome.reason());
    }

    pub fn dismiss_result(&self) {
        self.resume(Outcome::Victory.reason());
        self.resume(Outcome::Defeat.reason());
    }

    /// Same session, fresh clock.
    pub fn restart(&self) {
        self.clock.borrow_mut().reset();
    }

    pub fn teardown(&self) {
        self.clock.borrow_mut().cleanup();
        self.backgrounds.clear();
        self.level.set(None);
    }

    pub fn set_reference(&self, reference: Point) {
        self.reference.set(reference);
    }

    pub fn resize(&self, canvas: Size) {
        self.backgrounds.resize(canvas);
    }

    pub fn tick(&self) {
        if !self.is_paused() {
            self.backgrounds.update(self.reference.get());
        }
    }

    /// `false` when there is nothing to draw and the caller should show its
    /// placeholder.
    pub fn render<T: Surface<Image = S::Image>>(&self, surface: &T) -> bool {
        if !self.backgrounds.is_ready() {
            return false;
        }
        self.backgrounds.render(surface);
        true
    }

    pub fn is_ready(&self) -> bool {
        self.loader.is_complete() && self.backgrounds.is_ready()
    }

    pub fn current_theme(&self) -> Option<String> {
        self.backgrounds.current_theme()
    }

    pub fn audio_settings(&self) -> Option<AudioSettings> {
        self.loader.audio_settings()
    }

    pub fn loader(&self) -> &LoadingCoordinator<S> {
        &self.loader
    }

    pub fn backgrounds(&self) -> &ParallaxLayerResolver<S> {
        &self.backgrounds
    }
}

impl Game for Session<BrowserAssetStore> {
    fn update(&self) {
        self.tick();
    }

    fn draw(&self, renderer: &Renderer) {
        let canvas = renderer.canvas_size();
        renderer.clear(&Rect::new(Point::default(), canvas));
        if !self.render(renderer) {
            log::trace!("no background layers ready");
        }
    }

    fn is_paused(&self) -> bool {
        Session::is_paused(self)
    }
}
