//! Weighted, ordered loading pipeline that gates the start of play.
//!
//! Steps run strictly one after another. Each contributes its weight to a
//! 0..=100 progress figure that only ever grows during a run and is held at
//! 99 until the whole plan has finished. Handshake and catalog failures are
//! fatal; asset prefetch failures are recorded as warnings and skipped.

use crate::assets::AssetStore;
use crate::catalog::Catalog;
use crate::config::{GameConfig, LoadingConfig};
use crate::error::{AssetError, HostError, LoadError, PlanError};
use crate::host::{AudioSettings, HostChannel};
use crate::time::Sleeper;
use futures::future::{join_all, select, Either};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

mod weights {
    pub const HANDSHAKE: u32 = 10;
    pub const CATALOG: u32 = 10;
    pub const SPRITES: u32 = 25;
    pub const BACKGROUNDS: u32 = 30;
    pub const AUDIO: u32 = 20;
    pub const PACING: u32 = 5;
}

const READY_STEP: &str = "complete";
const READY_MESSAGE: &str = "Ready!";

#[derive(Debug, Clone, PartialEq)]
pub enum StepTask {
    /// Wait for the host's audio settings. Fatal.
    Handshake,
    /// Check the level catalog. Fatal.
    ValidateCatalog,
    Images(Vec<String>),
    Audio(Vec<String>),
    /// Visual pacing only; does no work.
    Pacing { duration_ms: u32 },
}

impl StepTask {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StepTask::Handshake | StepTask::ValidateCatalog)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadingStep {
    pub id: String,
    pub weight: u32,
    pub message: String,
    pub task: StepTask,
}

impl LoadingStep {
    pub fn new(id: &str, weight: u32, message: &str, task: StepTask) -> Self {
        LoadingStep {
            id: id.to_string(),
            weight,
            message: message.to_string(),
            task,
        }
    }
}

/// Ordered steps, fixed once built.
#[derive(Debug, Clone)]
pub struct LoadingPlan {
    steps: Vec<LoadingStep>,
    total_weight: u32,
}

impl LoadingPlan {
    pub fn new(steps: Vec<LoadingStep>) -> Result<Self, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::NoSteps);
        }
        if let Some(step) = steps.iter().find(|step| step.weight == 0) {
            return Err(PlanError::ZeroWeight(step.id.clone()));
        }
        let total_weight = steps.iter().map(|step| step.weight).sum();
        Ok(LoadingPlan {
            steps,
            total_weight,
        })
    }

    /// handshake, catalog, sprites, backgrounds, audio, pacing
    pub fn standard(config: &GameConfig) -> Self {
        let steps = vec![
            LoadingStep::new(
                "init",
                weights::HANDSHAKE,
                "Connecting to the game host...",
                StepTask::Handshake,
            ),
            LoadingStep::new(
                "levels",
                weights::CATALOG,
                "Checking the level data...",
                StepTask::ValidateCatalog,
            ),
            LoadingStep::new(
                "sprites",
                weights::SPRITES,
                "Loading characters...",
                StepTask::Images(config.assets.sprites.clone()),
            ),
            LoadingStep::new(
                "background-images",
                weights::BACKGROUNDS,
                "Painting the scenery...",
                StepTask::Images(config.assets.backgrounds.clone()),
            ),
            LoadingStep::new(
                "audio",
                weights::AUDIO,
                "Tuning the soundtrack...",
                StepTask::Audio(config.assets.audio.clone()),
            ),
            LoadingStep::new(
                "finalize",
                weights::PACING,
                "Almost ready...",
                StepTask::Pacing {
                    duration_ms: config.loading.pacing_ms,
                },
            ),
        ];
        let total_weight = steps.iter().map(|step| step.weight).sum();
        LoadingPlan {
            steps,
            total_weight,
        }
    }

    pub fn steps(&self) -> &[LoadingStep] {
        &self.steps
    }

    pub fn total_weight(&self) -> u32 {
        self.total_weight
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingProgress {
    pub current_step: String,
    pub current_message: String,
    pub progress: u8,
    pub is_complete: bool,
    pub error: Option<String>,
}

/// A best-effort asset that failed and was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetWarning {
    pub step: String,
    pub path: String,
    pub reason: String,
}

pub type ProgressCallback = Box<dyn FnMut(&LoadingProgress)>;

/// What the pipeline talks to.
pub struct Collaborators<S> {
    pub store: Rc<S>,
    pub host: Rc<dyn HostChannel>,
    pub sleeper: Rc<dyn Sleeper>,
    pub catalog: Rc<Catalog>,
}

impl<S> Clone for Collaborators<S> {
    fn clone(&self) -> Self {
        Collaborators {
            store: self.store.clone(),
            host: self.host.clone(),
            sleeper: self.sleeper.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum AssetKind {
    Image,
    Audio,
}

pub struct LoadingCoordinator<S: AssetStore> {
    plan: LoadingPlan,
    config: LoadingConfig,
    deps: Collaborators<S>,
    // a cooperative convention, not a lock: there is only one thread
    busy: Cell<bool>,
    complete: Cell<bool>,
    progress: RefCell<LoadingProgress>,
    callback: RefCell<Option<ProgressCallback>>,
    warnings: RefCell<Vec<AssetWarning>>,
    audio_settings: Cell<Option<AudioSettings>>,
    flavor_cursor: Cell<usize>,
}

fn percent(part: u32, total: u32) -> u8 {
    (part as f64 / total as f64 * 100.0).round().min(100.0) as u8
}

impl<S: AssetStore> LoadingCoordinator<S> {
    pub fn new(plan: LoadingPlan, config: LoadingConfig, deps: Collaborators<S>) -> Self {
        LoadingCoordinator {
            plan,
            config,
            deps,
            busy: Cell::new(false),
            complete: Cell::new(false),
            progress: RefCell::new(LoadingProgress::default()),
            callback: RefCell::new(None),
            warnings: RefCell::new(Vec::new()),
            audio_settings: Cell::new(None),
            flavor_cursor: Cell::new(0),
        }
    }

    pub fn set_progress_callback(&self, callback: impl FnMut(&LoadingProgress) + 'static) {
        *self.callback.borrow_mut() = Some(Box::new(callback));
    }

    /// Last emitted snapshot.
    pub fn progress(&self) -> LoadingProgress {
        self.progress.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.busy.get()
    }

    pub fn is_complete(&self) -> bool {
        self.complete.get()
    }

    pub fn warnings(&self) -> Vec<AssetWarning> {
        self.warnings.borrow().clone()
    }

    /// Settings received by the last successful handshake.
    pub fn audio_settings(&self) -> Option<AudioSettings> {
        self.audio_settings.get()
    }

    pub fn plan(&self) -> &LoadingPlan {
        &self.plan
    }

    /// Runs the plan once. Re-entrant calls are rejected without emitting
    /// anything; a call after success is a no-op; a call after a fatal
    /// failure starts over from the first step.
    pub async fn load(&self) -> Result<(), LoadError> {
        if self.busy.get() {
            log::warn!("load() called while already loading");
            return Err(LoadError::AlreadyLoading);
        }
        if self.complete.get() {
            return Ok(());
        }
        self.busy.set(true);
        self.warnings.borrow_mut().clear();
        self.flavor_cursor.set(0);
        *self.progress.borrow_mut() = LoadingProgress::default();

        let result = self.run_steps().await;
        self.busy.set(false);

        match result {
            Ok(()) => {
                self.complete.set(true);
                log::info!(
                    "loading complete with {} warning(s)",
                    self.warnings.borrow().len()
                );
                self.emit(LoadingProgress {
                    current_step: READY_STEP.to_string(),
                    current_message: READY_MESSAGE.to_string(),
                    progress: 100,
                    is_complete: true,
                    error: None,
                });
                Ok(())
            }
            Err(err) => {
                log::error!("loading aborted: {}", err);
                let current_step = self.progress.borrow().current_step.clone();
                self.emit(LoadingProgress {
                    current_step,
                    current_message: err.user_message().to_string(),
                    progress: 0,
                    is_complete: false,
                    error: Some(err.to_string()),
                });
                Err(err)
            }
        }
    }

    async fn run_steps(&self) -> Result<(), LoadError> {
        let total = self.plan.total_weight;
        let mut cumulative = 0;
        for step in &self.plan.steps {
            // capped too: heavy final steps must not round to 100 early
            self.emit_step(step, percent(cumulative, total).min(99), &step.message);
            log::debug!("step '{}' started", step.id);

            self.run_task(step).await?;

            cumulative += step.weight;
            self.emit_step(step, percent(cumulative, total).min(99), &step.message);
        }
        Ok(())
    }

    async fn run_task(&self, step: &LoadingStep) -> Result<(), LoadError> {
        match &step.task {
            StepTask::Handshake => {
                let settings = self.handshake().await?;
                self.audio_settings.set(Some(settings));
            }
            StepTask::ValidateCatalog => self.deps.catalog.validate()?,
            StepTask::Images(paths) => self.prefetch(step, paths, AssetKind::Image).await,
            StepTask::Audio(paths) => self.prefetch(step, paths, AssetKind::Audio).await,
            StepTask::Pacing { duration_ms } => self.deps.sleeper.sleep(*duration_ms).await,
        }
        Ok(())
    }

    async fn handshake(&self) -> Result<AudioSettings, HostError> {
        let handshake = self.deps.host.await_initial_audio_settings();
        match self.config.handshake_timeout_ms {
            None => handshake.await,
            Some(ms) => match select(handshake, self.deps.sleeper.sleep(ms)).await {
                Either::Left((result, _)) => result,
                Either::Right(((), _)) => Err(HostError::Timeout(ms)),
            },
        }
    }

    /// Fans out one batch at a time and waits for the whole batch, so at most
    /// `batch_size` requests are outstanding.
    async fn prefetch(&self, step: &LoadingStep, paths: &[String], kind: AssetKind) {
        for batch in paths.chunks(self.config.batch_size.max(1)) {
            let results = join_all(batch.iter().map(|path| self.fetch(kind, path))).await;
            for (path, result) in batch.iter().zip(results) {
                if let Err(err) = result {
                    log::warn!("[{}] skipping {}: {}", step.id, path, err);
                    self.warnings.borrow_mut().push(AssetWarning {
                        step: step.id.clone(),
                        path: path.clone(),
                        reason: err.to_string(),
                    });
                }
            }
            self.emit_flavor(step);
        }
    }

    async fn fetch(&self, kind: AssetKind, path: &str) -> Result<(), AssetError> {
        match kind {
            AssetKind::Image => self.deps.store.fetch_image(path).await.map(drop),
            AssetKind::Audio => self.deps.store.fetch_audio(path).await.map(drop),
        }
    }

    fn emit_flavor(&self, step: &LoadingStep) {
        let messages = &self.config.flavor_messages;
        if messages.is_empty() {
            return;
        }
        let cursor = self.flavor_cursor.get();
        self.flavor_cursor.set(cursor + 1);
        let progress = self.progress.borrow().progress;
        self.emit_step(step, progress, &messages[cursor % messages.len()]);
    }

    fn emit_step(&self, step: &LoadingStep, progress: u8, message: &str) {
        self.emit(LoadingProgress {
            current_step: step.id.clone(),
            current_message: message.to_string(),
            progress,
            is_complete: false,
            error: None,
        });
    }

    fn emit(&self, update: LoadingProgress) {
        *self.progress.borrow_mut() = update.clone();
        // taken out while running so the callback may call back into us
        let callback = self.callback.borrow_mut().take();
        if let Some(mut callback) = callback {
            callback(&update);
            let mut slot = self.callback.borrow_mut();
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_rejects_empty_and_zero_weight() {
        assert_eq!(LoadingPlan::new(Vec::new()).unwrap_err(), PlanError::NoSteps);
        let steps = vec![
            LoadingStep::new("a", 1, "", StepTask::ValidateCatalog),
            LoadingStep::new("b", 0, "", StepTask::Pacing { duration_ms: 0 }),
        ];
        assert_eq!(
            LoadingPlan::new(steps).unwrap_err(),
            PlanError::ZeroWeight("b".to_string())
        );
    }

    #[test]
    fn standard_plan_order_and_weights() {
        let plan = LoadingPlan::standard(&GameConfig::default());
        let ids: Vec<&str> = plan.steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            ["init", "levels", "sprites", "background-images", "audio", "finalize"]
        );
        assert_eq!(plan.total_weight(), 100);
        assert!(plan.steps()[0].task.is_fatal());
        assert!(plan.steps()[1].task.is_fatal());
        assert!(plan.steps()[2..].iter().all(|s| !s.task.is_fatal()));
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(0, 3), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(3, 3), 100);
    }
}
