// ==================== Imports ====================
use crate::assets::BrowserAssetStore;
use crate::audio::{AudioDevice, BrowserAudio};
use crate::catalog::Catalog;
use crate::config::GameConfig;
use crate::engine::{Game, GameLoop, Point, Renderer, Size};
use crate::game::{Outcome, Session};
use crate::host::PostMessageChannel;
use crate::loading::Collaborators;
use crate::parallax::ThemeLoad;
use crate::pause::reason;
use crate::time::{PerformanceClock, TimeoutSleeper};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::future_to_promise;

pub mod assets;
pub mod audio;
pub mod browser;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod game;
pub mod host;
pub mod loading;
pub mod parallax;
pub mod pause;
pub mod time;

// ==================== Main Functions ====================
/// Main entry for the WebAssembly module
/// - better panic messages
/// - `log` records routed to the browser console
#[wasm_bindgen(start)]
pub fn main_js() {
    console_error_panic_hook::set_once();
    if let Err(err) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&format!("logger unavailable: {}", err).into());
    }
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

type SharedLoop = Rc<RefCell<Option<GameLoop>>>;

/// The element the host page drives. One instance is one play session.
#[wasm_bindgen]
pub struct Platformer {
    session: Rc<Session<BrowserAssetStore>>,
    audio: Rc<BrowserAudio>,
    game_loop: SharedLoop,
    starting: Rc<Cell<bool>>,
    visibility: RefCell<Option<Closure<dyn FnMut()>>>,
}

#[wasm_bindgen]
impl Platformer {
    /// `config` may be `undefined` for the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Platformer, JsValue> {
        let config = if config.is_undefined() || config.is_null() {
            GameConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|err| to_js(format!("invalid config: {}", err)))?
        };
        Platformer::from_config(config).map_err(|err| to_js(format!("{:#}", err)))
    }

    #[wasm_bindgen(js_name = onProgress)]
    pub fn on_progress(&self, callback: js_sys::Function) {
        self.session.on_progress(move |progress| {
            let value = match serde_wasm_bindgen::to_value(progress) {
                Ok(value) => value,
                Err(err) => {
                    log::error!("could not serialise progress: {}", err);
                    return;
                }
            };
            if let Err(err) = callback.call1(&JsValue::NULL, &value) {
                log::warn!("progress callback threw: {:?}", err);
            }
        });
    }

    /// Resolves once loading is done and the game loop is running; rejects
    /// with the machine-readable error on a fatal loading failure.
    pub fn start(&self) -> js_sys::Promise {
        let session = self.session.clone();
        let audio = self.audio.clone();
        let game_loop = self.game_loop.clone();
        let starting = self.starting.clone();
        future_to_promise(async move {
            if starting.get() || game_loop.borrow().is_some() {
                return Ok(JsValue::UNDEFINED);
            }
            starting.set(true);
            let result = launch(session, audio, &game_loop).await;
            starting.set(false);
            result.map(|_| JsValue::UNDEFINED)
        })
    }

    pub fn pause(&self, reason: &str) {
        self.session.pause(reason, true);
    }

    /// Pause without touching the background track, e.g. for a countdown.
    #[wasm_bindgen(js_name = pauseSilently)]
    pub fn pause_silently(&self, reason: &str) {
        self.session.pause(reason, false);
    }

    pub fn resume(&self, reason: &str) {
        self.session.resume(reason);
    }

    #[wasm_bindgen(js_name = isPaused)]
    pub fn is_paused(&self) -> bool {
        self.session.is_paused()
    }

    #[wasm_bindgen(js_name = pauseReasons)]
    pub fn pause_reasons(&self) -> Vec<String> {
        self.session.pause_reasons()
    }

    #[wasm_bindgen(js_name = adjustedTime)]
    pub fn adjusted_time(&self) -> f64 {
        self.session.adjusted_time()
    }

    #[wasm_bindgen(js_name = setReference)]
    pub fn set_reference(&self, x: f64, y: f64) {
        self.session.set_reference(Point { x, y });
    }

    pub fn resize(&self, width: f64, height: f64) {
        self.session.resize(Size { width, height });
    }

    /// Resolves to whether the level's backgrounds are ready to draw.
    #[wasm_bindgen(js_name = selectLevel)]
    pub fn select_level(&self, index: usize) -> js_sys::Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            match session.select_level(index).await {
                Some(ThemeLoad::Installed(_)) => Ok(JsValue::TRUE),
                Some(_) => Ok(JsValue::FALSE),
                None => Err(to_js(format!("no level at index {}", index))),
            }
        })
    }

    #[wasm_bindgen(js_name = isReady)]
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    #[wasm_bindgen(js_name = currentTheme)]
    pub fn current_theme(&self) -> Option<String> {
        self.session.current_theme()
    }

    #[wasm_bindgen(js_name = finishLevel)]
    pub fn finish_level(&self, victory: bool) {
        let outcome = if victory {
            Outcome::Victory
        } else {
            Outcome::Defeat
        };
        self.session.finish_level(outcome);
    }

    #[wasm_bindgen(js_name = dismissResult)]
    pub fn dismiss_result(&self) {
        self.session.dismiss_result();
    }

    pub fn restart(&self) {
        self.session.restart();
    }

    pub fn dispose(&self) {
        if let Some(running) = self.game_loop.borrow_mut().take() {
            running.stop();
        }
        if let Some(listener) = self.visibility.borrow_mut().take() {
            if let Err(err) = browser::remove_visibility_listener(&listener) {
                log::warn!("{:#}", err);
            }
        }
        self.session.teardown();
        self.audio.suspend_background_track();
    }
}

async fn launch(
    session: Rc<Session<BrowserAssetStore>>,
    audio: Rc<BrowserAudio>,
    game_loop: &SharedLoop,
) -> Result<(), JsValue> {
    session.start().await.map_err(to_js)?;
    if browser::is_document_hidden() {
        session.pause(reason::HIDDEN, true);
    }
    if let Some(settings) = session.audio_settings() {
        audio.apply_settings(settings);
    }
    // while paused the track is only loaded; resuming plays it
    audio.start_background_track(!session.is_paused()).await;

    let context = browser::context().map_err(|err| to_js(format!("{:#}", err)))?;
    let game: Rc<dyn Game> = session;
    let running =
        GameLoop::start(game, Renderer::new(context)).map_err(|err| to_js(format!("{:#}", err)))?;
    let previous = game_loop.borrow_mut().replace(running);
    if let Some(previous) = previous {
        previous.stop();
    }
    Ok(())
}

impl Platformer {
    fn from_config(config: GameConfig) -> anyhow::Result<Platformer> {
        let canvas = browser::canvas()?;
        let canvas_size = Size {
            width: canvas.width() as f64,
            height: canvas.height() as f64,
        };
        let audio = Rc::new(BrowserAudio::new(config.audio.clone()));
        let device: Rc<dyn AudioDevice> = audio.clone();
        let deps = Collaborators {
            store: Rc::new(BrowserAssetStore::new()),
            host: Rc::new(PostMessageChannel),
            sleeper: Rc::new(TimeoutSleeper),
            catalog: Rc::new(Catalog::new(config.levels.clone())),
        };
        let session = Rc::new(Session::new(
            &config,
            deps,
            Rc::new(PerformanceClock::new()?),
            device,
            canvas_size,
        ));

        let watched = session.clone();
        let visibility = browser::on_visibility_change(move || {
            if browser::is_document_hidden() {
                watched.pause(reason::HIDDEN, true);
            } else {
                watched.resume(reason::HIDDEN);
            }
        })
        .map_err(|err| log::warn!("tab visibility will not pause the game: {:#}", err))
        .ok();

        Ok(Platformer {
            session,
            audio,
            game_loop: Rc::new(RefCell::new(None)),
            starting: Rc::new(Cell::new(false)),
            visibility: RefCell::new(visibility),
        })
    }
}

/// Builds a [`Platformer`] from a JSON config served at `url`.
#[wasm_bindgen(js_name = createFromUrl)]
pub async fn create_from_url(url: String) -> Result<Platformer, JsValue> {
    let config: GameConfig = browser::fetch_json(&url)
        .await
        .map_err(|err| to_js(format!("{:#}", err)))?;
    Platformer::from_config(config).map_err(|err| to_js(format!("{:#}", err)))
}
