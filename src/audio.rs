use crate::browser;
use crate::config::AudioConfig;
use crate::engine;
use crate::host::AudioSettings;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlAudioElement;

pub trait AudioDevice {
    fn suspend_background_track(&self);
    fn resume_background_track(&self);
    fn play_one_shot(&self, event_id: &str);
}

/// Background music plus fire-and-forget effects on `<audio>` elements.
pub struct BrowserAudio {
    config: AudioConfig,
    settings: Cell<AudioSettings>,
    track: RefCell<Option<HtmlAudioElement>>,
    effects: RefCell<HashMap<String, HtmlAudioElement>>,
}

impl BrowserAudio {
    pub fn new(config: AudioConfig) -> Self {
        BrowserAudio {
            config,
            settings: Cell::new(AudioSettings::default()),
            track: RefCell::new(None),
            effects: RefCell::new(HashMap::new()),
        }
    }

    pub fn apply_settings(&self, settings: AudioSettings) {
        self.settings.set(settings);
        if let Some(track) = self.track.borrow().as_ref() {
            track.set_muted(settings.muted);
            track.set_volume(settings.music_volume);
        }
    }

    /// Loads the looping background track on first use and, with `autoplay`,
    /// starts it.
    pub async fn start_background_track(&self, autoplay: bool) {
        let existing = self.track.borrow().clone();
        let track = match existing {
            Some(track) => track,
            None => match engine::load_audio(&self.config.background_track).await {
                Ok(track) => {
                    track.set_loop(true);
                    *self.track.borrow_mut() = Some(track.clone());
                    track
                }
                Err(err) => {
                    log::warn!("background track unavailable: {:#}", err);
                    return;
                }
            },
        };
        self.apply_settings(self.settings.get());
        if autoplay {
            play(&track);
        }
    }
}

fn play(element: &HtmlAudioElement) {
    match element.play() {
        // autoplay rejections are expected until the first user gesture
        Ok(promise) => browser::spawn_local(async move {
            if let Err(err) = JsFuture::from(promise).await {
                log::debug!("playback rejected: {:?}", err);
            }
        }),
        Err(err) => log::warn!("play() threw: {:?}", err),
    }
}

impl AudioDevice for BrowserAudio {
    fn suspend_background_track(&self) {
        if let Some(track) = self.track.borrow().as_ref() {
            if let Err(err) = track.pause() {
                log::warn!("could not pause background track: {:?}", err);
            }
        }
    }

    fn resume_background_track(&self) {
        if let Some(track) = self.track.borrow().as_ref() {
            play(track);
        }
    }

    fn play_one_shot(&self, event_id: &str) {
        let settings = self.settings.get();
        if settings.muted {
            return;
        }
        let Some(path) = self.config.one_shots.get(event_id) else {
            log::warn!("no sound registered for '{}'", event_id);
            return;
        };
        let mut effects = self.effects.borrow_mut();
        let existing = effects.get(event_id).cloned();
        let element = match existing {
            Some(element) => element,
            None => match HtmlAudioElement::new_with_src(path) {
                Ok(element) => {
                    effects.insert(event_id.to_string(), element.clone());
                    element
                }
                Err(err) => {
                    log::warn!("could not create sound '{}': {:?}", event_id, err);
                    return;
                }
            },
        };
        element.set_volume(settings.sfx_volume);
        element.set_current_time(0.0);
        play(&element);
    }
}
