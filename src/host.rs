use crate::browser;
use crate::error::HostError;
use async_trait::async_trait;
use futures::channel::oneshot::channel;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::MessageEvent;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioSettings {
    pub muted: bool,
    pub music_volume: f64,
    pub sfx_volume: f64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        AudioSettings {
            muted: false,
            music_volume: 0.7,
            sfx_volume: 1.0,
        }
    }
}

/// The page embedding the game.
#[async_trait(?Send)]
pub trait HostChannel {
    /// Resolves once with the host's audio preferences. There is no built-in
    /// timeout; the loading pipeline may race it against one.
    async fn await_initial_audio_settings(&self) -> Result<AudioSettings, HostError>;
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum HostMessage {
    RequestAudioSettings,
    AudioSettings { settings: AudioSettings },
}

mod event {
    pub const MESSAGE: &str = "message";
}

/// Talks to the parent frame over `postMessage`. When the game is not
/// embedded, the defaults are used straight away.
pub struct PostMessageChannel;

#[async_trait(?Send)]
impl HostChannel for PostMessageChannel {
    async fn await_initial_audio_settings(&self) -> Result<AudioSettings, HostError> {
        if !browser::is_embedded() {
            log::info!("not embedded, using default audio settings");
            return Ok(AudioSettings::default());
        }
        let window = browser::window().map_err(|err| HostError::Unavailable(format!("{:#}", err)))?;

        let (tx, rx) = channel::<AudioSettings>();
        let tx = Rc::new(RefCell::new(Some(tx)));
        let listener = Closure::wrap(Box::new(move |event: MessageEvent| {
            match serde_wasm_bindgen::from_value::<HostMessage>(event.data()) {
                Ok(HostMessage::AudioSettings { settings }) => {
                    if let Some(tx) = tx.borrow_mut().take() {
                        let _ = tx.send(settings);
                    }
                }
                Ok(other) => log::debug!("ignoring host message {:?}", other),
                Err(err) => log::debug!("ignoring unrecognised message: {}", err),
            }
        }) as Box<dyn FnMut(MessageEvent)>);

        window
            .add_event_listener_with_callback(event::MESSAGE, listener.as_ref().unchecked_ref())
            .map_err(|err| HostError::Unavailable(format!("{:#?}", err)))?;

        let request = serde_wasm_bindgen::to_value(&HostMessage::RequestAudioSettings)
            .map_err(|err| HostError::Malformed(err.to_string()))?;
        if let Err(err) = browser::post_to_parent(&request) {
            log::warn!("could not ask the host for audio settings: {:#}", err);
        }

        let settings = rx.await;
        let _ = window
            .remove_event_listener_with_callback(event::MESSAGE, listener.as_ref().unchecked_ref());
        settings.map_err(|_| HostError::Unavailable("message listener dropped".to_string()))
    }
}
