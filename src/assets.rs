//! Asset access as an explicit capability.
//!
//! The loading pipeline and the parallax resolver only ever see
//! [`AssetStore`], so neither depends on how images are decoded or where they
//! come from.

use crate::engine::{self, ImageSize};
use crate::error::AssetError;
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::HashMap;
use web_sys::{HtmlAudioElement, HtmlImageElement};

#[async_trait(?Send)]
pub trait AssetStore {
    type Image: ImageSize;
    type Audio;

    /// Never fails; a missing or broken asset is simply `false`.
    async fn probe_exists(&self, path: &str) -> bool;
    async fn fetch_image(&self, path: &str) -> Result<Self::Image, AssetError>;
    async fn fetch_audio(&self, path: &str) -> Result<Self::Audio, AssetError>;
}

/// Fetches through `<img>`/`<audio>` elements and keeps every decoded element,
/// so a probe or a prefetch makes the later fetch of the same path free.
/// Failures are not remembered; the next request for the path tries again.
#[derive(Default)]
pub struct BrowserAssetStore {
    images: RefCell<HashMap<String, HtmlImageElement>>,
    audio: RefCell<HashMap<String, HtmlAudioElement>>,
}

impl BrowserAssetStore {
    pub fn new() -> Self {
        BrowserAssetStore::default()
    }
}

#[async_trait(?Send)]
impl AssetStore for BrowserAssetStore {
    type Image = HtmlImageElement;
    type Audio = HtmlAudioElement;

    async fn probe_exists(&self, path: &str) -> bool {
        self.fetch_image(path).await.is_ok()
    }

    async fn fetch_image(&self, path: &str) -> Result<HtmlImageElement, AssetError> {
        if let Some(image) = self.images.borrow().get(path) {
            return Ok(image.clone());
        }
        match engine::load_image(path).await {
            Ok(image) => {
                self.images
                    .borrow_mut()
                    .insert(path.to_string(), image.clone());
                Ok(image)
            }
            Err(err) => Err(AssetError::LoadFailed {
                path: path.to_string(),
                reason: format!("{:#}", err),
            }),
        }
    }

    async fn fetch_audio(&self, path: &str) -> Result<HtmlAudioElement, AssetError> {
        if let Some(audio) = self.audio.borrow().get(path) {
            return Ok(audio.clone());
        }
        let audio = engine::load_audio(path)
            .await
            .map_err(|err| AssetError::LoadFailed {
                path: path.to_string(),
                reason: format!("{:#}", err),
            })?;
        self.audio
            .borrow_mut()
            .insert(path.to_string(), audio.clone());
        Ok(audio)
    }
}
