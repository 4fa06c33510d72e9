use anyhow::{anyhow, Result};
use futures::channel::oneshot::channel;
use serde::de::DeserializeOwned;
use std::future::Future;
use wasm_bindgen::closure::{Closure, WasmClosureFnOnce};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

#[rustfmt::skip]
use web_sys::{
    CanvasRenderingContext2d,
    Document,
    HtmlAudioElement,
    HtmlCanvasElement,
    HtmlImageElement,
    Performance,
    Response,
    Window,
};

// ==================== Constants ====================
// Constants related to HTML elements
mod html {
    pub const CANVAS_ID: &str = "canvas";
    pub const CONTEXT_2D: &str = "2d";
    pub const VISIBILITY_CHANGE: &str = "visibilitychange";
}

pub type LoopClosure = Closure<dyn FnMut(f64)>;

pub fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| anyhow!("Window not found"))
}

pub fn document() -> Result<Document> {
    window()?
        .document()
        .ok_or_else(|| anyhow!("No Document Found"))
}

pub fn canvas() -> Result<HtmlCanvasElement> {
    document()?
        .get_element_by_id(html::CANVAS_ID)
        .ok_or_else(|| anyhow!("No Canvas Element found with ID : '{}'", html::CANVAS_ID))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|element| anyhow!("Error converting {:#?} to HtmlCanvasElement", element))
}

pub fn context() -> Result<CanvasRenderingContext2d> {
    canvas()?
        .get_context(html::CONTEXT_2D)
        // Result<Option<Object>, JsValue>: map the JsValue error, then the None case
        .map_err(|js_value| anyhow!("Error getting context : {:#?}", js_value))?
        .ok_or_else(|| anyhow!("No 2d context found"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|element| {
            anyhow!(
                "Error converting {:#?} to CanvasRenderingContext2d",
                element
            )
        })
}

pub fn performance() -> Result<Performance> {
    window()?
        .performance()
        .ok_or_else(|| anyhow!("Performance object not found"))
}

pub fn new_image() -> Result<HtmlImageElement> {
    HtmlImageElement::new().map_err(|err| anyhow!("Could not create image element : {:#?}", err))
}

pub fn new_audio() -> Result<HtmlAudioElement> {
    HtmlAudioElement::new().map_err(|err| anyhow!("Could not create audio element : {:#?}", err))
}

pub fn closure_once<F, A, R>(f: F) -> Closure<F::FnMut>
where
    F: 'static + WasmClosureFnOnce<A, R>,
{
    Closure::once(f)
}

pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

/// Resolves after `ms` milliseconds on the browser event loop.
pub async fn timeout(ms: u32) -> Result<()> {
    let (tx, rx) = channel::<()>();
    let callback = closure_once(move || {
        let _ = tx.send(());
    });
    window()?
        .set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            i32::try_from(ms).unwrap_or(i32::MAX),
        )
        .map_err(|err| anyhow!("Could not schedule timeout : {:#?}", err))?;
    // callback must outlive the timer, so it is dropped only after rx settles
    rx.await
        .map_err(|_| anyhow!("Timeout callback was dropped"))?;
    drop(callback);
    Ok(())
}

pub fn create_raf_closure(f: impl FnMut(f64) + 'static) -> LoopClosure {
    Closure::wrap(Box::new(f) as Box<dyn FnMut(f64)>)
}

pub fn request_animation_frame(callback: &LoopClosure) -> Result<i32> {
    window()?
        .request_animation_frame(callback.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("Cannot request animation frame : {:#?}", err))
}

pub fn cancel_animation_frame(handle: i32) -> Result<()> {
    window()?
        .cancel_animation_frame(handle)
        .map_err(|err| anyhow!("Cannot cancel animation frame : {:#?}", err))
}

/// The page runs inside a host frame when `window.parent` is another window.
pub fn is_embedded() -> bool {
    match window() {
        Ok(window) => match window.parent() {
            Ok(Some(parent)) => !JsValue::from(parent).eq(&JsValue::from(window)),
            _ => false,
        },
        Err(_) => false,
    }
}

pub fn post_to_parent(message: &JsValue) -> Result<()> {
    window()?
        .parent()
        .map_err(|err| anyhow!("Cannot reach parent window : {:#?}", err))?
        .ok_or_else(|| anyhow!("No parent window"))?
        .post_message(message, "*")
        .map_err(|err| anyhow!("postMessage failed : {:#?}", err))
}

pub fn is_document_hidden() -> bool {
    document().map(|document| document.hidden()).unwrap_or(false)
}

/// Registers `f` for `visibilitychange`. The returned closure must be kept
/// alive for as long as the listener should fire.
pub fn on_visibility_change(f: impl FnMut() + 'static) -> Result<Closure<dyn FnMut()>> {
    let closure = Closure::wrap(Box::new(f) as Box<dyn FnMut()>);
    document()?
        .add_event_listener_with_callback(html::VISIBILITY_CHANGE, closure.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("Cannot listen for visibility changes : {:#?}", err))?;
    Ok(closure)
}

pub fn remove_visibility_listener(closure: &Closure<dyn FnMut()>) -> Result<()> {
    document()?
        .remove_event_listener_with_callback(
            html::VISIBILITY_CHANGE,
            closure.as_ref().unchecked_ref(),
        )
        .map_err(|err| anyhow!("Cannot remove visibility listener : {:#?}", err))
}

pub async fn fetch_json<T>(json_path: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let resp_value = fetch_with_str(json_path).await?;
    let resp: Response = resp_value
        .dyn_into()
        .map_err(|element| anyhow!("error converting [{:#?}] to Response", element))?;
    if !resp.ok() {
        return Err(anyhow!("fetching {} returned status {}", json_path, resp.status()));
    }
    let json = resp
        .json()
        .map_err(|err| anyhow!("Could not get JSON from response [{:#?}]", err))?;

    let json_value = JsFuture::from(json)
        .await
        .map_err(|err| anyhow!("error fetching [{:#?}]", err))?;

    serde_wasm_bindgen::from_value(json_value)
        .map_err(|err| anyhow!("error converting response : {:#?}", err))
}

async fn fetch_with_str(resource: &str) -> Result<JsValue> {
    let resp = window()?.fetch_with_str(resource);

    JsFuture::from(resp)
        .await
        .map_err(|err| anyhow!("error fetching : {:#?}", err))
}
