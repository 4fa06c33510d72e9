use crate::browser;
use anyhow::{anyhow, Error, Result};
// wasm is single threaded, so Rc<RefCell> instead of Arc<Mutex>
use futures::channel::oneshot::channel;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlAudioElement, HtmlImageElement};

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Rect {
    pub position: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(position: Point, size: Size) -> Self {
        Rect { position, size }
    }

    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            position: Point { x, y },
            size: Size { width, height },
        }
    }
}

/// Intrinsic pixel size of a decoded image.
pub trait ImageSize {
    fn size(&self) -> Size;
}

impl ImageSize for HtmlImageElement {
    fn size(&self) -> Size {
        Size {
            width: self.natural_width() as f64,
            height: self.natural_height() as f64,
        }
    }
}

/// Anything images can be blitted onto.
pub trait Surface {
    type Image;
    fn draw_image(&self, image: &Self::Image, source: &Rect, destination: &Rect);
}

pub struct Renderer {
    context: CanvasRenderingContext2d,
}

impl Renderer {
    pub fn new(context: CanvasRenderingContext2d) -> Self {
        Renderer { context }
    }

    pub fn canvas_size(&self) -> Size {
        self.context
            .canvas()
            .map(|canvas| Size {
                width: canvas.width() as f64,
                height: canvas.height() as f64,
            })
            .unwrap_or_default()
    }

    pub fn clear(&self, rect: &Rect) {
        self.context.clear_rect(
            rect.position.x,
            rect.position.y,
            rect.size.width,
            rect.size.height,
        );
    }
}

impl Surface for Renderer {
    type Image = HtmlImageElement;

    fn draw_image(&self, image: &HtmlImageElement, source: &Rect, destination: &Rect) {
        if let Err(err) = self
            .context
            .draw_image_with_html_image_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                image,
                source.position.x,
                source.position.y,
                source.size.width,
                source.size.height,
                destination.position.x,
                destination.position.y,
                destination.size.width,
                destination.size.height,
            )
        {
            log::error!("drawImage failed : {:#?}", err);
        }
    }
}

/// One frame of the host-driven loop.
pub trait Game {
    /// Fixed-step simulation tick. Not called while the game is paused.
    fn update(&self);
    fn draw(&self, renderer: &Renderer);
    fn is_paused(&self) -> bool;
}

// length of a frame in milliseconds
const FRAME_SIZE: f64 = 1.0 / 60.0 * 1000.0;

type SharedLoopClosure = Rc<RefCell<Option<browser::LoopClosure>>>;

/// Handle to a running loop. Stopping drops the frame closure, which in turn
/// drops the game it owns.
pub struct GameLoop {
    closure: SharedLoopClosure,
    handle: Rc<Cell<Option<i32>>>,
}

impl GameLoop {
    pub fn start(game: Rc<dyn Game>, renderer: Renderer) -> Result<GameLoop> {
        let mut last_frame = browser::performance()?.now();
        let mut accumulated_delta = 0.0;
        let handle = Rc::new(Cell::new(None));

        let f: SharedLoopClosure = Rc::new(RefCell::new(None));
        let g = f.clone();
        let next_handle = handle.clone();
        *g.borrow_mut() = Some(browser::create_raf_closure(move |perf: f64| {
            if game.is_paused() {
                // paused wall time must not turn into a burst of catch-up ticks
                accumulated_delta = 0.0;
            } else {
                accumulated_delta += perf - last_frame;
                while accumulated_delta > FRAME_SIZE {
                    game.update();
                    accumulated_delta -= FRAME_SIZE;
                }
            }
            last_frame = perf;
            game.draw(&renderer);
            if let Some(closure) = f.borrow().as_ref() {
                match browser::request_animation_frame(closure) {
                    Ok(id) => next_handle.set(Some(id)),
                    Err(err) => log::error!("game loop stopped: {:#}", err),
                }
            }
        }));

        let id = browser::request_animation_frame(
            g.borrow()
                .as_ref()
                .ok_or_else(|| anyhow!("GameLoop: Loop is None"))?,
        )?;
        handle.set(Some(id));

        Ok(GameLoop { closure: g, handle })
    }

    pub fn stop(&self) {
        if let Some(id) = self.handle.take() {
            if let Err(err) = browser::cancel_animation_frame(id) {
                log::warn!("{:#}", err);
            }
        }
        // breaks the closure's self reference so everything it owns is freed
        self.closure.borrow_mut().take();
    }
}

/// Asynchronously load an image from a given source path
/// # Returns
/// * `Ok(HtmlImageElement)` - on load success
/// * `Err` - on load fail
pub async fn load_image(source: &str) -> Result<HtmlImageElement> {
    let image = browser::new_image()?;
    let (tx, rx) = channel::<Result<(), Error>>();
    let success_tx = Rc::new(RefCell::new(Some(tx)));
    let error_tx = success_tx.clone();

    let success_callback = browser::closure_once(move || {
        if let Some(tx) = success_tx.borrow_mut().take() {
            let _ = tx.send(Ok(()));
        }
    });

    let path = source.to_string();
    let error_callback = browser::closure_once(move |err: JsValue| {
        if let Some(tx) = error_tx.borrow_mut().take() {
            let _ = tx.send(Err(anyhow!("Error loading image {}: {:#?}", path, err)));
        }
    });

    image.set_onload(Some(success_callback.as_ref().unchecked_ref()));
    image.set_onerror(Some(error_callback.as_ref().unchecked_ref()));
    image.set_src(source);

    // Result<Result<(), Error>, oneshot::Canceled>: channel first, then load
    let result = rx.await;
    image.set_onload(None);
    image.set_onerror(None);
    result??;

    Ok(image)
}

/// Same handshake as [`load_image`], resolved on `canplaythrough`.
pub async fn load_audio(source: &str) -> Result<HtmlAudioElement> {
    let audio = browser::new_audio()?;
    let (tx, rx) = channel::<Result<(), Error>>();
    let ready_tx = Rc::new(RefCell::new(Some(tx)));
    let error_tx = ready_tx.clone();

    let ready_callback = browser::closure_once(move || {
        if let Some(tx) = ready_tx.borrow_mut().take() {
            let _ = tx.send(Ok(()));
        }
    });

    let path = source.to_string();
    let error_callback = browser::closure_once(move |err: JsValue| {
        if let Some(tx) = error_tx.borrow_mut().take() {
            let _ = tx.send(Err(anyhow!("Error loading audio {}: {:#?}", path, err)));
        }
    });

    audio.set_oncanplaythrough(Some(ready_callback.as_ref().unchecked_ref()));
    audio.set_onerror(Some(error_callback.as_ref().unchecked_ref()));
    audio.set_preload("auto");
    audio.set_src(source);

    let result = rx.await;
    audio.set_oncanplaythrough(None);
    audio.set_onerror(None);
    result??;

    Ok(audio)
}
