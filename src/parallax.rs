use crate::assets::AssetStore;
use crate::config::ParallaxConfig;
use crate::engine::{ImageSize, Point, Rect, Size, Surface};
use futures::future::join_all;
use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct ParallaxLayer<I> {
    pub index: u32,
    pub image: I,
    /// 0 for the backmost layer, `max_speed` for the frontmost.
    pub speed: f64,
    pub offset: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeLoad {
    Installed(usize),
    /// No layer exists for the theme; the renderer should use its placeholder.
    Empty,
    /// Another load was already running on this resolver.
    Ignored,
    /// Superseded while in flight; the result was thrown away.
    Discarded,
}

/// Evenly spread speeds over `count` layers ordered back to front.
pub fn layer_speeds(count: usize, max_speed: f64) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let last = (count - 1) as f64;
            (0..count)
                .map(|position| position as f64 / last * max_speed)
                .collect()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverFit {
    pub scale: f64,
    /// Top-left of the scaled image on the destination.
    pub origin: Point,
    /// Region of the source image that lands exactly on the destination.
    pub source: Rect,
}

/// Scales `image` uniformly to cover `destination` with no gaps, centres it,
/// then shifts it by `offset`.
pub fn cover_fit(image: Size, destination: Size, offset: Point) -> Option<CoverFit> {
    if image.width <= 0.0 || image.height <= 0.0 {
        return None;
    }
    if destination.width <= 0.0 || destination.height <= 0.0 {
        return None;
    }
    let scale = (destination.width / image.width).max(destination.height / image.height);
    let origin = Point {
        x: (destination.width - image.width * scale) / 2.0 + offset.x,
        y: (destination.height - image.height * scale) / 2.0 + offset.y,
    };
    let source = Rect::from_xywh(
        -origin.x / scale,
        -origin.y / scale,
        destination.width / scale,
        destination.height / scale,
    );
    Some(CoverFit {
        scale,
        origin,
        source,
    })
}

/// Discovers the background layers of a theme and positions them relative
/// to a moving reference point.
pub struct ParallaxLayerResolver<S: AssetStore> {
    store: Rc<S>,
    config: ParallaxConfig,
    layers: RefCell<Vec<ParallaxLayer<S::Image>>>,
    theme: RefCell<Option<String>>,
    generation: Cell<u64>,
    in_flight: Cell<bool>,
    canvas: Cell<Size>,
    reference: Cell<Option<Point>>,
}

impl<S: AssetStore> ParallaxLayerResolver<S> {
    pub fn new(store: Rc<S>, config: ParallaxConfig, canvas: Size) -> Self {
        ParallaxLayerResolver {
            store,
            config,
            layers: RefCell::new(Vec::new()),
            theme: RefCell::new(None),
            generation: Cell::new(0),
            in_flight: Cell::new(false),
            canvas: Cell::new(canvas),
            reference: Cell::new(None),
        }
    }

    /// Replaces the layer set with the layers found for `theme`.
    ///
    /// Ignored while another load is in flight. A load superseded by
    /// [`clear`](Self::clear) still runs its fetches but never installs them.
    pub async fn load_theme(&self, theme: &str) -> ThemeLoad {
        if self.in_flight.get() {
            log::debug!("theme '{}' requested while a load is in flight", theme);
            return ThemeLoad::Ignored;
        }
        self.in_flight.set(true);
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let layers = self.discover(theme).await;

        if self.generation.get() != generation {
            log::debug!("discarding stale layers for '{}'", theme);
            return ThemeLoad::Discarded;
        }
        self.in_flight.set(false);

        let count = layers.len();
        *self.layers.borrow_mut() = layers;
        if count == 0 {
            log::warn!("theme '{}' has no background layers", theme);
            *self.theme.borrow_mut() = None;
            return ThemeLoad::Empty;
        }
        log::info!("theme '{}' resolved to {} layer(s)", theme, count);
        *self.theme.borrow_mut() = Some(theme.to_string());
        if let Some(reference) = self.reference.get() {
            self.update(reference);
        }
        ThemeLoad::Installed(count)
    }

    async fn discover(&self, theme: &str) -> Vec<ParallaxLayer<S::Image>> {
        let indices: Vec<u32> = (1..=self.config.max_layers).collect();
        let probes = join_all(indices.iter().map(|&index| {
            let path = self.config.layer_path(theme, index);
            async move { self.store.probe_exists(&path).await }
        }))
        .await;

        let existing = indices
            .into_iter()
            .zip(probes)
            .filter_map(|(index, exists)| exists.then_some(index));
        let fetched = join_all(existing.map(|index| {
            let path = self.config.layer_path(theme, index);
            async move { (index, path.clone(), self.store.fetch_image(&path).await) }
        }))
        .await;

        let mut found: Vec<(u32, S::Image)> = fetched
            .into_iter()
            .filter_map(|(index, path, result)| match result {
                Ok(image) => Some((index, image)),
                Err(err) => {
                    log::warn!("layer {} probed but failed to load: {}", path, err);
                    None
                }
            })
            .collect();
        found.sort_by_key(|(index, _)| *index);

        let speeds = layer_speeds(found.len(), self.config.max_speed);
        found
            .into_iter()
            .zip(speeds)
            .map(|((index, image), speed)| ParallaxLayer {
                index,
                image,
                speed,
                offset: Point::default(),
            })
            .collect()
    }

    /// Drops the layers and invalidates any load still in flight.
    pub fn clear(&self) {
        self.generation.set(self.generation.get() + 1);
        self.in_flight.set(false);
        self.layers.borrow_mut().clear();
        *self.theme.borrow_mut() = None;
    }

    pub fn resize(&self, canvas: Size) {
        self.canvas.set(canvas);
        if let Some(reference) = self.reference.get() {
            self.update(reference);
        }
    }

    /// Horizontal offsets follow the reference's distance from the canvas
    /// centre; vertical ones are damped.
    pub fn update(&self, reference: Point) {
        self.reference.set(Some(reference));
        let canvas = self.canvas.get();
        let delta = Point {
            x: reference.x - canvas.width / 2.0,
            y: reference.y - canvas.height / 2.0,
        };
        for layer in self.layers.borrow_mut().iter_mut() {
            layer.offset = Point {
                x: -delta.x * layer.speed,
                y: -delta.y * layer.speed * self.config.vertical_damping,
            };
        }
    }

    /// Back to front.
    pub fn render<T: Surface<Image = S::Image>>(&self, surface: &T) {
        let canvas = self.canvas.get();
        let destination = Rect::new(Point::default(), canvas);
        for layer in self.layers.borrow().iter() {
            if let Some(fit) = cover_fit(layer.image.size(), canvas, layer.offset) {
                surface.draw_image(&layer.image, &fit.source, &destination);
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.layers.borrow().is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.get()
    }

    pub fn current_theme(&self) -> Option<String> {
        self.theme.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub fn layers(&self) -> Ref<'_, Vec<ParallaxLayer<S::Image>>> {
        self.layers.borrow()
    }
}
