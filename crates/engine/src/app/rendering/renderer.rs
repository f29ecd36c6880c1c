use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::{Camera2D, RenderableKind, SceneWorld, Tilemap, Vec2};

use super::transform::camera_pixels_per_world;
use super::{world_to_screen_px, Viewport, PIXELS_PER_WORLD, PLACEHOLDER_HALF_SIZE_PX};

const CLEAR_COLOR: [u8; 4] = [14, 16, 24, 255];
const PLACEHOLDER_COLOR: [u8; 4] = [220, 220, 240, 255];
const SOLID_TILE_COLOR: [u8; 4] = [58, 66, 84, 255];
const SOLID_TILE_EDGE_COLOR: [u8; 4] = [86, 98, 122, 255];
const FADE_COLOR: [u8; 3] = [0, 0, 0];
const VIEW_CULL_PADDING_PX: f32 = 16.0;

#[derive(Debug, Clone, Copy)]
struct WorldBounds {
    min_x: f32,
    max_x: f32,
    min_y: f32,
    max_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TileRectInclusive {
    x_min: u32,
    x_max: u32,
    y_min: u32,
    y_max: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScreenRectPx {
    left: i32,
    right: i32,
    top: i32,
    bottom: i32,
}

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub(crate) fn render_world(&mut self, world: &SceneWorld) -> Result<(), Error> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Ok(());
        }

        let (width, height) = (self.viewport.width, self.viewport.height);
        let frame = self.pixels.frame_mut();
        for chunk in frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&CLEAR_COLOR);
        }

        let view_bounds = view_bounds_world(world.camera(), (width, height), VIEW_CULL_PADDING_PX);
        draw_tilemap(frame, width, height, world, &view_bounds);

        let pixels_per_world = camera_pixels_per_world(world.camera());
        for entity in world.entities() {
            if entity.alpha <= 0.0 {
                continue;
            }
            let (cx, cy) =
                world_to_screen_px(world.camera(), (width, height), entity.transform.position);
            let (rect, color) = match entity.renderable.kind {
                RenderableKind::Placeholder => (
                    screen_rect_from_center(cx, cy, PLACEHOLDER_HALF_SIZE_PX, PLACEHOLDER_HALF_SIZE_PX),
                    PLACEHOLDER_COLOR,
                ),
                RenderableKind::Rect {
                    half_extents,
                    color,
                } => (
                    screen_rect_from_center(
                        cx,
                        cy,
                        half_extent_px(half_extents.x, pixels_per_world),
                        half_extent_px(half_extents.y, pixels_per_world),
                    ),
                    color,
                ),
            };
            fill_rect_blended(frame, width, height, rect, color, entity.alpha);
        }

        let fade = world.fade_level();
        if fade > 0.0 {
            let full = ScreenRectPx {
                left: 0,
                right: width as i32 - 1,
                top: 0,
                bottom: height as i32 - 1,
            };
            let [r, g, b] = FADE_COLOR;
            fill_rect_blended(frame, width, height, full, [r, g, b, 255], fade);
        }

        self.pixels.render()
    }
}

fn half_extent_px(half_world: f32, pixels_per_world: f32) -> i32 {
    ((half_world * pixels_per_world).round() as i32).max(1)
}

fn draw_tilemap(frame: &mut [u8], width: u32, height: u32, world: &SceneWorld, bounds: &WorldBounds) {
    let Some(tilemap) = world.tilemap() else {
        return;
    };
    let Some(visible_rect) = visible_tile_rect(tilemap, bounds) else {
        return;
    };
    let half_tile_px = half_extent_px(0.5, camera_pixels_per_world(world.camera()));

    for y in visible_rect.y_min..=visible_rect.y_max {
        for x in visible_rect.x_min..=visible_rect.x_max {
            if tilemap.tile_at(x, y).unwrap_or(0) == 0 {
                continue;
            }
            let Some(center_world) = tilemap.tile_center_world(x, y) else {
                continue;
            };
            let (cx, cy) = world_to_screen_px(world.camera(), (width, height), center_world);
            let rect = screen_rect_from_center(cx, cy, half_tile_px, half_tile_px);
            fill_rect_blended(frame, width, height, rect, SOLID_TILE_EDGE_COLOR, 1.0);
            let inner = ScreenRectPx {
                left: rect.left + 1,
                right: rect.right - 1,
                top: rect.top + 1,
                bottom: rect.bottom - 1,
            };
            fill_rect_blended(frame, width, height, inner, SOLID_TILE_COLOR, 1.0);
        }
    }
}

fn view_bounds_world(camera: &Camera2D, window_size: (u32, u32), padding_px: f32) -> WorldBounds {
    let pixels_per_world = camera_pixels_per_world(camera);
    let safe_pixels_per_world = if pixels_per_world.is_finite() && pixels_per_world > f32::EPSILON {
        pixels_per_world
    } else {
        PIXELS_PER_WORLD
    };
    let half_w_world = window_size.0 as f32 / (2.0 * safe_pixels_per_world);
    let half_h_world = window_size.1 as f32 / (2.0 * safe_pixels_per_world);
    let padding_world = (padding_px.max(0.0) / safe_pixels_per_world).max(0.0);

    WorldBounds {
        min_x: camera.position.x - half_w_world - padding_world,
        max_x: camera.position.x + half_w_world + padding_world,
        min_y: camera.position.y - half_h_world - padding_world,
        max_y: camera.position.y + half_h_world + padding_world,
    }
}

fn visible_tile_rect(tilemap: &Tilemap, bounds: &WorldBounds) -> Option<TileRectInclusive> {
    if tilemap.width() == 0 || tilemap.height() == 0 {
        return None;
    }

    let origin: Vec2 = tilemap.origin();
    let x_min = ((bounds.min_x - origin.x).floor() as i32).max(0);
    let x_max = ((bounds.max_x - origin.x).ceil() as i32 - 1).min(tilemap.width() as i32 - 1);
    let y_min = ((bounds.min_y - origin.y).floor() as i32).max(0);
    let y_max = ((bounds.max_y - origin.y).ceil() as i32 - 1).min(tilemap.height() as i32 - 1);

    if x_min > x_max || y_min > y_max {
        return None;
    }

    Some(TileRectInclusive {
        x_min: x_min as u32,
        x_max: x_max as u32,
        y_min: y_min as u32,
        y_max: y_max as u32,
    })
}

fn screen_rect_from_center(cx: i32, cy: i32, half_w: i32, half_h: i32) -> ScreenRectPx {
    ScreenRectPx {
        left: cx - half_w,
        right: cx + half_w - 1,
        top: cy - half_h,
        bottom: cy + half_h - 1,
    }
}

fn fill_rect_blended(
    frame: &mut [u8],
    width: u32,
    height: u32,
    rect: ScreenRectPx,
    color: [u8; 4],
    alpha: f32,
) {
    let alpha = alpha.clamp(0.0, 1.0) * (color[3] as f32 / 255.0);
    if alpha <= 0.0 {
        return;
    }
    let left = rect.left.max(0);
    let top = rect.top.max(0);
    let right = rect.right.min(width as i32 - 1);
    let bottom = rect.bottom.min(height as i32 - 1);
    if left > right || top > bottom {
        return;
    }

    for y in top..=bottom {
        for x in left..=right {
            let offset = (y as usize * width as usize + x as usize) * 4;
            let Some(pixel) = frame.get_mut(offset..offset + 4) else {
                continue;
            };
            for channel in 0..3 {
                let dst = pixel[channel] as f32;
                let src = color[channel] as f32;
                pixel[channel] = (dst + (src - dst) * alpha).round() as u8;
            }
            pixel[3] = 255;
        }
    }
}
