use super::rooms::TILE_SIZE;

const TARGET_TILES_X: f32 = 28.0;
const TARGET_TILES_Y: f32 = 16.0;
pub(crate) const MIN_ZOOM: u32 = 1;
pub(crate) const MAX_ZOOM: u32 = 4;
const FOLLOW_X: f32 = 0.5;
const FOLLOW_Y: f32 = 0.6;

/// Whole-pixel camera over room pixel space. `scroll` is the top-left corner
/// of the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PixelCamera {
    pub(crate) zoom: u32,
    pub(crate) scroll_x: f32,
    pub(crate) scroll_y: f32,
    window_width: u32,
    window_height: u32,
}

impl Default for PixelCamera {
    fn default() -> Self {
        Self {
            zoom: MIN_ZOOM,
            scroll_x: 0.0,
            scroll_y: 0.0,
            window_width: 0,
            window_height: 0,
        }
    }
}

/// Largest integer zoom that still shows the target tile count.
pub(crate) fn zoom_to_fit(window_width: u32, window_height: u32) -> u32 {
    let zoom_x = (window_width as f32 / (TARGET_TILES_X * TILE_SIZE)).floor() as u32;
    let zoom_y = (window_height as f32 / (TARGET_TILES_Y * TILE_SIZE)).floor() as u32;
    zoom_x.min(zoom_y).clamp(MIN_ZOOM, MAX_ZOOM)
}

impl PixelCamera {
    pub(crate) fn resize(&mut self, window_width: u32, window_height: u32) {
        if window_width == 0 || window_height == 0 {
            return;
        }
        self.window_width = window_width;
        self.window_height = window_height;
        self.zoom = zoom_to_fit(window_width, window_height);
    }

    pub(crate) fn view_size(&self) -> (f32, f32) {
        let zoom = self.zoom.max(MIN_ZOOM) as f32;
        (
            self.window_width as f32 / zoom,
            self.window_height as f32 / zoom,
        )
    }

    pub(crate) fn follow(&mut self, target_x: f32, target_y: f32, room_width: f32, room_height: f32) {
        let (view_w, view_h) = self.view_size();
        let desired_x = target_x - view_w * FOLLOW_X;
        let desired_y = target_y - view_h * FOLLOW_Y;
        self.scroll_x = desired_x.clamp(0.0, (room_width - view_w).max(0.0)).round();
        self.scroll_y = desired_y.clamp(0.0, (room_height - view_h).max(0.0)).round();
    }

    pub(crate) fn horizontal_view(&self) -> (f32, f32) {
        let (view_w, _) = self.view_size();
        (self.scroll_x, self.scroll_x + view_w)
    }

    pub(crate) fn view_center(&self) -> (f32, f32) {
        let (view_w, view_h) = self.view_size();
        (self.scroll_x + view_w / 2.0, self.scroll_y + view_h / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_fits_target_tiles_within_limits() {
        assert_eq!(zoom_to_fit(1280, 720), 2);
        assert_eq!(zoom_to_fit(300, 200), 1);
        assert_eq!(zoom_to_fit(4000, 3000), 4);
        assert_eq!(zoom_to_fit(1792, 1024), 4);
    }

    #[test]
    fn follow_clamps_to_room_and_rounds() {
        let mut camera = PixelCamera::default();
        camera.resize(1280, 720);
        assert_eq!(camera.view_size(), (640.0, 360.0));

        camera.follow(100.3, 100.0, 1024.0, 512.0);
        assert_eq!((camera.scroll_x, camera.scroll_y), (0.0, 0.0));

        camera.follow(500.3, 400.0, 1024.0, 512.0);
        assert_eq!(camera.scroll_x, 180.0);
        assert_eq!(camera.scroll_y, 152.0);

        camera.follow(1000.0, 500.0, 1024.0, 512.0);
        assert_eq!((camera.scroll_x, camera.scroll_y), (384.0, 152.0));
        assert_eq!(camera.horizontal_view(), (384.0, 1024.0));
    }

    #[test]
    fn small_room_pins_scroll_to_origin() {
        let mut camera = PixelCamera::default();
        camera.resize(1280, 720);
        camera.follow(200.0, 100.0, 320.0, 128.0);
        assert_eq!((camera.scroll_x, camera.scroll_y), (0.0, 0.0));
        assert_eq!(camera.view_center(), (320.0, 180.0));
    }
}
