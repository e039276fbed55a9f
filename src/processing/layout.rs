/// Axis-aligned rectangle in window pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: [u32; 2]) -> Self {
        Self::new(0, 0, size[0], size[1])
    }

    /// Shrink by `margin` on every side.
    pub fn inset(&self, margin: u32) -> Self {
        Self::new(
            self.x + margin as i32,
            self.y + margin as i32,
            self.width.saturating_sub(2 * margin),
            self.height.saturating_sub(2 * margin),
        )
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }
}

pub fn resize_to_contain(
    canvas_w: u32,
    canvas_h: u32,
    src_w: u32,
    src_h: u32,
    max_dim: u32,
) -> (u32, u32) {
    let iw = src_w.max(1) as f32;
    let ih = src_h.max(1) as f32;
    let cw = canvas_w.max(1) as f32;
    let ch = canvas_h.max(1) as f32;
    let scale = (cw / iw).min(ch / ih).max(0.0);
    let scale = if scale.is_finite() { scale } else { 1.0 };
    let w = (iw * scale).round().clamp(1.0, max_dim as f32);
    let h = (ih * scale).round().clamp(1.0, max_dim as f32);
    (w as u32, h as u32)
}

pub fn center_offset(inner_w: u32, inner_h: u32, outer_w: u32, outer_h: u32) -> (u32, u32) {
    let ox = outer_w.saturating_sub(inner_w) / 2;
    let oy = outer_h.saturating_sub(inner_h) / 2;
    (ox, oy)
}

/// Largest rectangle with the sensor aspect ratio that fits inside `window`
/// minus `border` on every side, centred and shifted by `y_offset`.
pub fn preview_area(window: Rect, resolution: [u32; 2], border: u32, y_offset: i32) -> Rect {
    let avail_w = window.width.saturating_sub(2 * border);
    let avail_h = window.height.saturating_sub(2 * border);
    let max_dim = avail_w.max(avail_h).max(1);
    let (w, h) = resize_to_contain(avail_w, avail_h, resolution[0], resolution[1], max_dim);
    let (cx, cy) = window.center();
    Rect::new(
        cx - (w / 2) as i32,
        cy - (h / 2) as i32 + y_offset,
        w,
        h,
    )
}
