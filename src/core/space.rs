use crate::utils::math::Pos2;

// -----------------------------------------------------------------------------
// osu! playfield design space
// -----------------------------------------------------------------------------
pub const PLAYFIELD_WIDTH: f64 = 512.0;
pub const PLAYFIELD_HEIGHT: f64 = 384.0;
pub const PLAYFIELD_CENTER: Pos2 = Pos2::new(256.0, 192.0);

/// Fraction of the screen height the game uses for the playfield.
const PLAYFIELD_HEIGHT_RATIO: f64 = 0.8;

// -----------------------------------------------------------------------------
// Playfield → screen mapping (4:3 playfield centred on the screen)
// -----------------------------------------------------------------------------
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Playfield {
    pub width: f64,
    pub height: f64,
    pub x_offset: f64,
    pub y_offset: f64,
}

impl Playfield {
    pub fn for_screen(screen_w: u32, screen_h: u32) -> Self {
        let height = screen_h as f64 * PLAYFIELD_HEIGHT_RATIO;
        let width = height * 4.0 / 3.0;
        Self {
            width,
            height,
            x_offset: (screen_w as f64 - width) / 2.0,
            y_offset: (screen_h as f64 - height) / 2.0,
        }
    }

    /// Screen pixels per osu! pixel.
    #[inline(always)]
    pub fn scale(&self) -> f64 {
        self.height / PLAYFIELD_HEIGHT
    }

    /// Truncates to whole screen pixels.
    #[inline(always)]
    pub fn to_screen(&self, osu_x: f64, osu_y: f64) -> (i32, i32) {
        let sx = (osu_x / PLAYFIELD_WIDTH) * self.width + self.x_offset;
        let sy = (osu_y / PLAYFIELD_HEIGHT) * self.height + self.y_offset;
        (sx as i32, sy as i32)
    }

    #[inline(always)]
    pub fn to_screen_pos(&self, osu: Pos2) -> Pos2 {
        Pos2::from(self.to_screen(osu.x, osu.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playfield_is_centred_four_by_three() {
        let pf = Playfield::for_screen(1920, 1080);
        assert!((pf.height - 864.0).abs() < 1e-9);
        assert!((pf.width - 1152.0).abs() < 1e-9);
        assert_eq!(pf.to_screen(0.0, 0.0), (384, 108));
        assert_eq!(pf.to_screen(512.0, 384.0), (1536, 972));
        assert_eq!(pf.to_screen(256.0, 192.0), (960, 540));
    }

    #[test]
    fn scale_matches_height_ratio() {
        let pf = Playfield::for_screen(1280, 960);
        assert!((pf.scale() - 2.0).abs() < 1e-9);
    }
}
