use parking_lot::Mutex;

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;

/// A type alias for the CHIP-8 display buffer representation
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];

/// 64x32 monochrome bitmap shared between the VM thread and the renderer.
///
/// Pixels are only ever toggled by sprite draws, except for [`FrameBuffer::clear`].
/// Each operation holds the lock for its whole duration, so readers never see
/// a half-drawn sprite.
pub struct FrameBuffer {
    pixels: Mutex<Display<bool>>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pixels: Mutex::new([[false; DISPLAY_X]; DISPLAY_Y]),
        }
    }

    pub fn clear(&self) {
        *self.pixels.lock() = [[false; DISPLAY_X]; DISPLAY_Y];
    }

    /// XORs `sprite` onto the display with its top-left corner at (`x`, `y`).
    ///
    /// The origin wraps around the screen, the sprite body is clipped at the
    /// right and bottom edges. Returns true if any pixel was switched off.
    pub fn draw_sprite(&self, sprite: &[u8], x: u8, y: u8) -> bool {
        let x_pos = x as usize % DISPLAY_X;
        let y_pos = y as usize % DISPLAY_Y;

        // Don't draw out of bounds
        let row_count = std::cmp::min(sprite.len(), DISPLAY_Y - y_pos);
        let col_count = std::cmp::min(8, DISPLAY_X - x_pos);

        let mut pixels = self.pixels.lock();
        let mut any_erased = false;
        for (row, &sprite_byte) in sprite.iter().take(row_count).enumerate() {
            for col in 0..col_count {
                if (sprite_byte & (0x80 >> col)) != 0 {
                    let pixel = &mut pixels[y_pos + row][x_pos + col];
                    *pixel ^= true;

                    if !*pixel {
                        any_erased = true;
                    }
                }
            }
        }

        any_erased
    }

    /// Independent copy of the current pixels.
    pub fn snapshot(&self) -> Display<bool> {
        *self.pixels.lock()
    }

    /// State of a single pixel (true = on).
    pub fn pixel(&self, y: usize, x: usize) -> bool {
        self.pixels.lock()[y % DISPLAY_Y][x % DISPLAY_X]
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
