/// Marks a record as a confirmed duplicate awaiting removal. Never handed out
/// by [`GameIdAllocator`].
pub const GAME_ID_SENTINEL: u32 = u32::MAX;

const FIRST_BOTTOM: u32 = 1;
const FIRST_TOP: u32 = GAME_ID_SENTINEL - 1;

/// Two ranges growing toward each other: games loaded from a database take
/// ids from the top, freshly imported games from the bottom. Id 0 is never
/// issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameIdAllocator {
    bottom: u32,
    top: u32,
}

impl Default for GameIdAllocator {
    fn default() -> Self {
        Self {
            bottom: FIRST_BOTTOM,
            top: FIRST_TOP,
        }
    }
}

impl GameIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    /// First id of a contiguous block of `count` ids at the top of the free
    /// space.
    pub fn allocate_top(&mut self, count: u32) -> u32 {
        match self.top.checked_sub(count) {
            Some(t) if t > self.bottom => self.top = t,
            _ => {
                self.reset();
                self.top = self.top.saturating_sub(count).max(FIRST_BOTTOM);
            }
        }
        self.top
    }

    /// First id of a contiguous block of `count` ids at the bottom.
    pub fn allocate_bottom(&mut self, count: u32) -> u32 {
        if self.bottom.saturating_add(count) >= self.top {
            self.reset();
        }
        let first = self.bottom;
        self.bottom += count;
        first
    }
}
