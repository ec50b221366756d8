/// Number of most recent elapsed times feeding the rolling average.
pub const WINDOW_CAPACITY: usize = 5;

/// Fixed-capacity ring buffer of elapsed cycle times.
///
/// `cursor` always points at the slot the next push overwrites, which is
/// also the oldest value once the buffer is full.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollingWindow {
    slots: [f64; WINDOW_CAPACITY],
    cursor: usize,
    len: usize,
}

impl RollingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a window from values in chronological order, keeping the last
    /// `WINDOW_CAPACITY` of them.
    pub fn from_recent<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut window = Self::new();
        for value in values {
            window.push(value);
        }
        window
    }

    pub fn push(&mut self, value: f64) {
        self.slots[self.cursor] = value;
        self.cursor = (self.cursor + 1) % WINDOW_CAPACITY;
        if self.len < WINDOW_CAPACITY {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Arithmetic mean of the values held, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        let sum: f64 = self.iter().sum();
        Some(sum / self.len as f64)
    }

    /// Values oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let start = (self.cursor + WINDOW_CAPACITY - self.len) % WINDOW_CAPACITY;
        (0..self.len).map(move |offset| self.slots[(start + offset) % WINDOW_CAPACITY])
    }
}
