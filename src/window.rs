//! Bounded, order-preserving rolling window.
//!
//! Used for the bar window (capacity 100 by default) and for retained
//! signal history. Oldest entries are evicted first once capacity is
//! exceeded; insertion order is never re-sorted.

use std::collections::VecDeque;

use crate::models::Bar;
use crate::{CandlewickError, Result};

/// Default number of bars retained.
pub const DEFAULT_BAR_CAPACITY: usize = 100;

/// FIFO buffer holding at most `capacity` items.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    /// Creates an empty window. A zero capacity is bumped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an item, evicting the oldest while over capacity.
    ///
    /// Returns the evicted item, if any.
    pub fn append(&mut self, item: T) -> Option<T> {
        self.items.push_back(item);
        if self.items.len() > self.capacity {
            self.items.pop_front()
        } else {
            None
        }
    }

    /// Most recently appended item.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Item appended just before [`latest`](Self::latest).
    pub fn previous(&self) -> Option<&T> {
        let len = self.items.len();
        if len < 2 {
            return None;
        }
        self.items.get(len - 2)
    }

    /// The last `n` items, oldest first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl RollingWindow<Bar> {
    /// Appends a bar after checking that its open time advances the window.
    ///
    /// # Errors
    ///
    /// Returns [`CandlewickError::OutOfOrderBar`] if `bar.open_time` is not
    /// strictly greater than the latest bar's.
    pub fn push_bar(&mut self, bar: Bar) -> Result<()> {
        if let Some(latest) = self.latest() {
            if bar.open_time <= latest.open_time {
                return Err(CandlewickError::OutOfOrderBar {
                    open_time: bar.open_time,
                    latest: latest.open_time,
                });
            }
        }
        self.append(bar);
        Ok(())
    }

    /// Closing prices of the last `n` bars, oldest first.
    pub fn closes(&self, n: usize) -> Vec<f64> {
        self.last_n(n).map(|bar| bar.close).collect()
    }
}
