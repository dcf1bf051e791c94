use std::collections::VecDeque;

/// Windowed mean of frame-to-frame vertical deltas (normalized units/frame).
///
/// Positive velocity means the joint is moving down the image.
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    deltas: VecDeque<f32>,
    window: usize,
    prev_y: Option<f32>,
}

impl VelocityTracker {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            deltas: VecDeque::with_capacity(window),
            window,
            prev_y: None,
        }
    }

    /// Feed the current position and return the smoothed velocity.
    pub fn update(&mut self, y: f32) -> f32 {
        if let Some(prev) = self.prev_y {
            self.deltas.push_back(y - prev);
            if self.deltas.len() > self.window {
                self.deltas.pop_front();
            }
        }
        self.prev_y = Some(y);
        self.average()
    }

    pub fn average(&self) -> f32 {
        if self.deltas.is_empty() {
            return 0.0;
        }
        self.deltas.iter().sum::<f32>() / self.deltas.len() as f32
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Drop the history but keep the last position, so the next frame
    /// still yields a delta.
    pub fn clear(&mut self) {
        self.deltas.clear();
    }

    pub fn reset(&mut self) {
        self.deltas.clear();
        self.prev_y = None;
    }
}
