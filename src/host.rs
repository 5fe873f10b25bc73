//! What a World needs from the application embedding it.

use crate::error::Result;
use crate::World;
use macroquad::prelude::*;
use serde_json::Value;

/// The embedding application: clock, matrices and a script runner.
///
/// Callbacks get the World back mutably, so a script may create or remove
/// sprites and change animations while events are being dispatched.
/// Removals made there take effect once every event of the frame has run.
pub trait Host {
    /// Duration of the frame being simulated.
    fn frame_duration_ms(&self) -> f32;

    fn model_view(&self) -> Mat4 {
        Mat4::IDENTITY
    }

    /// Projection for the 2D view.
    fn projection(&self) -> Mat4;

    /// Window width over height, for the first-person view.
    fn aspect(&self) -> f32;

    /// Runs the script callback `callback` with `args`. Errors are logged by
    /// the World and do not stop the frame.
    fn invoke(&mut self, world: &mut World, callback: &str, args: &[Value]) -> anyhow::Result<()>;
}

/// A graphics object as the host's registry sees it. Deletion is `Drop`.
pub trait GraphicsObject {
    /// Advances one frame and dispatches this frame's callbacks.
    fn update(&mut self, host: &mut dyn Host) -> Result<()>;

    fn draw(&mut self, host: &dyn Host) -> Result<()>;

    fn reset(&mut self);
}

/// A host with a fixed clock and no scripts; callbacks are recorded.
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    pub frame_ms: f32,
    pub aspect: f32,
    /// Every invocation as `(callback, args)`.
    pub calls: Vec<(String, Vec<Value>)>,
}

impl HeadlessHost {
    pub fn new(frame_ms: f32) -> Self {
        HeadlessHost {
            frame_ms,
            aspect: 16.0 / 9.0,
            calls: Vec::new(),
        }
    }
}

impl Host for HeadlessHost {
    fn frame_duration_ms(&self) -> f32 {
        self.frame_ms
    }

    fn projection(&self) -> Mat4 {
        Mat4::orthographic_rh_gl(-10.0 * self.aspect, 10.0 * self.aspect, -10.0, 10.0, -1.0, 1.0)
    }

    fn aspect(&self) -> f32 {
        self.aspect
    }

    fn invoke(&mut self, _world: &mut World, callback: &str, args: &[Value]) -> anyhow::Result<()> {
        self.calls.push((callback.to_owned(), args.to_vec()));
        Ok(())
    }
}
