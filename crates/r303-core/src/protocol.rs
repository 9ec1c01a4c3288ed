//! Out-of-band bootstrap payload handed from the control side to the render side.

use crate::ring::RingBuffer;
use std::fmt;
use std::sync::Arc;

/// Everything the render side needs to come up.
///
/// The segments are named by direction. The control side produces into
/// `to_render` and consumes `to_control`; the render side claims the
/// opposite ends, so the roles are swapped when the message crosses over.
#[derive(Clone)]
pub struct Bootstrap {
    /// Compiled kernel binary.
    pub kernel: Arc<[u8]>,
    pub to_render: Arc<RingBuffer>,
    pub to_control: Arc<RingBuffer>,
}

impl Bootstrap {
    pub fn new(kernel: Arc<[u8]>, to_render: Arc<RingBuffer>, to_control: Arc<RingBuffer>) -> Self {
        Self {
            kernel,
            to_render,
            to_control,
        }
    }
}

impl fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("kernel_bytes", &self.kernel.len())
            .field("to_render", &self.to_render)
            .field("to_control", &self.to_control)
            .finish()
    }
}
