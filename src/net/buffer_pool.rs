use std::sync::{Mutex, OnceLock};

const MAX_POOLED_BUFFERS: usize = 64;

/// Free list of scratch buffers. A buffer is owned by exactly one renter
/// between `rent` and `give_back`, so concurrent builders never share one.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

static SHARED: OnceLock<BufferPool> = OnceLock::new();

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> &'static BufferPool {
        SHARED.get_or_init(BufferPool::new)
    }

    pub fn rent(&self, min_capacity: usize) -> Vec<u8> {
        let recycled = self
            .free
            .lock()
            .ok()
            .and_then(|mut free| free.pop());
        let mut buffer = recycled.unwrap_or_default();
        if buffer.capacity() < min_capacity {
            buffer.reserve(min_capacity - buffer.len());
        }
        buffer
    }

    /// Returns a buffer to the pool, clearing it first.
    pub fn give_back(&self, mut buffer: Vec<u8>) {
        buffer.fill(0);
        buffer.clear();
        if let Ok(mut free) = self.free.lock() {
            if free.len() < MAX_POOLED_BUFFERS {
                free.push(buffer);
            }
        }
    }

    pub fn pooled(&self) -> usize {
        self.free.lock().map(|free| free.len()).unwrap_or(0)
    }
}
