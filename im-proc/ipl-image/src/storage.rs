use std::sync::{
    Arc, Mutex, Weak,
    atomic::{AtomicUsize, Ordering},
};

/// Backing memory of an [crate::Image].
pub(crate) enum Storage<'a> {
    Owned(PooledBuffer),
    Borrowed(&'a [u8]),
    BorrowedMut(&'a mut [u8]),
}

impl Storage<'_> {
    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(buf) => &buf.data,
            Storage::Borrowed(s) => s,
            Storage::BorrowedMut(s) => s,
        }
    }

    pub(crate) fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self {
            Storage::Owned(buf) => Some(&mut buf.data),
            Storage::Borrowed(_) => None,
            Storage::BorrowedMut(s) => Some(s),
        }
    }

    pub(crate) fn is_writable(&self) -> bool {
        !matches!(self, Storage::Borrowed(_))
    }
}

struct PoolInner {
    buffer_size: usize,
    free: Mutex<Vec<Vec<u8>>>,
    allocated: AtomicUsize,
}

impl PoolInner {
    fn free_list(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        self.free
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// A set of equally sized byte buffers which are recycled when the images
/// using them are dropped.
///
/// Buffers handed out by [BufferPool::acquire] return to the pool when the
/// last image referencing them is dropped. Once the pool itself is dropped,
/// outstanding buffers are freed normally instead. The pool never shrinks.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                buffer_size,
                free: Mutex::new(Vec::new()),
                allocated: AtomicUsize::new(0),
            }),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// Number of buffers allocated by this pool, in use or not.
    pub fn allocated(&self) -> usize {
        self.inner.allocated.load(Ordering::SeqCst)
    }

    /// Number of buffers ready to be handed out without allocating.
    pub fn available(&self) -> usize {
        self.inner.free_list().len()
    }

    /// Grow the pool until at least `count` buffers have been allocated.
    pub fn reserve(&self, count: usize) {
        let mut free = self.inner.free_list();
        while self.allocated() < count {
            free.push(vec![0u8; self.inner.buffer_size]);
            self.inner.allocated.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Take a zeroed buffer from the pool, allocating if none is free.
    pub fn acquire(&self) -> PooledBuffer {
        let recycled = self.inner.free_list().pop();
        let data = match recycled {
            Some(mut data) => {
                data.fill(0);
                data
            }
            None => {
                self.inner.allocated.fetch_add(1, Ordering::SeqCst);
                tracing::trace!(
                    "pool of {} byte buffers grew to {}",
                    self.inner.buffer_size,
                    self.allocated()
                );
                vec![0u8; self.inner.buffer_size]
            }
        };
        PooledBuffer {
            data,
            home: Some(Arc::downgrade(&self.inner)),
        }
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffer_size", &self.buffer_size())
            .field("allocated", &self.allocated())
            .field("available", &self.available())
            .finish()
    }
}

/// An owned byte buffer, optionally returning to a [BufferPool] on drop.
pub struct PooledBuffer {
    data: Vec<u8>,
    home: Option<Weak<PoolInner>>,
}

impl PooledBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl From<Vec<u8>> for PooledBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data, home: None }
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.home.take().and_then(|home| home.upgrade()) {
            let data = std::mem::take(&mut self.data);
            pool.free_list().push(data);
        }
    }
}
