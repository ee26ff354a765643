use std::cell::{Cell, UnsafeCell};
use std::mem::MaybeUninit;

// ---------------------------------------------------------------------------
// Pool — per-worker bump arena with stable addresses
// ---------------------------------------------------------------------------

/// Capacity of the first chunk; subsequent chunks double up to `MAX_CHUNK`.
const FIRST_CHUNK: usize = 1024;
const MAX_CHUNK: usize = 1 << 16;

/// Append-only arena. Every allocation keeps its address for the lifetime of
/// the pool: storage is a list of boxed chunks and a full chunk is never
/// moved or reallocated, only a new chunk is appended.
///
/// Exactly one worker allocates from a pool (`alloc` takes `&self` through an
/// `UnsafeCell`, so the type is `!Sync`), but raw pointers handed out by
/// `alloc` may be dereferenced from any thread once the pointee has been
/// published with the appropriate ordering. Nothing is freed until the pool
/// is dropped.
pub struct Pool<T> {
    chunks: UnsafeCell<Vec<Box<[MaybeUninit<T>]>>>,
    /// Initialised entries in the last chunk. All earlier chunks are full.
    used: Cell<usize>,
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            chunks: UnsafeCell::new(Vec::new()),
            used: Cell::new(0),
        }
    }

    /// Move `value` into the arena and return its (stable) address.
    pub fn alloc(&self, value: T) -> *mut T {
        // Safety: the `UnsafeCell` is only ever accessed from `&self` methods
        // of the single owner; `Pool` is `!Sync` so there is no aliasing
        // mutable access. Chunk contents are behind a `Box` and stay put when
        // the chunk list grows.
        unsafe {
            let chunks = &mut *self.chunks.get();
            let full = match chunks.last() {
                None => true,
                Some(chunk) => self.used.get() == chunk.len(),
            };
            if full {
                let cap = chunks
                    .last()
                    .map(|c| (c.len() * 2).min(MAX_CHUNK))
                    .unwrap_or(FIRST_CHUNK);
                let chunk: Box<[MaybeUninit<T>]> =
                    (0..cap).map(|_| MaybeUninit::uninit()).collect();
                chunks.push(chunk);
                self.used.set(0);
            }
            let chunk = chunks.last_mut().unwrap();
            let i = self.used.get();
            let slot = chunk[i].as_mut_ptr();
            slot.write(value);
            self.used.set(i + 1);
            slot
        }
    }

    /// Number of live allocations.
    pub fn len(&self) -> usize {
        unsafe {
            let chunks = &*self.chunks.get();
            match chunks.len() {
                0 => 0,
                n => {
                    let full: usize = chunks[..n - 1].iter().map(|c| c.len()).sum();
                    full + self.used.get()
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every allocation in insertion order.
    pub fn for_each(&self, mut f: impl FnMut(*const T)) {
        unsafe {
            let chunks = &*self.chunks.get();
            let n = chunks.len();
            for (ci, chunk) in chunks.iter().enumerate() {
                let init = if ci + 1 == n { self.used.get() } else { chunk.len() };
                for slot in &chunk[..init] {
                    f(slot.as_ptr());
                }
            }
        }
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        unsafe {
            let chunks = &mut *self.chunks.get();
            let n = chunks.len();
            for (ci, chunk) in chunks.iter_mut().enumerate() {
                let init = if ci + 1 == n { self.used.get() } else { chunk.len() };
                for slot in &mut chunk[..init] {
                    slot.as_mut_ptr().drop_in_place();
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
