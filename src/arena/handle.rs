//! Filepath: src/arena/handle.rs
//!
//! Typed views over an [`Arena`].
//!
//! [`ArenaAllocator<T>`] turns element counts into byte requests and casts the
//! resulting pointers. Any number of views, of any element types, can share
//! one arena; cloning or rebinding a view never copies the arena.
//!
//! [`ArenaBox<T>`] owns a single value placed in the arena and gives its slot
//! back on drop.

use std::fmt as StdFmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use super::{AllocError, Arena};
use crate::tracing_helpers::error_log;

// ============================================================================
//  ArenaAllocator
// ============================================================================

/// Allocates arrays of `T` from a shared [`Arena`].
///
/// # Example
///
/// ```rust
/// use avl_arena::{Arena, ArenaConfig};
///
/// let arena = Arena::new(ArenaConfig::new(1, 4096)).unwrap();
/// let ints = arena.allocator::<u32>().unwrap();
///
/// let ptr = ints.allocate(10).unwrap();
/// // Give back the first four elements, keep the other six.
/// let tail = ints.deallocate(ptr, 4).unwrap().unwrap();
/// assert_eq!(ints.deallocate(tail, 6).unwrap(), None);
///
/// // A view of another type over the same arena.
/// let bytes = ints.rebind::<u8>().unwrap();
/// assert_eq!(bytes.max_size(), 4096);
/// ```
pub struct ArenaAllocator<T> {
    arena: Arena,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ArenaAllocator<T> {
    /// View `arena` as an allocator of `T`.
    ///
    /// # Errors
    ///
    /// [`AllocError::UnsupportedAlignment`] if `T` needs more alignment than
    /// the arena's granularity provides.
    pub fn new(arena: &Arena) -> Result<Self, AllocError> {
        let align: usize = mem::align_of::<T>();
        let granularity: usize = arena.config().granularity;

        if align > granularity {
            return Err(AllocError::UnsupportedAlignment { align, granularity });
        }
        Ok(Self {
            arena: arena.clone(),
            _marker: PhantomData,
        })
    }

    /// The arena behind this view.
    #[must_use]
    #[inline(always)]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// A view of the same arena for another element type.
    ///
    /// # Errors
    ///
    /// Same as [`ArenaAllocator::new`].
    pub fn rebind<U>(&self) -> Result<ArenaAllocator<U>, AllocError> {
        ArenaAllocator::new(&self.arena)
    }

    /// Reserve space for `count` values of `T`.
    ///
    /// The memory is not initialized by this call (fresh blocks start out
    /// zeroed, reused space keeps old contents).
    ///
    /// # Errors
    ///
    /// - [`AllocError::ZeroSized`] if `count` is 0 or `T` is zero-sized
    /// - [`AllocError::CapacityOverflow`] if the byte length overflows
    /// - [`AllocError::ArenaExhausted`] if no block can hold the request
    pub fn allocate(&self, count: usize) -> Result<NonNull<T>, AllocError> {
        let bytes: usize = Self::byte_len(count)?;
        self.arena.allocate_bytes(bytes).map(NonNull::cast)
    }

    /// Release the first `count` values at `ptr`, or everything `ptr` still
    /// owns when `count` is 0.
    ///
    /// Returns `None` once nothing is left, otherwise `ptr + count`, the
    /// pointer that owns the rest.
    ///
    /// # Errors
    ///
    /// - [`AllocError::InvalidFree`] if `ptr` came from no live allocation
    /// - [`AllocError::OverFree`] if `ptr` owns fewer than `count` values
    pub fn deallocate(
        &self,
        ptr: NonNull<T>,
        count: usize,
    ) -> Result<Option<NonNull<T>>, AllocError> {
        let bytes: usize = Self::byte_len(count)?;
        let tail: Option<NonNull<u8>> = self.arena.deallocate_bytes(ptr.cast(), bytes)?;
        Ok(tail.map(NonNull::cast))
    }

    /// Most values of `T` a single allocation could currently hold.
    ///
    /// `usize::MAX` for zero-sized `T`.
    #[must_use]
    pub fn max_size(&self) -> usize {
        match mem::size_of::<T>() {
            0 => usize::MAX,
            size => self.arena.max_free_bytes() / size,
        }
    }

    /// Move `value` into the arena.
    ///
    /// # Errors
    ///
    /// Same as [`ArenaAllocator::allocate`] with a count of 1.
    pub fn create(&self, value: T) -> Result<ArenaBox<T>, AllocError> {
        let ptr: NonNull<T> = self.allocate(1)?;

        // SAFETY: ptr is a fresh, aligned allocation of one T.
        unsafe { ptr.as_ptr().write(value) };

        Ok(ArenaBox {
            ptr,
            allocator: self.clone(),
            _owns: PhantomData,
        })
    }

    fn byte_len(count: usize) -> Result<usize, AllocError> {
        count
            .checked_mul(mem::size_of::<T>())
            .ok_or(AllocError::CapacityOverflow)
    }
}

impl<T> Clone for ArenaAllocator<T> {
    fn clone(&self) -> Self {
        Self {
            arena: self.arena.clone(),
            _marker: PhantomData,
        }
    }
}

/// Views are equal when they share an arena, whatever their element types.
impl<T, U> PartialEq<ArenaAllocator<U>> for ArenaAllocator<T> {
    fn eq(&self, other: &ArenaAllocator<U>) -> bool {
        self.arena.ptr_eq(&other.arena)
    }
}

impl<T> Eq for ArenaAllocator<T> {}

impl<T> StdFmt::Debug for ArenaAllocator<T> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("element", &std::any::type_name::<T>())
            .field("arena", &self.arena)
            .finish()
    }
}

// ============================================================================
//  ArenaBox
// ============================================================================

/// A single `T` stored in an arena.
///
/// Dropping the box drops the value and frees its slot.
pub struct ArenaBox<T> {
    ptr: NonNull<T>,
    allocator: ArenaAllocator<T>,
    _owns: PhantomData<T>,
}

// SAFETY: the box owns its T exclusively, like Box<T>.
unsafe impl<T: Send> Send for ArenaBox<T> {}

// SAFETY: shared access only hands out &T.
unsafe impl<T: Sync> Sync for ArenaBox<T> {}

impl<T> ArenaBox<T> {
    /// The allocator the value came from.
    #[must_use]
    #[inline(always)]
    pub const fn allocator(this: &Self) -> &ArenaAllocator<T> {
        &this.allocator
    }

    /// Address of the value.
    #[must_use]
    #[inline(always)]
    pub const fn as_ptr(this: &Self) -> NonNull<T> {
        this.ptr
    }
}

impl<T> Deref for ArenaBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: ptr holds an initialized T for the box's lifetime.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for ArenaBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as in deref, and &mut self guarantees exclusivity.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for ArenaBox<T> {
    fn drop(&mut self) {
        // SAFETY: ptr holds an initialized T that nothing else will drop.
        unsafe { ptr::drop_in_place(self.ptr.as_ptr()) };

        let result: Result<Option<NonNull<T>>, AllocError> =
            self.allocator.deallocate(self.ptr, 1);
        if result.is_err() {
            error_log!(?result, "failed to release ArenaBox slot");
        }
    }
}

impl<T: StdFmt::Debug> StdFmt::Debug for ArenaBox<T> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        StdFmt::Debug::fmt(&**self, f)
    }
}
