//! # Typed Stack
//!
//! A LIFO stack of [`TaggedValue`]s stored as [`TaggedElement`] records in a
//! single [`MemoryArena`].
//!
//! The arena's `used` count always equals `count * TaggedElement::SIZE`, so
//! the ledger sees the stack's live bytes and [`TypedStack::strip`] shrinks
//! the arena to exactly the live elements. When something outside the stack
//! releases the arena (ledger teardown), the element count follows the arena
//! down to zero instead of pointing past its end.
//!
//! ## Growth
//!
//! A push into a full stack doubles the element capacity first. A stack with
//! no capacity (after stripping while empty) grows back to its initial size.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::MemoryConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::memory::{Ledger, MemoryArena};
use crate::types::{TaggedElement, TaggedValue};

const ELEMENT: usize = TaggedElement::SIZE;

/// Growable stack of tagged values backed by one arena.
///
/// # Example
///
/// ```rust,ignore
/// let mut stack = TypedStack::create(&Ledger::global())?;
/// stack.push(TaggedValue::I32(7))?;
/// assert_eq!(stack.pop()?, TaggedValue::I32(7));
/// ```
#[derive(Debug)]
pub struct TypedStack {
    arena: MemoryArena,
    count: usize,
    initial_elements: usize,
    growth_events: u64,
}

impl TypedStack {
    /// Creates an empty stack with room for 128 elements.
    ///
    /// # Errors
    ///
    /// Arena allocation failure.
    pub fn create(ledger: &Arc<Ledger>) -> MemoryResult<Self> {
        Self::with_capacity(ledger, MemoryConfig::DEFAULT_STACK_ELEMENTS)
    }

    /// Creates an empty stack with room for `elements` elements.
    ///
    /// # Errors
    ///
    /// Arena allocation failure or [`MemoryError::SizeOverflow`].
    pub fn with_capacity(ledger: &Arc<Ledger>, elements: usize) -> MemoryResult<Self> {
        let arena = MemoryArena::allocate(ledger, elements, ELEMENT)?;
        debug!(arena = %arena.id(), elements, "stack created");
        Ok(Self {
            arena,
            count: 0,
            initial_elements: elements.max(1),
            growth_events: 0,
        })
    }

    /// Creates an empty stack sized by `config.stack_initial_elements`.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidConfig`] or arena allocation failure.
    pub fn from_config(ledger: &Arc<Ledger>, config: &MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;
        Self::with_capacity(ledger, config.stack_initial_elements)
    }

    /// Pushes `value` on top, doubling capacity first if the stack is full.
    ///
    /// # Errors
    ///
    /// Growth failure. The stack is unchanged.
    pub fn push(&mut self, value: impl Into<TaggedValue>) -> MemoryResult<()> {
        self.sync_count();
        if self.count == self.capacity() {
            self.grow()?;
        }
        let element = value.into().to_element();
        self.arena
            .write(self.count * ELEMENT, bytemuck::bytes_of(&element))?;
        self.count += 1;
        Ok(())
    }

    /// Removes and returns the top value.
    ///
    /// # Errors
    ///
    /// [`MemoryError::StackUnderflow`] if the stack is empty.
    pub fn pop(&mut self) -> MemoryResult<TaggedValue> {
        self.sync_count();
        let value = self.peek()?;
        self.count -= 1;
        self.arena.set_used(self.count * ELEMENT)?;
        Ok(value)
    }

    /// Returns the top value without removing it.
    ///
    /// # Errors
    ///
    /// [`MemoryError::StackUnderflow`] if the stack is empty.
    pub fn peek(&self) -> MemoryResult<TaggedValue> {
        let top = self
            .live_count()
            .checked_sub(1)
            .ok_or(MemoryError::StackUnderflow)?;
        let offset = top * ELEMENT;
        let element = self
            .arena
            .with_bytes(|bytes| {
                bytes
                    .get(offset..offset + ELEMENT)
                    .map(bytemuck::pod_read_unaligned::<TaggedElement>)
            })?
            .ok_or(MemoryError::StackUnderflow)?;
        element.value()
    }

    /// Shrinks the backing arena to exactly the live elements.
    ///
    /// # Errors
    ///
    /// Arena resize failure.
    pub fn strip(&mut self) -> MemoryResult<()> {
        self.arena.strip()
    }

    /// Ensures room for at least `elements` elements without further growth.
    ///
    /// # Errors
    ///
    /// Arena resize failure or [`MemoryError::SizeOverflow`].
    pub fn expand(&mut self, elements: usize) -> MemoryResult<()> {
        if elements > self.capacity() {
            self.arena.reallocate(elements, ELEMENT)?;
            debug!(arena = %self.arena.id(), elements, "stack expanded");
        }
        Ok(())
    }

    /// Empties the stack and releases the backing arena.
    ///
    /// # Errors
    ///
    /// Arena release failure.
    pub fn destroy(mut self) -> MemoryResult<()> {
        self.count = 0;
        self.arena.free()
    }

    /// Elements still backed by the arena.
    fn live_count(&self) -> usize {
        self.count.min(self.arena.used() / ELEMENT)
    }

    fn sync_count(&mut self) {
        let live = self.live_count();
        if live != self.count {
            warn!(arena = %self.arena.id(), lost = self.count - live, "stack arena released externally");
            self.count = live;
        }
    }

    fn grow(&mut self) -> MemoryResult<()> {
        let current = self.capacity();
        let target = if current == 0 {
            self.initial_elements
        } else {
            current.checked_mul(2).ok_or(MemoryError::SizeOverflow {
                count: current,
                elem_size: 2 * ELEMENT,
            })?
        };
        self.arena.reallocate(target, ELEMENT)?;
        self.growth_events += 1;
        debug!(arena = %self.arena.id(), from = current, to = target, "stack grew");
        Ok(())
    }

    /// True if there are no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.live_count()
    }

    /// Capacity of the backing arena in bytes.
    #[must_use]
    pub fn get_size(&self) -> usize {
        self.arena.capacity()
    }

    /// Capacity in elements.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.arena.capacity() / ELEMENT
    }

    /// Number of times a push had to grow the arena.
    #[inline]
    #[must_use]
    pub const fn growth_events(&self) -> u64 {
        self.growth_events
    }

    /// The backing arena.
    #[must_use]
    pub const fn arena(&self) -> &MemoryArena {
        &self.arena
    }
}
