use crate::backend::TextureHandle;

/// Hardware ceiling on texture units referenced by one draw call.
pub const MAX_TEXTURE_SLOTS: usize = 32;

/// Slot reserved for the white fallback texture.
pub const WHITE_SLOT: u32 = 0;

/// Returned by [`TextureSlotTable::try_assign`] when every slot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotsFull;

/// Per-batch mapping from texture handle to texture unit.
///
/// Slot 0 always holds the white fallback texture. Lookups are a linear
/// scan; the table never grows past [`MAX_TEXTURE_SLOTS`].
#[derive(Debug, Clone)]
pub struct TextureSlotTable {
    slots: Vec<TextureHandle>,
    capacity: usize,
}

impl TextureSlotTable {
    /// Create a table holding only `white` in slot 0.
    ///
    /// `capacity` includes slot 0 and is clamped to 2..=[`MAX_TEXTURE_SLOTS`].
    pub fn new(white: TextureHandle, capacity: usize) -> Self {
        let capacity = capacity.clamp(2, MAX_TEXTURE_SLOTS);
        let mut slots = Vec::with_capacity(capacity);
        slots.push(white);
        Self { slots, capacity }
    }

    /// Slot already holding `texture`, if any.
    pub fn get(&self, texture: TextureHandle) -> Option<u32> {
        self.slots
            .iter()
            .position(|&t| t == texture)
            .map(|i| i as u32)
    }

    /// Slot for `texture`, appending it when not yet present.
    pub fn try_assign(&mut self, texture: TextureHandle) -> Result<u32, SlotsFull> {
        if let Some(slot) = self.get(texture) {
            return Ok(slot);
        }
        if self.slots.len() >= self.capacity {
            return Err(SlotsFull);
        }
        self.slots.push(texture);
        Ok((self.slots.len() - 1) as u32)
    }

    /// Drop every slot except the white fallback.
    pub fn reset(&mut self) {
        self.slots.truncate(1);
    }

    /// Fallback texture in slot 0.
    pub fn white(&self) -> TextureHandle {
        self.slots[0]
    }

    /// Number of occupied slots, slot 0 included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when only slot 0 is occupied.
    pub fn is_empty(&self) -> bool {
        self.slots.len() == 1
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Occupied slots as `(unit, texture)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, TextureHandle)> + '_ {
        self.slots.iter().enumerate().map(|(i, &t)| (i as u32, t))
    }
}
