//! # Object Registries
//!
//! Fixed-capacity pools backing the global semaphore and mutex registries.
//! Handles carry the generation of the slot they were issued for, so a
//! handle to a deleted object stays invalid after the slot is reused.

/// Index plus generation of a registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: usize,
    generation: u32,
}

impl Handle {
    #[cfg(test)]
    pub(crate) const fn dangling() -> Self {
        Self { index: usize::MAX, generation: 0 }
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

pub struct Registry<T, const N: usize> {
    slots: [Slot<T>; N],
}

impl<T, const N: usize> Registry<T, N> {
    pub const fn new() -> Self {
        Self { slots: [const { Slot { generation: 0, value: None } }; N] }
    }

    /// Store `value` in the first free slot. Gives the value back when full.
    pub fn insert(&mut self, value: T) -> Result<Handle, T> {
        match self.slots.iter_mut().enumerate().find(|(_, slot)| slot.value.is_none()) {
            Some((index, slot)) => {
                slot.value = Some(value);
                Ok(Handle { index, generation: slot.generation })
            }
            None => Err(value),
        }
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Take the object out and retire the handle.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        Some(value)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|slot| slot.value.as_mut())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, const N: usize> Default for Registry<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_until_full() {
        let mut registry: Registry<u32, 2> = Registry::new();
        let a = registry.insert(1).unwrap();
        let b = registry.insert(2).unwrap();
        assert_eq!(registry.insert(3), Err(3));
        assert_eq!(registry.get(a), Some(&1));
        assert_eq!(registry.get(b), Some(&2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_stale_handle_rejected_after_reuse() {
        let mut registry: Registry<u32, 1> = Registry::new();
        let old = registry.insert(10).unwrap();
        assert_eq!(registry.remove(old), Some(10));
        let new = registry.insert(20).unwrap();
        assert_ne!(old, new);
        assert_eq!(registry.get(old), None);
        assert_eq!(registry.remove(old), None);
        assert_eq!(registry.get_mut(new).copied(), Some(20));
    }

    #[test]
    fn test_dangling_handle() {
        let mut registry: Registry<u32, 4> = Registry::new();
        assert!(registry.get(Handle::dangling()).is_none());
        assert!(registry.remove(Handle::dangling()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_iter_mut_visits_live_objects() {
        let mut registry: Registry<u32, 4> = Registry::new();
        let a = registry.insert(1).unwrap();
        registry.insert(2).unwrap();
        registry.insert(3).unwrap();
        registry.remove(a);
        for value in registry.iter_mut() {
            *value *= 10;
        }
        let mut values: Vec<u32> = registry.iter_mut().map(|v| *v).collect();
        values.sort();
        assert_eq!(values, vec![20, 30]);
    }
}
