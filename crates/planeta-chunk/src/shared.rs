//! Pool of chunk-border vertices shared between neighbouring chunks.

use planeta_skeleton::{INVALID_VRTX, VrtxId};

const NO_SHARED: u32 = u32::MAX;

/// Reference-counted shared vertex slots with a corner lookup.
///
/// Slot ids are also their vertex buffer index. A slot may remember the
/// skeleton vertex it was created for so chunks meeting only at that corner
/// reuse it.
#[derive(Clone, Debug)]
pub(crate) struct SharedVertexPool {
    users: Vec<u16>,
    corner_of: Vec<VrtxId>,
    /// Skeleton vertex to shared slot.
    corner_map: Vec<u32>,
    free: Vec<u32>,
    count: u32,
    capacity: u32,
}

impl SharedVertexPool {
    pub(crate) fn new(capacity: u32, skeleton_vertices: u32) -> Self {
        Self {
            users: vec![0; capacity as usize],
            corner_of: vec![INVALID_VRTX; capacity as usize],
            corner_map: vec![NO_SHARED; skeleton_vertices as usize],
            free: Vec::new(),
            count: 0,
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots handed out so far, free ones included.
    pub(crate) fn slots(&self) -> u32 {
        self.count
    }

    pub(crate) fn available(&self) -> u32 {
        self.free.len() as u32 + (self.capacity - self.count)
    }

    pub(crate) fn in_use(&self) -> u32 {
        self.count - self.free.len() as u32
    }

    /// Take a free slot. Callers check [`Self::available`] first.
    pub(crate) fn alloc(&mut self) -> Option<u32> {
        if let Some(id) = self.free.pop() {
            return Some(id);
        }
        if self.count < self.capacity {
            self.count += 1;
            return Some(self.count - 1);
        }
        None
    }

    pub(crate) fn users(&self, id: u32) -> u16 {
        self.users[id as usize]
    }

    pub(crate) fn add_user(&mut self, id: u32) {
        self.users[id as usize] += 1;
    }

    /// Drop one user. Returns `true` when the slot went back to the free list.
    pub(crate) fn release(&mut self, id: u32) -> bool {
        let users = &mut self.users[id as usize];
        *users = users.saturating_sub(1);
        if *users > 0 {
            return false;
        }
        let corner = self.corner_of[id as usize];
        if corner != INVALID_VRTX {
            self.detach_corner(corner);
        }
        self.free.push(id);
        true
    }

    /// Shared slot created for skeleton vertex `corner`, if any.
    pub(crate) fn corner(&self, corner: VrtxId) -> Option<u32> {
        self.corner_map
            .get(corner as usize)
            .copied()
            .filter(|&id| id != NO_SHARED)
    }

    /// Remember that slot `id` stands for skeleton vertex `corner`, unless the
    /// slot already represents another one.
    pub(crate) fn map_corner(&mut self, corner: VrtxId, id: u32) {
        if self.corner_of[id as usize] != INVALID_VRTX {
            return;
        }
        if let Some(entry) = self.corner_map.get_mut(corner as usize) {
            *entry = id;
            self.corner_of[id as usize] = corner;
        }
    }

    /// Forget the slot mapped to skeleton vertex `corner`.
    pub(crate) fn detach_corner(&mut self, corner: VrtxId) {
        if let Some(entry) = self.corner_map.get_mut(corner as usize) {
            if *entry != NO_SHARED {
                self.corner_of[*entry as usize] = INVALID_VRTX;
                *entry = NO_SHARED;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_returns_slot_and_clears_corner() {
        let mut pool = SharedVertexPool::new(4, 16);
        let id = pool.alloc().unwrap();
        pool.add_user(id);
        pool.add_user(id);
        pool.map_corner(7, id);
        assert_eq!(pool.corner(7), Some(id));

        assert!(!pool.release(id));
        assert_eq!(pool.corner(7), Some(id));
        assert!(pool.release(id));
        assert_eq!(pool.corner(7), None);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.alloc(), Some(id));
    }

    #[test]
    fn test_alloc_stops_at_capacity() {
        let mut pool = SharedVertexPool::new(2, 12);
        assert_eq!(pool.available(), 2);
        assert!(pool.alloc().is_some());
        assert!(pool.alloc().is_some());
        assert_eq!(pool.alloc(), None);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_detach_keeps_slot_alive() {
        let mut pool = SharedVertexPool::new(2, 12);
        let id = pool.alloc().unwrap();
        pool.add_user(id);
        pool.map_corner(3, id);
        pool.detach_corner(3);
        assert_eq!(pool.corner(3), None);
        assert_eq!(pool.users(id), 1);
        // The slot can now stand for a different corner.
        pool.map_corner(5, id);
        assert_eq!(pool.corner(5), Some(id));
    }
}
