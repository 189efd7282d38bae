//! Named value cells owned by components and shared across the engine.
//!
//! All per-step mutable simulation state lives in one arena of f64 cells.
//! An attribute is a named `(offset, len)` range into that arena, owned by
//! exactly one component. Other components may re-export an attribute under
//! their own name as an alias; aliases share the owner's cells and never
//! duplicate storage.
//!
//! Cells are lock-free: scalar loads/stores go through atomics, and step
//! tasks only write cells they declared in their `writes` set. A second
//! plane of cells holds the values committed at the end of the previous
//! step, which is what `prev_step_reads` resolve against.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{VfError, VfResult};

/// Lock-free f64 slot, stored as raw bits in an `AtomicU64`.
struct AtomicCell(AtomicU64);

impl AtomicCell {
    fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Release);
    }
}

/// A contiguous range of cells in the attribute arena.
///
/// Scalar attributes have `len == 1`; vector attributes (e.g. a component's
/// right-hand-side contribution) span several cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttrRange {
    pub offset: usize,
    pub len: usize,
}

impl AttrRange {
    /// Sub-range covering a single cell.
    pub fn cell(self, i: usize) -> AttrRange {
        debug_assert!(i < self.len);
        AttrRange {
            offset: self.offset + i,
            len: 1,
        }
    }

    /// Sub-range of `len` cells starting at `first`.
    pub fn slice(self, first: usize, len: usize) -> AttrRange {
        debug_assert!(first + len <= self.len);
        AttrRange {
            offset: self.offset + first,
            len,
        }
    }

    pub fn overlaps(self, other: AttrRange) -> bool {
        self.offset < other.offset + other.len && other.offset < self.offset + self.len
    }
}

/// Read/write capability of an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessFlags {
    pub read: bool,
    pub write: bool,
}

impl AccessFlags {
    pub const READ: AccessFlags = AccessFlags {
        read: true,
        write: false,
    };
    pub const READ_WRITE: AccessFlags = AccessFlags {
        read: true,
        write: true,
    };
}

struct AttrEntry {
    owner: String,
    name: String,
    flags: AccessFlags,
    range: AttrRange,
    /// Entry index of the aliased attribute, if this entry re-exports one.
    alias_of: Option<usize>,
}

/// Arena of attribute cells plus the name registry over them.
///
/// Registration happens during component initialization (`&mut self`);
/// afterwards the registry is immutable and cell access is `&self`, so the
/// store can be shared across scheduler worker threads.
#[derive(Default)]
pub struct AttributeStore {
    cells: Vec<AtomicCell>,
    prev: Vec<AtomicCell>,
    entries: Vec<AttrEntry>,
    by_key: HashMap<(String, String), usize>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new attribute owned by `owner`, allocating `len` fresh
    /// cells initialized to zero.
    pub fn register(
        &mut self,
        owner: &str,
        name: &str,
        len: usize,
        flags: AccessFlags,
    ) -> VfResult<AttrRange> {
        if len == 0 {
            return Err(VfError::InvalidArg {
                what: "attribute length must be > 0",
            });
        }
        let range = AttrRange {
            offset: self.cells.len(),
            len,
        };
        for _ in 0..len {
            self.cells.push(AtomicCell::new(0.0));
            self.prev.push(AtomicCell::new(0.0));
        }
        self.insert_entry(owner, name, flags, range, None)?;
        Ok(range)
    }

    /// Register an alias: `owner` re-exports `target_owner`'s attribute of
    /// the same name. Storage is shared; ownership stays with the target.
    pub fn register_alias(
        &mut self,
        owner: &str,
        target_owner: &str,
        name: &str,
        flags: AccessFlags,
    ) -> VfResult<AttrRange> {
        let target = self.entry_index(target_owner, name)?;
        let len = self.entries[target].range.len;
        self.register_view(owner, name, target_owner, name, 0, len, flags)
    }

    /// Register a named view over a sub-range of another attribute's cells
    /// (e.g. one node's voltage inside the shared solution vector).
    /// Storage is shared; ownership stays with the target.
    pub fn register_view(
        &mut self,
        owner: &str,
        name: &str,
        target_owner: &str,
        target_name: &str,
        first: usize,
        len: usize,
        flags: AccessFlags,
    ) -> VfResult<AttrRange> {
        let target = self.entry_index(target_owner, target_name)?;
        let target_entry = &self.entries[target];
        if first + len > target_entry.range.len {
            return Err(VfError::IndexOob {
                what: "view sub-range",
                index: first + len,
                len: target_entry.range.len,
            });
        }
        if (flags.read && !target_entry.flags.read) || (flags.write && !target_entry.flags.write) {
            return Err(VfError::Attribute {
                what: format!(
                    "view '{owner}.{name}' requests capabilities its target '{target_owner}.{target_name}' does not grant"
                ),
            });
        }
        let range = target_entry.range.slice(first, len);
        self.insert_entry(owner, name, flags, range, Some(target))?;
        Ok(range)
    }

    fn insert_entry(
        &mut self,
        owner: &str,
        name: &str,
        flags: AccessFlags,
        range: AttrRange,
        alias_of: Option<usize>,
    ) -> VfResult<()> {
        let key = (owner.to_string(), name.to_string());
        if self.by_key.contains_key(&key) {
            return Err(VfError::Attribute {
                what: format!("attribute '{owner}.{name}' registered twice"),
            });
        }
        self.by_key.insert(key, self.entries.len());
        self.entries.push(AttrEntry {
            owner: owner.to_string(),
            name: name.to_string(),
            flags,
            range,
            alias_of,
        });
        Ok(())
    }

    fn entry_index(&self, owner: &str, name: &str) -> VfResult<usize> {
        self.by_key
            .get(&(owner.to_string(), name.to_string()))
            .copied()
            .ok_or_else(|| VfError::Attribute {
                what: format!("unknown attribute '{owner}.{name}'"),
            })
    }

    /// Look up an attribute's cell range.
    pub fn range(&self, owner: &str, name: &str) -> VfResult<AttrRange> {
        Ok(self.entries[self.entry_index(owner, name)?].range)
    }

    /// Like [`range`](Self::range) but returns `None` instead of an error.
    pub fn find_range(&self, owner: &str, name: &str) -> Option<AttrRange> {
        self.by_key
            .get(&(owner.to_string(), name.to_string()))
            .map(|&i| self.entries[i].range)
    }

    /// Capability flags of an attribute.
    pub fn flags(&self, owner: &str, name: &str) -> VfResult<AccessFlags> {
        Ok(self.entries[self.entry_index(owner, name)?].flags)
    }

    /// Resolve an attribute (following aliases) to the name of its true owner.
    pub fn owner_of(&self, owner: &str, name: &str) -> VfResult<&str> {
        let mut idx = self.entry_index(owner, name)?;
        while let Some(target) = self.entries[idx].alias_of {
            idx = target;
        }
        Ok(&self.entries[idx].owner)
    }

    pub fn is_alias(&self, owner: &str, name: &str) -> VfResult<bool> {
        Ok(self.entries[self.entry_index(owner, name)?].alias_of.is_some())
    }

    /// Number of cells in the arena.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    // ---- cell access (current plane) ----

    pub fn get(&self, range: AttrRange, i: usize) -> f64 {
        debug_assert!(i < range.len);
        self.cells[range.offset + i].load()
    }

    pub fn set(&self, range: AttrRange, i: usize, v: f64) {
        debug_assert!(i < range.len);
        self.cells[range.offset + i].store(v);
    }

    pub fn scalar(&self, range: AttrRange) -> f64 {
        debug_assert_eq!(range.len, 1);
        self.cells[range.offset].load()
    }

    pub fn set_scalar(&self, range: AttrRange, v: f64) {
        debug_assert_eq!(range.len, 1);
        self.cells[range.offset].store(v);
    }

    pub fn read_into(&self, range: AttrRange, out: &mut [f64]) {
        debug_assert_eq!(range.len, out.len());
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.cells[range.offset + i].load();
        }
    }

    // ---- cell access (previous-step plane) ----

    pub fn prev(&self, range: AttrRange, i: usize) -> f64 {
        debug_assert!(i < range.len);
        self.prev[range.offset + i].load()
    }

    pub fn prev_scalar(&self, range: AttrRange) -> f64 {
        debug_assert_eq!(range.len, 1);
        self.prev[range.offset].load()
    }

    /// Commit the step: copy every current cell into the previous-step
    /// plane. Called by the simulation loop at the end-of-step barrier; this
    /// is what makes step-N values visible to step-N+1 `prev_step_reads`.
    pub fn commit_step(&self) {
        for (cur, prev) in self.cells.iter().zip(self.prev.iter()) {
            prev.store(cur.load());
        }
    }

    /// Copy of all current cell values, for recording and test comparison.
    pub fn snapshot(&self) -> Vec<f64> {
        self.cells.iter().map(|c| c.load()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_access() {
        let mut store = AttributeStore::new();
        let v = store.register("r1", "v_intf", 1, AccessFlags::READ).unwrap();
        store.set_scalar(v, 4.2);
        assert_eq!(store.scalar(v), 4.2);
        assert_eq!(store.range("r1", "v_intf").unwrap(), v);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut store = AttributeStore::new();
        store.register("c1", "i_intf", 1, AccessFlags::READ).unwrap();
        let err = store.register("c1", "i_intf", 1, AccessFlags::READ).unwrap_err();
        assert!(format!("{err}").contains("registered twice"));
    }

    #[test]
    fn alias_shares_storage_and_tracks_owner() {
        let mut store = AttributeStore::new();
        let orig = store
            .register("vs1", "v_ref", 1, AccessFlags::READ_WRITE)
            .unwrap();
        let alias = store
            .register_alias("injection", "vs1", "v_ref", AccessFlags::READ)
            .unwrap();

        assert_eq!(orig, alias);
        store.set_scalar(orig, 230.0);
        assert_eq!(store.scalar(alias), 230.0);

        assert_eq!(store.owner_of("injection", "v_ref").unwrap(), "vs1");
        assert!(store.is_alias("injection", "v_ref").unwrap());
        assert!(!store.is_alias("vs1", "v_ref").unwrap());
    }

    #[test]
    fn alias_cannot_widen_capabilities() {
        let mut store = AttributeStore::new();
        store.register("vs1", "v_ref", 1, AccessFlags::READ).unwrap();
        let err = store
            .register_alias("injection", "vs1", "v_ref", AccessFlags::READ_WRITE)
            .unwrap_err();
        assert!(format!("{err}").contains("capabilities"));
    }

    #[test]
    fn view_covers_target_sub_range() {
        let mut store = AttributeStore::new();
        let x = store.register("system", "x", 4, AccessFlags::READ).unwrap();
        let v2 = store
            .register_view("n2", "v", "system", "x", 2, 1, AccessFlags::READ)
            .unwrap();
        store.set(x, 2, 7.5);
        assert_eq!(store.scalar(v2), 7.5);
        assert_eq!(store.owner_of("n2", "v").unwrap(), "system");
    }

    #[test]
    fn prev_plane_lags_until_commit() {
        let mut store = AttributeStore::new();
        let a = store.register("l1", "i_prev", 1, AccessFlags::READ).unwrap();
        store.set_scalar(a, 1.0);
        assert_eq!(store.prev_scalar(a), 0.0);
        store.commit_step();
        assert_eq!(store.prev_scalar(a), 1.0);
        store.set_scalar(a, 2.0);
        assert_eq!(store.prev_scalar(a), 1.0);
    }

    #[test]
    fn overlap_detection() {
        let a = AttrRange { offset: 0, len: 3 };
        let b = AttrRange { offset: 2, len: 2 };
        let c = AttrRange { offset: 3, len: 1 };
        assert!(a.overlaps(b));
        assert!(!a.overlaps(c));
        assert!(b.overlaps(c));
    }
}
