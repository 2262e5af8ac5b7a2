//! Tagged object registry.
//!
//! One [`Registry`] holds every object of a single kind, keyed by [`Tag`].
//! Existence and participation are tracked separately: `disable` moves a tag
//! into the pending-disabled set without dropping the object, and the
//! active-list cache is only rebuilt by [`Registry::update`]. Assembly walks
//! the active list many times per step while inserts and disables are rare,
//! so the O(n) rebuild is paid once per change.

use crate::error::{Error, Result};
use crate::object::DomainObject;
use crate::types::{ObjectKind, Tag};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};

/// Keyed store for one object kind.
#[derive(Debug)]
pub struct Registry<T> {
    kind: ObjectKind,
    pool: HashMap<Tag, T>,
    /// Active tags in ascending order, valid as of the last `update()`.
    active: Vec<Tag>,
    disabled: BTreeSet<Tag>,
    stale: bool,
}

impl<T: DomainObject> Registry<T> {
    /// Create an empty registry for objects of `kind`.
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            pool: HashMap::new(),
            active: Vec::new(),
            disabled: BTreeSet::new(),
            stale: false,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Insert an object under its own tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTag`] if a live object already uses the tag;
    /// the existing object is left untouched.
    pub fn insert(&mut self, obj: T) -> Result<()> {
        let tag = obj.tag();
        if self.pool.contains_key(&tag) {
            return Err(Error::DuplicateTag {
                kind: self.kind,
                tag,
            });
        }
        if !obj.is_active() {
            self.disabled.insert(tag);
        }
        self.pool.insert(tag, obj);
        self.stale = true;
        Ok(())
    }

    /// Whether an object with `tag` exists (active or not).
    pub fn find(&self, tag: Tag) -> bool {
        self.pool.contains_key(&tag)
    }

    /// Look up an object by tag.
    pub fn at(&self, tag: Tag) -> Result<&T> {
        self.pool.get(&tag).ok_or(Error::NotFound {
            kind: self.kind,
            tag,
        })
    }

    /// Mutable lookup by tag.
    pub fn at_mut(&mut self, tag: Tag) -> Result<&mut T> {
        let kind = self.kind;
        self.pool.get_mut(&tag).ok_or(Error::NotFound { kind, tag })
    }

    /// Remove and drop an object. Returns `false` if it did not exist.
    pub fn erase(&mut self, tag: Tag) -> bool {
        self.take(tag).is_some()
    }

    /// Remove an object and hand it back to the caller.
    pub fn take(&mut self, tag: Tag) -> Option<T> {
        let obj = self.pool.remove(&tag)?;
        self.disabled.remove(&tag);
        self.stale = true;
        Some(obj)
    }

    /// Return an object to participation. Returns `false` if it does not exist.
    pub fn enable(&mut self, tag: Tag) -> bool {
        match self.pool.get_mut(&tag) {
            Some(obj) => {
                obj.enable();
                if self.disabled.remove(&tag) {
                    self.stale = true;
                }
                true
            }
            None => false,
        }
    }

    /// Exclude an object from participation without removing it.
    pub fn disable(&mut self, tag: Tag) -> bool {
        match self.pool.get_mut(&tag) {
            Some(obj) => {
                obj.disable();
                if self.disabled.insert(tag) {
                    self.stale = true;
                }
                true
            }
            None => false,
        }
    }

    /// Reactivate every pending-disabled object. Returns how many were
    /// reactivated.
    pub fn enable_all(&mut self) -> usize {
        let tags = std::mem::take(&mut self.disabled);
        let count = tags.len();
        for tag in tags {
            if let Some(obj) = self.pool.get_mut(&tag) {
                obj.enable();
            }
        }
        if count > 0 {
            self.stale = true;
        }
        count
    }

    /// Rebuild the active-list cache from the existence map.
    pub fn update(&mut self) {
        let disabled = &self.disabled;
        self.active = self
            .pool
            .keys()
            .filter(|tag| !disabled.contains(tag))
            .copied()
            .collect();
        self.active.sort_unstable();
        self.stale = false;
    }

    /// Whether the active list is out of date with respect to the last change.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Total number of objects regardless of activation.
    pub fn size(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Active tags as of the last `update()`.
    pub fn active(&self) -> &[Tag] {
        &self.active
    }

    /// Whether `tag` exists and is not disabled.
    pub fn is_active(&self, tag: Tag) -> bool {
        self.pool.contains_key(&tag) && !self.disabled.contains(&tag)
    }

    /// Tags in the pending-disabled set.
    pub fn disabled(&self) -> impl Iterator<Item = Tag> + '_ {
        self.disabled.iter().copied()
    }

    /// All objects, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.pool.values()
    }

    /// Active objects in ascending tag order.
    pub fn iter_active(&self) -> impl Iterator<Item = &T> {
        self.active.iter().filter_map(|tag| self.pool.get(tag))
    }

    /// Visit every active object mutably, in ascending tag order.
    pub fn for_each_active_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut T),
    {
        for tag in &self.active {
            if let Some(obj) = self.pool.get_mut(tag) {
                f(obj);
            }
        }
    }
}

impl<T: DomainObject + Send> Registry<T> {
    /// Parallel mutable iteration over the active list as of the last
    /// `update()`, the same set [`Registry::for_each_active_mut`] visits.
    pub fn par_active_mut(&mut self) -> impl ParallelIterator<Item = &mut T> + '_ {
        let active = &self.active;
        self.pool
            .par_iter_mut()
            .filter(move |(tag, _)| active.binary_search(*tag).is_ok())
            .map(|(_, obj)| obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Identity;

    #[derive(Debug)]
    struct Item {
        id: Identity,
        value: f64,
    }

    impl Item {
        fn new(tag: u32, value: f64) -> Self {
            Self {
                id: Identity::new(Tag(tag)),
                value,
            }
        }
    }

    impl DomainObject for Item {
        fn identity(&self) -> &Identity {
            &self.id
        }
        fn identity_mut(&mut self) -> &mut Identity {
            &mut self.id
        }
    }

    fn registry() -> Registry<Item> {
        let mut reg = Registry::new(ObjectKind::Node);
        reg.insert(Item::new(3, 3.0)).unwrap();
        reg.insert(Item::new(1, 1.0)).unwrap();
        reg.insert(Item::new(2, 2.0)).unwrap();
        reg.update();
        reg
    }

    #[test]
    fn test_insert_and_lookup() {
        let reg = registry();
        assert_eq!(reg.size(), 3);
        assert!(reg.find(Tag(2)));
        assert!(!reg.find(Tag(9)));
        assert_eq!(reg.at(Tag(3)).unwrap().value, 3.0);
        assert_eq!(reg.active(), &[Tag(1), Tag(2), Tag(3)]);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut reg = registry();
        let err = reg.insert(Item::new(2, 20.0)).unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateTag {
                kind: ObjectKind::Node,
                tag: Tag(2)
            }
        );
        // Original object kept
        assert_eq!(reg.at(Tag(2)).unwrap().value, 2.0);
    }

    #[test]
    fn test_disable_keeps_object_addressable() {
        let mut reg = registry();
        assert!(reg.disable(Tag(2)));
        assert!(reg.is_stale());
        // Cache unchanged until update
        assert_eq!(reg.active().len(), 3);

        reg.update();
        assert_eq!(reg.active(), &[Tag(1), Tag(3)]);
        assert!(reg.at(Tag(2)).is_ok());
        assert!(!reg.at(Tag(2)).unwrap().is_active());
        assert_eq!(reg.size(), 3);

        assert!(reg.enable(Tag(2)));
        reg.update();
        assert_eq!(reg.active(), &[Tag(1), Tag(2), Tag(3)]);
        assert!(reg.at(Tag(2)).unwrap().is_active());
    }

    #[test]
    fn test_erase_then_lookup_fails() {
        let mut reg = registry();
        assert!(reg.erase(Tag(1)));
        assert!(!reg.erase(Tag(1)));
        assert!(matches!(
            reg.at(Tag(1)),
            Err(Error::NotFound { tag: Tag(1), .. })
        ));
        reg.update();
        assert_eq!(reg.active(), &[Tag(2), Tag(3)]);
    }

    #[test]
    fn test_enable_all_reactivates_pending() {
        let mut reg = registry();
        reg.disable(Tag(1));
        reg.disable(Tag(3));
        reg.update();
        assert_eq!(reg.active(), &[Tag(2)]);

        assert_eq!(reg.enable_all(), 2);
        reg.update();
        assert_eq!(reg.active(), &[Tag(1), Tag(2), Tag(3)]);
        assert_eq!(reg.enable_all(), 0);
    }

    #[test]
    fn test_missing_tag_enable_disable() {
        let mut reg = registry();
        assert!(!reg.disable(Tag(42)));
        assert!(!reg.enable(Tag(42)));
        assert!(reg.at_mut(Tag(42)).is_err());
    }

    #[test]
    fn test_par_active_mut_skips_disabled() {
        let mut reg = registry();
        reg.disable(Tag(2));
        reg.update();
        reg.par_active_mut().for_each(|item| item.value *= 10.0);
        assert_eq!(reg.at(Tag(1)).unwrap().value, 10.0);
        assert_eq!(reg.at(Tag(2)).unwrap().value, 2.0);
        assert_eq!(reg.at(Tag(3)).unwrap().value, 30.0);
    }

    #[test]
    fn test_parallel_and_serial_passes_agree_before_update() {
        let mut reg = registry();
        reg.disable(Tag(2));
        reg.insert(Item::new(4, 4.0)).unwrap();
        assert!(reg.is_stale());

        let mut serial = Vec::new();
        reg.for_each_active_mut(|item| serial.push(item.tag()));
        let mut parallel: Vec<Tag> = reg.par_active_mut().map(|item| item.tag()).collect();
        parallel.sort_unstable();
        assert_eq!(serial, vec![Tag(1), Tag(2), Tag(3)]);
        assert_eq!(parallel, serial);
    }

    #[test]
    fn test_iter_active_order() {
        let mut reg = registry();
        reg.disable(Tag(1));
        reg.update();
        let values: Vec<f64> = reg.iter_active().map(|i| i.value).collect();
        assert_eq!(values, vec![2.0, 3.0]);
    }
}
