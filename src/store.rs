//! In-memory object arena.
//!
//! [`ObjectStore`] is a whole document held as a map from object reference to
//! value. The copier builds one as its destination, the writer consumes one,
//! and [`crate::document::PdfDocument::into_store`] materializes a parsed
//! source into one. Objects are keyed by number, never linked by ownership,
//! so page/parent cycles need nothing special.

use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef, ObjectResolver};
use std::collections::BTreeMap;

/// Document-level pointers written into the trailer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trailer {
    /// Document catalog
    pub root: Option<ObjectRef>,
    /// Document information dictionary
    pub info: Option<ObjectRef>,
}

/// Arena of indirect objects ordered by object number.
#[derive(Debug, Clone, Default)]
pub struct ObjectStore {
    objects: BTreeMap<ObjectRef, Object>,
    trailer: Trailer,
}

impl ObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an object.
    pub fn get(&self, obj_ref: ObjectRef) -> Result<&Object> {
        self.objects
            .get(&obj_ref)
            .ok_or(Error::DanglingReference(obj_ref))
    }

    /// Mutable access to an object.
    pub fn get_mut(&mut self, obj_ref: ObjectRef) -> Result<&mut Object> {
        self.objects
            .get_mut(&obj_ref)
            .ok_or(Error::DanglingReference(obj_ref))
    }

    /// Whether `obj_ref` names a stored object.
    pub fn contains(&self, obj_ref: ObjectRef) -> bool {
        self.objects.contains_key(&obj_ref)
    }

    /// Store `value` under a fresh reference: highest object number + 1,
    /// generation 0.
    pub fn insert(&mut self, value: Object) -> ObjectRef {
        let obj_ref = ObjectRef::new(self.max_id() + 1, 0);
        self.objects.insert(obj_ref, value);
        obj_ref
    }

    /// Store `value` under an explicit reference, returning the previous value.
    pub fn set(&mut self, obj_ref: ObjectRef, value: Object) -> Option<Object> {
        self.objects.insert(obj_ref, value)
    }

    /// Overwrite an existing object.
    pub fn replace(&mut self, obj_ref: ObjectRef, value: Object) -> Result<()> {
        let slot = self.get_mut(obj_ref)?;
        *slot = value;
        Ok(())
    }

    /// Highest object number in use, 0 when empty.
    pub fn max_id(&self) -> u32 {
        self.objects.keys().next_back().map_or(0, |r| r.id)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All objects in ascending reference order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectRef, &Object)> + '_ {
        self.objects.iter().map(|(r, o)| (*r, o))
    }

    /// Trailer pointers.
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// Mutable trailer pointers.
    pub fn trailer_mut(&mut self) -> &mut Trailer {
        &mut self.trailer
    }

    /// The catalog dictionary, if `root` is set and resolves.
    pub fn catalog(&self) -> Result<&Object> {
        let root = self
            .trailer
            .root
            .ok_or_else(|| Error::malformed("document has no /Root"))?;
        self.get(root)
    }
}

impl ObjectResolver for ObjectStore {
    fn resolve(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        self.get(obj_ref).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_allocates_max_plus_one() {
        let mut store = ObjectStore::new();
        assert_eq!(store.insert(Object::Integer(1)), ObjectRef::new(1, 0));
        assert_eq!(store.insert(Object::Integer(2)), ObjectRef::new(2, 0));

        store.set(ObjectRef::new(10, 0), Object::Null);
        assert_eq!(store.insert(Object::Integer(3)), ObjectRef::new(11, 0));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_get_missing_is_dangling() {
        let store = ObjectStore::new();
        let err = store.get(ObjectRef::new(4, 0)).unwrap_err();
        assert!(matches!(err, Error::DanglingReference(r) if r == ObjectRef::new(4, 0)));
    }

    #[test]
    fn test_replace_requires_existing() {
        let mut store = ObjectStore::new();
        let r = store.insert(Object::Null);
        store.replace(r, Object::Boolean(true)).unwrap();
        assert_eq!(store.get(r).unwrap(), &Object::Boolean(true));
        assert!(store.replace(ObjectRef::new(99, 0), Object::Null).is_err());
    }

    #[test]
    fn test_iteration_is_ascending() {
        let mut store = ObjectStore::new();
        store.set(ObjectRef::new(7, 0), Object::Integer(7));
        store.set(ObjectRef::new(2, 0), Object::Integer(2));
        store.set(ObjectRef::new(5, 1), Object::Integer(5));

        let ids: Vec<u32> = store.iter().map(|(r, _)| r.id).collect();
        assert_eq!(ids, vec![2, 5, 7]);
    }

    #[test]
    fn test_catalog_requires_root() {
        let mut store = ObjectStore::new();
        assert!(store.catalog().is_err());
        let root = store.insert(Object::Null);
        store.trailer_mut().root = Some(root);
        assert!(store.catalog().is_ok());
    }

    #[test]
    fn test_resolver_impl() {
        let mut store = ObjectStore::new();
        let r = store.insert(Object::Integer(5));
        assert_eq!(store.resolve(r).unwrap(), Object::Integer(5));
        assert_eq!(store.resolve_value(&Object::Reference(r)).unwrap(), Object::Integer(5));
        assert!(store.resolve(ObjectRef::new(2, 0)).is_err());
    }
}
