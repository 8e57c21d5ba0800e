use std::{
    collections::BTreeMap,
    ops::{Index, IndexMut},
};

use serde::{Deserialize, Serialize};

/// Id-keyed storage for bodies and vessels. Ids are never reused, so a
/// removed vessel's id stays dead even after new vessels are added.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Arena<Id: IdLike + Ord + Copy, T> {
    inner: BTreeMap<Id, T>,
    next_id: usize,
}

impl<Id: IdLike + Ord + Copy, T> Arena<Id, T> {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn push(&mut self, x: T) -> Id {
        let id = Id::from_raw(self.next_id);
        self.next_id += 1;
        self.inner.insert(id, x);
        id
    }

    pub fn get(&self, id: Id) -> Option<&T> {
        self.inner.get(&id)
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        self.inner.get_mut(&id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.inner.contains_key(&id)
    }

    pub fn remove(&mut self, id: Id) -> Option<T> {
        self.inner.remove(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.inner.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, &T)> {
        self.inner.iter().map(|(i, v)| (*i, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Id, &mut T)> {
        self.inner.iter_mut().map(|(i, v)| (*i, v))
    }
}

impl<Id: IdLike + Ord + Copy, T> Default for Arena<Id, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: IdLike + Ord + Copy, T> Index<Id> for Arena<Id, T> {
    type Output = T;

    fn index(&self, index: Id) -> &Self::Output {
        &self.inner[&index]
    }
}

impl<Id: IdLike + Ord + Copy, T> IndexMut<Id> for Arena<Id, T> {
    #[allow(clippy::unwrap_used)]
    fn index_mut(&mut self, index: Id) -> &mut Self::Output {
        self.inner.get_mut(&index).unwrap()
    }
}

pub trait IdLike {
    fn from_raw(index: usize) -> Self;
    fn into_raw(self) -> usize;
}

/// Declares a transparent `u64` id newtype usable as an [`Arena`] key.
#[macro_export]
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $crate::arena::IdLike for $name {
            fn from_raw(index: usize) -> Self {
                Self(index as u64)
            }

            fn into_raw(self) -> usize {
                self.0 as usize
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    id_type!(TestId);

    #[test]
    fn ids_are_not_reused() {
        let mut arena: Arena<TestId, &str> = Arena::new();
        let a = arena.push("a");
        let b = arena.push("b");
        assert_eq!(arena.remove(a), Some("a"));
        let c = arena.push("c");
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.ids().collect::<Vec<_>>(), vec![b, c]);
        assert!(!arena.contains(a));
    }
}
