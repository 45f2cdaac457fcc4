//! A set over a sorted [`SmallVec`]. Reaching-definition sets are almost
//! always singletons, and influence sets rarely exceed a handful of
//! entries, so inline storage avoids a heap allocation per get.

use smallvec::{Array, SmallVec};

pub struct SmallSet<A: Array>
where
    A::Item: Ord + Copy,
{
    inner: SmallVec<A>,
}

impl<A: Array> SmallSet<A>
where
    A::Item: Ord + Copy,
{
    pub fn new() -> SmallSet<A> {
        SmallSet {
            inner: SmallVec::new(),
        }
    }

    pub fn singleton(value: A::Item) -> SmallSet<A> {
        let mut set = SmallSet::new();
        set.insert(value);
        set
    }

    pub fn insert(&mut self, value: A::Item) -> bool {
        match self.inner.binary_search(&value) {
            Ok(_) => false,
            Err(insert_idx) => {
                self.inner.insert(insert_idx, value);
                true
            }
        }
    }

    pub fn contains(&self, value: &A::Item) -> bool {
        self.inner.binary_search(value).is_ok()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, A::Item> {
        self.inner.iter()
    }

    pub fn extend_ref(&mut self, other: &SmallSet<A>) -> bool {
        let mut changed = false;
        for value in other {
            changed |= self.insert(*value);
        }
        changed
    }
}

impl<A: Array> Default for SmallSet<A>
where
    A::Item: Ord + Copy,
{
    fn default() -> Self {
        SmallSet::new()
    }
}

impl<A: Array> Clone for SmallSet<A>
where
    A::Item: Ord + Copy,
{
    fn clone(&self) -> Self {
        SmallSet {
            inner: self.inner.clone(),
        }
    }
}

// The backing vec is sorted and duplicate-free, so slice equality is set
// equality.
impl<A: Array> PartialEq for SmallSet<A>
where
    A::Item: Ord + Copy,
{
    fn eq(&self, other: &Self) -> bool {
        self.inner[..] == other.inner[..]
    }
}

impl<A: Array> Eq for SmallSet<A> where A::Item: Ord + Copy {}

impl<A: Array> std::fmt::Debug for SmallSet<A>
where
    A::Item: Ord + Copy + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.inner.iter()).finish()
    }
}

impl<'a, A: Array> IntoIterator for &'a SmallSet<A>
where
    A::Item: Ord + Copy,
{
    type Item = &'a A::Item;
    type IntoIter = std::slice::Iter<'a, A::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}
