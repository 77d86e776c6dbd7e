#![doc = include_str!("../README.md")]
#![no_std]
#![cfg_attr(feature = "allocator_api", feature(allocator_api))]

use allocator_api2::alloc::Allocator;
use allocator_api2::alloc::Global;
use allocator_api2::vec::Vec;
use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::num::NonZeroU32;

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// PUBLIC TYPE AND TRAIT DEFINITIONS                                          //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

/// An arena holding the nodes of every list built against it.
///
/// Lists are [`List`] handles; all operations that need to look at or create
/// nodes go through the store. Dropping the store frees every node at once,
/// whether or not the individual chains were [`release`](Self::release)d.

pub struct Store<T, A: Allocator = Global> {
  entries: Vec<Entry<T>, A>,
  free: Link,
  live: usize,
}

/// A singly-linked list: a `(head, tail)` pair of node handles.
///
/// A `List` is a plain `Copy` value. It does not borrow the [`Store`] and it
/// does not free anything on drop; chains are torn down explicitly with
/// [`Store::release`]. The tail handle caches the last node of the chain,
/// which is what makes [`Store::append`] O(1).
///
/// Either both handles are present, or both are absent (the empty list), or
/// the list is a singleton with `head == tail`. Every constructor funnels
/// through one normalization point that maintains this.

pub struct List<T> {
  head: Link,
  tail: Link,
  marker: PhantomData<fn() -> T>,
}

/// A borrowing iterator over the elements of a list, head to tail.

pub struct Iter<'a, T, A: Allocator = Global> {
  store: &'a Store<T, A>,
  cursor: Link,
}

/// Displays the elements of a list in order, separated by `", "`.

pub struct DisplayList<'a, T, A: Allocator = Global> {
  store: &'a Store<T, A>,
  list: List<T>,
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// PRIVATE TYPE AND TRAIT DEFINITIONS                                         //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

// A node handle is an index into the entry slab, offset by one so that
// `Option<NodeRef>` is still four bytes.

#[derive(Clone, Copy, PartialEq, Eq)]
struct NodeRef(NonZeroU32);

type Link = Option<NodeRef>;

struct Node<T> {
  key: T,
  next: Link,
  rc: u32,
}

enum Entry<T> {
  Occupied(Node<T>),
  Vacant(Link),
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// CONSTANTS                                                                  //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

const MAX_NODES: usize = u32::MAX as usize; // `index + 1` must fit in a `u32`

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// UTILITY FUNCTIONS                                                          //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

#[inline(never)]
#[cold]
fn panic_empty() -> ! {
  panic!("taillist: empty list")
}

#[inline(never)]
#[cold]
fn panic_index() -> ! {
  panic!("taillist: index out of bounds")
}

#[inline(never)]
#[cold]
fn panic_released() -> ! {
  panic!("taillist: node has already been released")
}

#[inline(never)]
#[cold]
fn panic_exhausted() -> ! {
  panic!("taillist: node arena exhausted")
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// NodeRef                                                                    //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl NodeRef {
  #[inline(always)]
  fn new(index: usize) -> Self {
    if index >= MAX_NODES {
      panic_exhausted()
    }

    match NonZeroU32::new(index as u32 + 1) {
      Some(n) => Self(n),
      None => panic_exhausted(),
    }
  }

  #[inline(always)]
  fn index(self) -> usize {
    self.0.get() as usize - 1
  }
}

impl fmt::Debug for NodeRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "NodeRef({})", self.index())
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// List                                                                       //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl<T> List<T> {
  // The single normalization point. One rule covers all three shapes: if
  // either side is absent, the tail collapses onto the head, so (None, None)
  // stays empty, (node, None) becomes a singleton with head == tail, and a
  // fully formed pair passes through unchanged.

  #[inline(always)]
  const fn make(head: Link, tail: Link) -> Self {
    let tail = if head.is_none() || tail.is_none() { head } else { tail };
    Self { head, tail, marker: PhantomData }
  }

  /// The canonical empty list.

  #[inline(always)]
  pub const fn empty() -> Self {
    Self::make(None, None)
  }

  /// Whether the list has no elements.

  #[inline(always)]
  pub const fn is_empty(&self) -> bool {
    self.head.is_none()
  }
}

impl<T> Clone for List<T> {
  #[inline(always)]
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for List<T> { }

impl<T> Default for List<T> {
  #[inline(always)]
  fn default() -> Self {
    Self::empty()
  }
}

impl<T> fmt::Debug for List<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("List").field(&self.head).field(&self.tail).finish()
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Store                                                                      //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl<T> Store<T> {
  /// Creates an empty store backed by the global allocator.

  pub fn new() -> Self {
    Self::new_in(Global)
  }

  /// Creates a store with room for `capacity` nodes backed by the global
  /// allocator.
  ///
  /// # Panics
  ///
  /// Panics on failure to allocate memory.

  pub fn with_capacity(capacity: usize) -> Self {
    Self::with_capacity_in(capacity, Global)
  }
}

impl<T> Default for Store<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T, A: Allocator> Store<T, A> {
  /// Creates an empty store backed by the given allocator.

  pub fn new_in(allocator: A) -> Self {
    Self { entries: Vec::new_in(allocator), free: None, live: 0 }
  }

  /// Creates a store with room for `capacity` nodes backed by the given
  /// allocator.
  ///
  /// # Panics
  ///
  /// Panics on failure to allocate memory.

  pub fn with_capacity_in(capacity: usize, allocator: A) -> Self {
    Self { entries: Vec::with_capacity_in(capacity, allocator), free: None, live: 0 }
  }

  /// A reference to the backing allocator.

  pub fn allocator(&self) -> &A {
    self.entries.allocator()
  }

  /// The number of live nodes, across every chain in the store.

  pub fn node_count(&self) -> usize {
    self.live
  }

  /// The number of node slots ever created, live or vacant. Released slots
  /// are reused before the slab grows.

  pub fn slot_count(&self) -> usize {
    self.entries.len()
  }

  /// Drops every node and invalidates every outstanding [`List`] handle.

  pub fn reset(&mut self) {
    self.entries.clear();
    self.free = None;
    self.live = 0;
  }

  #[inline(always)]
  fn node(&self, r: NodeRef) -> &Node<T> {
    match &self.entries[r.index()] {
      Entry::Occupied(node) => node,
      Entry::Vacant(_) => panic_released(),
    }
  }

  #[inline(always)]
  fn node_mut(&mut self, r: NodeRef) -> &mut Node<T> {
    match &mut self.entries[r.index()] {
      Entry::Occupied(node) => node,
      Entry::Vacant(_) => panic_released(),
    }
  }

  #[inline(always)]
  fn retain(&mut self, r: NodeRef) {
    self.node_mut(r).rc += 1;
  }

  fn insert(&mut self, node: Node<T>) -> NodeRef {
    self.live += 1;

    match self.free {
      Some(r) => {
        let entry = mem::replace(&mut self.entries[r.index()], Entry::Occupied(node));
        self.free = match entry {
          Entry::Vacant(next) => next,
          // Only vacant entries are threaded on the free list.
          Entry::Occupied(_) => unreachable!(),
        };
        r
      }
      None => {
        let r = NodeRef::new(self.entries.len());
        self.entries.push(Entry::Occupied(node));
        r
      }
    }
  }

  // Frees one node, returning its successor link. The successor's reference
  // count is NOT adjusted here; `release` owns that bookkeeping.

  fn evict(&mut self, r: NodeRef) -> Link {
    let entry = mem::replace(&mut self.entries[r.index()], Entry::Vacant(self.free));
    self.free = Some(r);
    self.live -= 1;
    match entry {
      Entry::Occupied(node) => node.next,
      Entry::Vacant(_) => panic_released(),
    }
  }

  /// Prepends `x`, returning a new independently owned list.
  ///
  /// O(1). The new list shares every node of `lst` as its suffix; `lst`
  /// itself remains valid and must still be released on its own.
  ///
  /// # Panics
  ///
  /// Panics on failure to allocate memory.

  pub fn cons(&mut self, x: T, lst: List<T>) -> List<T> {
    // The new node's next link owns one reference to the old head, on top
    // of the reference `lst` keeps for itself.
    if let Some(r) = lst.head {
      self.retain(r);
    }

    let head = self.insert(Node { key: x, next: lst.head, rc: 1 });
    List::make(Some(head), lst.tail)
  }

  /// Appends `x` in place, returning the extended list.
  ///
  /// O(1): the cached tail handle is linked to a fresh terminal node with no
  /// traversal. Ownership of the chain transfers from `lst` to the returned
  /// list, matching the usual `lst = store.append(lst, x)` shape; do not
  /// release `lst` separately afterwards.
  ///
  /// This writes through the tail node, so any other list sharing that node
  /// (via [`cons`](Self::cons) or [`rest`](Self::rest)) observes the new
  /// element too. Appending through a handle whose tail is no longer the
  /// final node of the chain is a logic error; it cannot corrupt memory, but
  /// it strands the displaced suffix until the store is reset or dropped.
  ///
  /// # Panics
  ///
  /// Panics on failure to allocate memory.

  pub fn append(&mut self, lst: List<T>, x: T) -> List<T> {
    let node = self.insert(Node { key: x, next: None, rc: 1 });

    match lst.tail {
      None => List::make(Some(node), Some(node)),
      Some(t) => {
        let tail = self.node_mut(t);
        debug_assert!(tail.next.is_none());
        tail.next = Some(node);
        List::make(lst.head, Some(node))
      }
    }
  }

  /// The list of everything after the head, as a new independently owned
  /// list sharing the suffix nodes.
  ///
  /// O(1). `lst` remains valid; both lists must eventually be released.
  ///
  /// # Panics
  ///
  /// Panics if the list is empty.

  pub fn rest(&mut self, lst: List<T>) -> List<T> {
    match self.try_rest(lst) {
      Some(lst) => lst,
      None => panic_empty(),
    }
  }

  /// The list of everything after the head, or `None` if the list is empty.

  pub fn try_rest(&mut self, lst: List<T>) -> Option<List<T>> {
    let head = lst.head?;
    let next = self.node(head).next;

    // The returned handle owns its own reference to the new head.
    if let Some(r) = next {
      self.retain(r);
    }

    Some(List::make(next, lst.tail))
  }

  /// The number of elements, by traversal from the head. O(n).

  pub fn len(&self, lst: List<T>) -> usize {
    let mut n = 0;
    let mut cursor = lst.head;

    while let Some(r) = cursor {
      n += 1;
      cursor = self.node(r).next;
    }

    n
  }

  /// The element at the head. O(1).
  ///
  /// # Panics
  ///
  /// Panics if the list is empty.

  pub fn first(&self, lst: List<T>) -> &T {
    match lst.head {
      Some(r) => &self.node(r).key,
      None => panic_empty(),
    }
  }

  /// The element at the head, or `None` if the list is empty.

  pub fn try_first(&self, lst: List<T>) -> Option<&T> {
    lst.head.map(|r| &self.node(r).key)
  }

  /// The element at the cached tail node. O(1), no traversal.
  ///
  /// If this list's tail was extended *through another handle*, the cached
  /// tail is no longer the final node; `get(lst, len - 1)` is the traversing
  /// alternative.
  ///
  /// # Panics
  ///
  /// Panics if the list is empty.

  pub fn last(&self, lst: List<T>) -> &T {
    match lst.tail {
      Some(r) => &self.node(r).key,
      None => panic_empty(),
    }
  }

  /// The element at the cached tail node, or `None` if the list is empty.

  pub fn try_last(&self, lst: List<T>) -> Option<&T> {
    lst.tail.map(|r| &self.node(r).key)
  }

  /// The element at position `n`, by walking `n` links from the head. O(n).
  ///
  /// # Panics
  ///
  /// Panics unless `n < len(lst)`.

  pub fn get(&self, lst: List<T>, n: usize) -> &T {
    match self.try_get(lst, n) {
      Some(x) => x,
      None => panic_index(),
    }
  }

  /// The element at position `n`, or `None` if `n` is out of range.

  pub fn try_get(&self, lst: List<T>, n: usize) -> Option<&T> {
    let mut n = n;
    let mut cursor = lst.head;

    loop {
      let node = self.node(cursor?);
      if n == 0 {
        return Some(&node.key);
      }
      n -= 1;
      cursor = node.next;
    }
  }

  /// A fresh list of every element except the last.
  ///
  /// O(n) time and O(n) new nodes: every element is copied into a chain that
  /// shares nothing with `lst`. This is the one operation that is neither
  /// O(1) nor structure-sharing.
  ///
  /// # Panics
  ///
  /// Panics if the list is empty, or on failure to allocate memory.

  pub fn init(&mut self, lst: List<T>) -> List<T>
  where
    T: Clone
  {
    match self.try_init(lst) {
      Some(lst) => lst,
      None => panic_empty(),
    }
  }

  /// A fresh list of every element except the last, or `None` if the list
  /// is empty.
  ///
  /// # Panics
  ///
  /// Panics on failure to allocate memory.

  pub fn try_init(&mut self, lst: List<T>) -> Option<List<T>>
  where
    T: Clone
  {
    let mut cursor = lst.head?;
    let mut out = List::empty();

    loop {
      let node = self.node(cursor);
      let Some(next) = node.next else { break };
      let x = node.key.clone();
      out = self.append(out, x);
      cursor = next;
    }

    Some(out)
  }

  /// Releases one ownership of the chain starting at `lst`'s head.
  ///
  /// Nodes are freed from the head onward until one is reached that is still
  /// owned elsewhere, by another list handle or by a predecessor link in a
  /// chain that shares this suffix. Two lists sharing a suffix can each be
  /// released exactly once, in either order.
  ///
  /// Each list returned by [`cons`](Self::cons), [`rest`](Self::rest), or
  /// [`append`](Self::append) carries one ownership; release it at most
  /// once, and do not release a handle that [`append`](Self::append)
  /// consumed. Chains never released are freed when the store is reset or
  /// dropped.

  pub fn release(&mut self, lst: List<T>) {
    let mut cursor = lst.head;

    while let Some(r) = cursor {
      let node = self.node_mut(r);
      debug_assert!(node.rc > 0);
      node.rc -= 1;
      if node.rc > 0 {
        break;
      }
      cursor = self.evict(r);
    }
  }

  /// Iterates over the elements from head to tail.

  pub fn iter(&self, lst: List<T>) -> Iter<'_, T, A> {
    Iter { store: self, cursor: lst.head }
  }

  /// Wraps the list in a [`fmt::Display`] adapter rendering the elements in
  /// order, separated by `", "`.

  pub fn display(&self, lst: List<T>) -> DisplayList<'_, T, A> {
    DisplayList { store: self, list: lst }
  }
}

impl<T, A: Allocator> fmt::Debug for Store<T, A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Store")
      .field("nodes", &self.live)
      .field("slots", &self.entries.len())
      .finish()
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Iter                                                                       //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl<'a, T, A: Allocator> Iterator for Iter<'a, T, A> {
  type Item = &'a T;

  #[inline(always)]
  fn next(&mut self) -> Option<&'a T> {
    let node = self.store.node(self.cursor?);
    self.cursor = node.next;
    Some(&node.key)
  }
}

impl<'a, T, A: Allocator> Clone for Iter<'a, T, A> {
  fn clone(&self) -> Self {
    Self { store: self.store, cursor: self.cursor }
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// DisplayList                                                                //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl<'a, T: fmt::Display, A: Allocator> fmt::Display for DisplayList<'a, T, A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut sep = "";

    for x in self.store.iter(self.list) {
      write!(f, "{sep}{x}")?;
      sep = ", ";
    }

    Ok(())
  }
}
