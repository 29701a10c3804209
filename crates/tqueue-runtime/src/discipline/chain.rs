//! Index-linked doubly-linked list
//!
//! Nodes live in a slab; a removed node's slot goes onto a free stack and is
//! reused by the next insertion. Removal by index is O(1), which is what the
//! FIFO discipline needs to pull an arbitrary waiter out (timeouts, deletes).

const NIL: u32 = u32::MAX;

/// Position of an element inside a [`Chain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainIndex(u32);

impl ChainIndex {
    #[inline]
    pub(crate) const fn new(index: u32) -> Self {
        ChainIndex(index)
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

struct Node<T> {
    value: Option<T>,
    prev: u32,
    next: u32,
}

pub struct Chain<T> {
    nodes: Vec<Node<T>>,
    free: Vec<u32>,
    head: u32,
    tail: u32,
    len: usize,
}

impl<T> Chain<T> {
    pub const fn new() -> Self {
        Chain {
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append at the tail
    pub fn push_back(&mut self, value: T) -> ChainIndex {
        let node = Node {
            value: Some(value),
            prev: self.tail,
            next: NIL,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index as usize] = node;
                index
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        };

        if self.tail == NIL {
            self.head = index;
        } else {
            self.nodes[self.tail as usize].next = index;
        }
        self.tail = index;
        self.len += 1;
        ChainIndex(index)
    }

    /// Unlink the element at `index`, `None` if the slot is vacant
    pub fn remove(&mut self, index: ChainIndex) -> Option<T> {
        let i = index.0 as usize;
        let node = self.nodes.get_mut(i)?;
        let value = node.value.take()?;
        let (prev, next) = (node.prev, node.next);

        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev as usize].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next as usize].prev = prev;
        }

        self.free.push(index.0);
        self.len -= 1;
        if self.len == 0 {
            // Nothing linked; start over with a compact slab
            self.nodes.clear();
            self.free.clear();
        }
        Some(value)
    }

    /// Element at the head
    pub fn front(&self) -> Option<&T> {
        if self.head == NIL {
            return None;
        }
        self.nodes[self.head as usize].value.as_ref()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
    }

    /// Iterate head to tail
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            chain: self,
            cursor: self.head,
        }
    }
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a, T> {
    chain: &'a Chain<T>,
    cursor: u32,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.cursor == NIL {
            return None;
        }
        let node = &self.chain.nodes[self.cursor as usize];
        self.cursor = node.next;
        node.value.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut chain = Chain::new();
        for i in 0..5 {
            chain.push_back(i);
        }
        assert_eq!(chain.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert_eq!(chain.front(), Some(&0));
    }

    #[test]
    fn test_remove_middle_head_tail() {
        let mut chain = Chain::new();
        let a = chain.push_back('a');
        let b = chain.push_back('b');
        let c = chain.push_back('c');
        let d = chain.push_back('d');

        assert_eq!(chain.remove(b), Some('b'));
        assert_eq!(chain.remove(a), Some('a'));
        assert_eq!(chain.remove(d), Some('d'));
        assert_eq!(chain.iter().copied().collect::<Vec<_>>(), vec!['c']);
        assert_eq!(chain.front(), Some(&'c'));
        assert_eq!(chain.remove(c), Some('c'));
        assert!(chain.is_empty());
        assert_eq!(chain.front(), None);
    }

    #[test]
    fn test_remove_twice() {
        let mut chain = Chain::new();
        let a = chain.push_back(1);
        chain.push_back(2);
        assert_eq!(chain.remove(a), Some(1));
        assert_eq!(chain.remove(a), None);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_slot_reuse_keeps_order() {
        let mut chain = Chain::new();
        let a = chain.push_back(1);
        chain.push_back(2);
        chain.remove(a);
        chain.push_back(3);
        assert_eq!(chain.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    }
}
