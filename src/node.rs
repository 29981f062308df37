//! Chain node: one key/value pair plus an owning link to the next node
//! in the same bucket.

use core::fmt;

/// A single entry in a bucket chain.
///
/// The key is fixed at creation; only the value can change afterwards.
/// Each node owns its successor, so a chain is dropped together with
/// its head.
pub struct Node<V> {
    key: String,
    value: V,
    pub(crate) next: Option<Box<Node<V>>>,
}

impl<V> Node<V> {
    pub(crate) fn new(key: String, value: V) -> Self {
        Self {
            key,
            value,
            next: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Replace the stored value, returning the previous one.
    pub(crate) fn replace_value(&mut self, value: V) -> V {
        core::mem::replace(&mut self.value, value)
    }

    /// The next node in the same bucket, if any.
    pub fn next(&self) -> Option<&Node<V>> {
        self.next.as_deref()
    }

    /// Walk this node and every successor in chain order.
    pub fn chain(&self) -> Chain<'_, V> {
        Chain { cur: Some(self) }
    }

    pub fn into_value(self) -> V {
        self.value
    }

    /// Unlink the first successor (not `self`) whose key equals `key`.
    ///
    /// The removed node is returned detached (its `next` is cleared) and
    /// the chain is relinked around it. Returns `None` and leaves the
    /// chain as it was when no successor matches.
    pub(crate) fn unlink_successor(&mut self, key: &str) -> Option<Box<Node<V>>> {
        let mut prev = self;
        loop {
            match prev.next.take() {
                None => return None,
                Some(mut next) if next.key == key => {
                    prev.next = next.next.take();
                    return Some(next);
                }
                Some(next) => {
                    prev.next = Some(next);
                    prev = prev.next.as_deref_mut()?;
                }
            }
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entry(&"key", &self.key)
            .entry(&"value", &self.value)
            .finish()
    }
}

/// Iterator over a node and its successors.
pub struct Chain<'a, V> {
    cur: Option<&'a Node<V>>,
}

impl<'a, V> Iterator for Chain<'a, V> {
    type Item = &'a Node<V>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cur?;
        self.cur = node.next.as_deref();
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_of(keys: &[&str]) -> Box<Node<i32>> {
        let mut head: Option<Box<Node<i32>>> = None;
        for (i, k) in keys.iter().enumerate().rev() {
            let mut node = Box::new(Node::new((*k).to_string(), i as i32));
            node.next = head.take();
            head = Some(node);
        }
        head.unwrap()
    }

    fn keys(head: &Node<i32>) -> Vec<&str> {
        head.chain().map(Node::key).collect()
    }

    #[test]
    fn chain_walks_in_link_order() {
        let head = chain_of(&["a", "b", "c"]);
        assert_eq!(keys(&head), ["a", "b", "c"]);
        assert_eq!(head.next().map(Node::key), Some("b"));
    }

    #[test]
    fn unlink_middle_and_tail() {
        let mut head = chain_of(&["a", "b", "c", "d"]);

        let b = head.unlink_successor("b").expect("b present");
        assert_eq!(b.key(), "b");
        assert!(b.next().is_none(), "removed node must be detached");
        assert_eq!(keys(&head), ["a", "c", "d"]);

        let d = head.unlink_successor("d").expect("d present");
        assert_eq!(*d.value(), 3);
        assert_eq!(keys(&head), ["a", "c"]);
    }

    #[test]
    fn unlink_missing_leaves_chain_intact() {
        let mut head = chain_of(&["a", "b", "c"]);
        assert!(head.unlink_successor("zz").is_none());
        // The head itself is never a candidate.
        assert!(head.unlink_successor("a").is_none());
        assert_eq!(keys(&head), ["a", "b", "c"]);
    }

    #[test]
    fn value_replacement_keeps_key() {
        let mut n = Node::new("k".to_string(), 1);
        assert_eq!(n.replace_value(2), 1);
        *n.value_mut() += 1;
        assert_eq!(n.key(), "k");
        assert_eq!(n.into_value(), 3);
    }

    #[test]
    fn debug_shows_key_and_value() {
        let n = Node::new("k".to_string(), 7);
        assert_eq!(format!("{n:?}"), r#"{"key": "k", "value": 7}"#);
    }
}
