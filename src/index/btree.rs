//! In-memory B+Tree over string keys, persisted as an immutable snapshot
//!
//! ## Layout
//! Nodes live in an arena (`Vec<Node>`) and refer to each other by index, so
//! there are no parent pointers. Descent records the path it took and splits
//! walk that path back up.
//!
//! ```text
//!              [Internal: k1 | k2]
//!             /        |         \
//!   [Leaf: <k1] -> [Leaf: k1..k2] -> [Leaf: >=k2]     (leaves chained by `next`)
//! ```
//!
//! ## Bounds for order `m`
//! - internal node: at most `m` children, `keys.len() == children.len() - 1`
//! - leaf: at most `m - 1` entries, sorted by key, duplicates allowed
//!
//! ## File format
//! ```text
//! [magic "PGIX"][version: u32][len: u32][bincode(tree)][crc32: u32]
//! ```
//! Only insertion and lookup exist. Deletion and rebalancing are not supported.
use crate::config::DurabilityLevel;
use crate::error::{Result, StorageError};
use crate::storage::checksum::Checksum;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Magic number for index files (ASCII "PGIX")
const INDEX_MAGIC: [u8; 4] = *b"PGIX";

/// Current index file format version
const INDEX_VERSION: u32 = 1;

/// Location of one row: 1-based page id plus 0-based position within the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub page_id: u32,
    pub row: u32,
}

impl Address {
    pub fn new(page_id: u32, row: u32) -> Self {
        Self { page_id, row }
    }
}

type NodeId = usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        entries: Vec<(String, Address)>,
        next: Option<NodeId>,
    },
    Internal {
        keys: Vec<String>,
        children: Vec<NodeId>,
    },
}

/// B+Tree index mapping a column value to every row address holding it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BPlusTree {
    order: usize,
    nodes: Vec<Node>,
    root: Option<NodeId>,
    /// Number of levels, 0 while empty
    height: usize,
    len: usize,
}

impl BPlusTree {
    /// Empty tree of order `order` (max children per internal node, at least 3)
    pub fn new(order: usize) -> Result<Self> {
        if order < 3 {
            return Err(StorageError::InvalidArgument(format!(
                "B+Tree order must be at least 3, got {}",
                order
            )));
        }
        Ok(Self {
            order,
            nodes: Vec::new(),
            root: None,
            height: 0,
            len: 0,
        })
    }

    /// Build a tree by inserting every pair in order
    pub fn bulk_load<I>(order: usize, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Address)>,
    {
        let mut tree = Self::new(order)?;
        for (key, address) in pairs {
            tree.insert(key, address);
        }
        Ok(tree)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn max_pairs(&self) -> usize {
        self.order - 1
    }

    fn midpoint(&self) -> usize {
        (self.order + 1).div_ceil(2) - 1
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Insert `(key, address)`; duplicate keys become separate entries
    pub fn insert(&mut self, key: String, address: Address) {
        self.len += 1;

        let Some(root) = self.root else {
            let leaf = self.push_node(Node::Leaf {
                entries: vec![(key, address)],
                next: None,
            });
            self.root = Some(leaf);
            self.height = 1;
            return;
        };

        // (internal node, child slot taken) from the root down
        let mut path: Vec<(NodeId, usize)> = Vec::with_capacity(self.height);
        let mut current = root;
        while let Node::Internal { keys, children } = &self.nodes[current] {
            let slot = keys.iter().position(|k| key < *k).unwrap_or(keys.len());
            path.push((current, slot));
            current = children[slot];
        }

        let max_pairs = self.max_pairs();
        let overfull = match &mut self.nodes[current] {
            Node::Leaf { entries, .. } => {
                let pos = entries.partition_point(|(k, _)| *k <= key);
                entries.insert(pos, (key, address));
                entries.len() > max_pairs
            }
            Node::Internal { .. } => false,
        };
        if !overfull {
            return;
        }

        let (mut separator, mut sibling) = self.split_leaf(current);
        let mut child = current;

        loop {
            let Some((parent, slot)) = path.pop() else {
                let new_root = self.push_node(Node::Internal {
                    keys: vec![separator],
                    children: vec![child, sibling],
                });
                self.root = Some(new_root);
                self.height += 1;
                return;
            };

            let order = self.order;
            let overfull = match &mut self.nodes[parent] {
                Node::Internal { keys, children } => {
                    keys.insert(slot, separator);
                    children.insert(slot + 1, sibling);
                    children.len() > order
                }
                Node::Leaf { .. } => false,
            };
            if !overfull {
                return;
            }

            let (next_separator, next_sibling) = self.split_internal(parent);
            separator = next_separator;
            sibling = next_sibling;
            child = parent;
        }
    }

    /// Move the upper half of a full leaf into a new right sibling.
    /// Returns the sibling's first key (the separator) and its id.
    fn split_leaf(&mut self, leaf: NodeId) -> (String, NodeId) {
        let mid = self.midpoint();
        let sibling_id = self.nodes.len();

        let (right, old_next) = match &mut self.nodes[leaf] {
            Node::Leaf { entries, next } => {
                let right = entries.split_off(mid);
                (right, next.replace(sibling_id))
            }
            Node::Internal { .. } => (Vec::new(), None),
        };
        let separator = right.first().map(|(k, _)| k.clone()).unwrap_or_default();

        self.push_node(Node::Leaf {
            entries: right,
            next: old_next,
        });
        (separator, sibling_id)
    }

    /// Split an overfull internal node, promoting its median key
    fn split_internal(&mut self, node: NodeId) -> (String, NodeId) {
        let mid = self.midpoint();

        let (separator, right_keys, right_children) = match &mut self.nodes[node] {
            Node::Internal { keys, children } => {
                let right_keys = keys.split_off(mid + 1);
                let separator = keys.pop().unwrap_or_default();
                let right_children = children.split_off(mid + 1);
                (separator, right_keys, right_children)
            }
            Node::Leaf { .. } => (String::new(), Vec::new(), Vec::new()),
        };

        let sibling = self.push_node(Node::Internal {
            keys: right_keys,
            children: right_children,
        });
        (separator, sibling)
    }

    /// Every address stored under `key`, in insertion order for equal keys
    pub fn search(&self, key: &str) -> Vec<Address> {
        let Some(root) = self.root else {
            return Vec::new();
        };

        // Leftmost leaf that can hold `key`: equal keys may sit on both sides
        // of a separator, so descend left on equality and follow the chain.
        let mut current = root;
        while let Node::Internal { keys, children } = &self.nodes[current] {
            let slot = keys.iter().position(|k| key <= k.as_str()).unwrap_or(keys.len());
            current = children[slot];
        }

        let mut found = Vec::new();
        let mut leaf = Some(current);
        while let Some(id) = leaf {
            let Node::Leaf { entries, next } = &self.nodes[id] else {
                break;
            };
            for (k, address) in entries {
                match k.as_str().cmp(key) {
                    std::cmp::Ordering::Less => {}
                    std::cmp::Ordering::Equal => found.push(*address),
                    std::cmp::Ordering::Greater => return found,
                }
            }
            leaf = *next;
        }
        found
    }

    /// All entries in key order
    pub fn entries(&self) -> Vec<(String, Address)> {
        let mut out = Vec::with_capacity(self.len);
        let mut leaf = self.first_leaf();
        while let Some(id) = leaf {
            let Node::Leaf { entries, next } = &self.nodes[id] else {
                break;
            };
            out.extend(entries.iter().cloned());
            leaf = *next;
        }
        out
    }

    fn first_leaf(&self) -> Option<NodeId> {
        let mut current = self.root?;
        while let Node::Internal { children, .. } = &self.nodes[current] {
            current = *children.first()?;
        }
        Some(current)
    }

    // ========================================================================
    // Structural checks
    // ========================================================================

    /// Verify every structural invariant; a violation is reported as corruption
    pub fn check_invariants(&self) -> Result<()> {
        if self.order < 3 {
            return Err(corrupt(format!("order {} is below 3", self.order)));
        }
        let Some(root) = self.root else {
            if self.height != 0 || self.len != 0 || !self.nodes.is_empty() {
                return Err(corrupt("empty tree carries nodes".to_string()));
            }
            return Ok(());
        };

        let mut visited = vec![false; self.nodes.len()];
        let mut leaves = Vec::new();
        let count = self.check_node(root, 1, None, None, &mut visited, &mut leaves)?;

        if count != self.len {
            return Err(corrupt(format!("holds {} entries, header says {}", count, self.len)));
        }
        if visited.iter().any(|v| !v) {
            return Err(corrupt("unreachable nodes".to_string()));
        }

        // The leaf chain must follow the in-order leaf sequence
        let mut chain = Vec::with_capacity(leaves.len());
        let mut leaf = leaves.first().copied();
        while let Some(id) = leaf {
            if chain.len() > leaves.len() {
                return Err(corrupt("leaf chain loops".to_string()));
            }
            chain.push(id);
            leaf = match self.nodes.get(id) {
                Some(Node::Leaf { next, .. }) => *next,
                Some(Node::Internal { .. }) => {
                    return Err(corrupt("leaf chain enters an internal node".to_string()))
                }
                None => return Err(corrupt(format!("leaf chain points at missing node {}", id))),
            };
        }
        if chain != leaves {
            return Err(corrupt("leaf chain does not match tree order".to_string()));
        }
        Ok(())
    }

    fn check_node(
        &self,
        id: NodeId,
        depth: usize,
        lower: Option<&str>,
        upper: Option<&str>,
        visited: &mut [bool],
        leaves: &mut Vec<NodeId>,
    ) -> Result<usize> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| corrupt(format!("node {} out of range", id)))?;
        if std::mem::replace(&mut visited[id], true) {
            return Err(corrupt(format!("node {} is referenced twice", id)));
        }

        let in_bounds =
            |k: &str| lower.map_or(true, |lo| k >= lo) && upper.map_or(true, |hi| k <= hi);

        match node {
            Node::Leaf { entries, .. } => {
                if depth != self.height {
                    return Err(corrupt(format!("leaf {} at depth {}, height {}", id, depth, self.height)));
                }
                if entries.is_empty() || entries.len() > self.max_pairs() {
                    return Err(corrupt(format!("leaf {} holds {} entries", id, entries.len())));
                }
                if entries.windows(2).any(|w| w[0].0 > w[1].0) {
                    return Err(corrupt(format!("leaf {} is not sorted", id)));
                }
                if !entries.iter().all(|(k, _)| in_bounds(k)) {
                    return Err(corrupt(format!("leaf {} violates its separators", id)));
                }
                leaves.push(id);
                Ok(entries.len())
            }
            Node::Internal { keys, children } => {
                if depth >= self.height {
                    return Err(corrupt(format!("internal node {} at depth {}", id, depth)));
                }
                if children.len() < 2 || children.len() > self.order || keys.len() + 1 != children.len() {
                    return Err(corrupt(format!(
                        "internal node {} has {} keys and {} children",
                        id,
                        keys.len(),
                        children.len()
                    )));
                }
                if keys.windows(2).any(|w| w[0] > w[1]) || !keys.iter().all(|k| in_bounds(k)) {
                    return Err(corrupt(format!("internal node {} keys out of order", id)));
                }

                let mut count = 0;
                for (i, &child) in children.iter().enumerate() {
                    let lo = if i == 0 { lower } else { Some(keys[i - 1].as_str()) };
                    let hi = if i == keys.len() { upper } else { Some(keys[i].as_str()) };
                    count += self.check_node(child, depth + 1, lo, hi, visited, leaves)?;
                }
                Ok(count)
            }
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let mut bytes = Vec::with_capacity(8 + payload.len() + 8);
        bytes.extend_from_slice(&INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        bytes.extend_from_slice(&Checksum::encode_with_checksum(&payload));
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 || bytes[0..4] != INDEX_MAGIC {
            return Err(corrupt("invalid index file magic number".to_string()));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != INDEX_VERSION {
            return Err(corrupt(format!("unsupported index file version {}", version)));
        }

        let payload = Checksum::decode_with_checksum(&bytes[8..])?;
        let tree: BPlusTree = bincode::deserialize(&payload)
            .map_err(|e| corrupt(format!("undecodable index payload: {}", e)))?;
        tree.check_invariants()?;
        Ok(tree)
    }

    /// Write the snapshot to a new file; fails if `path` exists
    pub fn save(&self, path: &Path, durability: DurabilityLevel) -> Result<()> {
        let bytes = self.to_bytes()?;
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(&bytes)?;
        if durability.requires_immediate_sync() {
            file.sync_all()?;
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes).map_err(|e| match e {
            StorageError::Corruption(msg) => {
                tracing::warn!(file = %path.display(), "index file failed verification");
                StorageError::Corruption(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }
}

fn corrupt(msg: String) -> StorageError {
    StorageError::Corruption(format!("B+Tree: {}", msg))
}
