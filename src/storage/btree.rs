//! The B-Tree is the data structure to represent the table.
//!
//! Why is a tree a good data structure for a database?
//! - Searching for a particular value is fast (logarithmic time)
//! - Inserting a value you’ve already found is fast (constant-ish time to rebalance)
//! - Traversing a range of values is fast (unlike a hash map)
//!
//! Nodes with children are called "internal" nodes. Internal nodes and leaf nodes are
//! structured differently:
//!
//! | **Property**            | **Internal Node**                  | **Leaf Node**              |
//! |-------------------------|------------------------------------|----------------------------|
//! | **Stores**              | Keys and pointers to children      | Keys and values            |
//! | **Number of keys**      | Up to `m-1`                        | As many as will fit        |
//! | **Number of pointers**  | Number of keys + 1                 | None                       |
//! | **Number of values**    | None                               | Number of keys             |
//! | **Key purpose**         | Used for routing                   | Paired with value          |
//! | **Stores values?**      | No                                 | Yes                        |
//!
//! Every node occupies exactly one page. This module only interprets the bytes
//! of a page; it never touches the file.
use super::pager::PAGE_SIZE;
use super::row::ROW_SIZE;
use crate::errors::Error;
use std::cmp::Ordering;
use std::fmt;

/// Represents the type of a B-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// An internal node containing keys and child pointers.
    NodeInternal,
    /// A leaf node containing key-value pairs.
    NodeLeaf,
}

// Common Node Header Layout

/// Offset of the node type field (starts at 0)
const NODE_TYPE_OFFSET: usize = 0;

/// Size of the node type field (1 byte, equivalent to uint8_t)
const NODE_TYPE_SIZE: usize = std::mem::size_of::<u8>();

/// Size of the is_root field (1 byte, equivalent to uint8_t)
const IS_ROOT_SIZE: usize = std::mem::size_of::<u8>();

/// Offset of the is_root field (after node type)
const IS_ROOT_OFFSET: usize = NODE_TYPE_SIZE;

/// Size of the parent pointer field (4 bytes, equivalent to uint32_t)
const PARENT_POINTER_SIZE: usize = std::mem::size_of::<u32>();

/// Offset of the parent pointer field (after is_root)
const PARENT_POINTER_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;

/// Total size of the common node header (sum of all fields)
pub const COMMON_NODE_HEADER_SIZE: usize = NODE_TYPE_SIZE + IS_ROOT_SIZE + PARENT_POINTER_SIZE;

// Leaf Node Header Layout

/// Size of the num_cells field in a leaf node header (4 bytes, equivalent to uint32_t)
const LEAF_NODE_NUM_CELLS_SIZE: usize = std::mem::size_of::<u32>();

/// Offset of the num_cells field in a leaf node header (after the common header)
const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;

/// Size of the `next_leaf` field in a leaf node header (in bytes).
///
/// Represents a `u32` pointer to the next leaf node in the B-tree.
const LEAF_NODE_NEXT_LEAF_SIZE: usize = std::mem::size_of::<u32>();

/// Offset of the `next_leaf` field in a leaf node header.
///
/// Positioned immediately after the `num_cells` field.
const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE;

/// Total size of a leaf node header (in bytes).
///
/// Includes the common header, `num_cells`, and `next_leaf` fields.
pub const LEAF_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + LEAF_NODE_NUM_CELLS_SIZE + LEAF_NODE_NEXT_LEAF_SIZE;

// Leaf Node Body Layout

/// Size of the key field in a leaf node cell (4 bytes, equivalent to uint32_t)
const LEAF_NODE_KEY_SIZE: usize = std::mem::size_of::<u32>();

/// Offset of the key field in a leaf node cell (starts at 0)
const LEAF_NODE_KEY_OFFSET: usize = 0;

/// Size of the value field in a leaf node cell: one serialized row.
const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;

/// Offset of the value field in a leaf node cell (after the key)
const LEAF_NODE_VALUE_OFFSET: usize = LEAF_NODE_KEY_OFFSET + LEAF_NODE_KEY_SIZE;

/// Total size of a leaf cell (key + row).
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;

/// Space available for cells in a leaf node (page size minus header)
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;

/// Maximum number of cells that fit in a leaf node.
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;

/// Number of cells assigned to the new (right) sibling during a leaf split.
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;

/// Number of cells kept by the old (left) node during a leaf split.
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

// Internal Node Header Layout

/// Size of the `num_keys` field in an internal node header (in bytes).
const INTERNAL_NODE_NUM_KEYS_SIZE: usize = std::mem::size_of::<u32>();

/// Offset of the `num_keys` field in an internal node header.
///
/// Starts immediately after the common node header.
const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;

/// Size of the `right_child` field in an internal node header (in bytes).
const INTERNAL_NODE_RIGHT_CHILD_SIZE: usize = std::mem::size_of::<u32>();

/// Offset of the `right_child` field in an internal node header.
///
/// Follows the `num_keys` field.
const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize =
    INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE;

/// Total size of an internal node header (in bytes).
///
/// Includes the common header, `num_keys`, and `right_child` fields.
pub const INTERNAL_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + INTERNAL_NODE_NUM_KEYS_SIZE + INTERNAL_NODE_RIGHT_CHILD_SIZE;

// Internal Node Body Layout

/// Size of a key in an internal node cell (in bytes).
const INTERNAL_NODE_KEY_SIZE: usize = std::mem::size_of::<u32>();

/// Size of a child pointer in an internal node cell (in bytes).
const INTERNAL_NODE_CHILD_SIZE: usize = std::mem::size_of::<u32>();

/// Total size of a cell in an internal node body (in bytes).
///
/// A cell consists of a child pointer followed by a key.
const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;

/// Number of child/key cells an internal page has room for.
pub const INTERNAL_NODE_SPACE_FOR_CELLS: usize =
    (PAGE_SIZE - INTERNAL_NODE_HEADER_SIZE) / INTERNAL_NODE_CELL_SIZE;

// Keep it small for testing.
pub const INTERNAL_NODE_MAX_KEYS: usize = if INTERNAL_NODE_SPACE_FOR_CELLS < 3 {
    INTERNAL_NODE_SPACE_FOR_CELLS
} else {
    3
};

/// Marks the right child of an internal node that has no children yet.
pub const INVALID_PAGE_NUM: u32 = u32::MAX;

/// One page interpreted as a B-tree node.
///
/// Leaf accessors fail on an internal page and vice versa, so a page is never
/// silently read with the wrong layout.
#[derive(Clone)]
pub struct Node {
    data: [u8; PAGE_SIZE],
}

impl Node {
    /// Creates a zero-filled node.
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Returns an immutable reference to the raw data buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Returns a mutable reference to the raw data buffer.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Resets the page to an empty, non-root leaf without a sibling.
    pub fn initialize_leaf_node(&mut self) {
        self.data = [0u8; PAGE_SIZE];
        self.set_node_type(NodeType::NodeLeaf);
        self.set_node_root(false);
        self.write_u32(LEAF_NODE_NUM_CELLS_OFFSET, 0);
        // 0 represents no sibling
        self.write_u32(LEAF_NODE_NEXT_LEAF_OFFSET, 0);
    }

    /// Resets the page to an empty, non-root internal node.
    ///
    /// The right child is set to `INVALID_PAGE_NUM` so that an internal node
    /// which never received children cannot be mistaken for one pointing at
    /// page 0 (the root).
    pub fn initialize_internal_node(&mut self) {
        self.data = [0u8; PAGE_SIZE];
        self.set_node_type(NodeType::NodeInternal);
        self.set_node_root(false);
        self.write_u32(INTERNAL_NODE_NUM_KEYS_OFFSET, 0);
        self.write_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET, INVALID_PAGE_NUM);
    }

    /// Returns the node type (leaf or internal).
    ///
    /// Reads a single byte at `NODE_TYPE_OFFSET`:
    /// - `0` indicates `NodeType::NodeInternal`.
    /// - `1` indicates `NodeType::NodeLeaf`.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the byte holds any other value.
    pub fn get_node_type(&self) -> Result<NodeType, Error> {
        match self.data[NODE_TYPE_OFFSET] {
            0 => Ok(NodeType::NodeInternal),
            1 => Ok(NodeType::NodeLeaf),
            invalid => Err(err!(Storage, "Invalid node type: {}", invalid)),
        }
    }

    /// Sets the node type (leaf or internal).
    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.data[NODE_TYPE_OFFSET] = match node_type {
            NodeType::NodeInternal => 0,
            NodeType::NodeLeaf => 1,
        };
    }

    /// Checks if this node is the root of the B-tree.
    pub fn is_node_root(&self) -> bool {
        self.data[IS_ROOT_OFFSET] == 1
    }

    /// Sets whether this node is the root of the B-tree.
    pub fn set_node_root(&mut self, is_root: bool) {
        self.data[IS_ROOT_OFFSET] = is_root as u8;
    }

    /// Returns the page number of this node’s parent.
    ///
    /// Meaningless for the root.
    pub fn node_parent(&self) -> u32 {
        self.read_u32(PARENT_POINTER_OFFSET)
    }

    /// Sets the page number of this node’s parent.
    pub fn set_node_parent(&mut self, parent: u32) {
        self.write_u32(PARENT_POINTER_OFFSET, parent);
    }

    /// Returns the number of cells stored in the leaf node.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the node is not a leaf or the stored count
    /// exceeds `LEAF_NODE_MAX_CELLS`.
    pub fn leaf_node_num_cells(&self) -> Result<u32, Error> {
        self.expect_type(NodeType::NodeLeaf)?;
        let num_cells = self.read_u32(LEAF_NODE_NUM_CELLS_OFFSET);
        if num_cells as usize > LEAF_NODE_MAX_CELLS {
            return Err(err!(
                Storage,
                "Leaf cell count {} exceeds max_cells {}",
                num_cells,
                LEAF_NODE_MAX_CELLS
            ));
        }
        Ok(num_cells)
    }

    /// Sets the number of cells in the leaf node.
    pub fn set_leaf_node_num_cells(&mut self, num_cells: u32) -> Result<(), Error> {
        self.expect_type(NodeType::NodeLeaf)?;
        if num_cells as usize > LEAF_NODE_MAX_CELLS {
            return Err(err!(
                Storage,
                "Leaf cell count {} exceeds max_cells {}",
                num_cells,
                LEAF_NODE_MAX_CELLS
            ));
        }
        self.write_u32(LEAF_NODE_NUM_CELLS_OFFSET, num_cells);
        Ok(())
    }

    /// Returns the page number of the next leaf node sibling.
    ///
    /// A value of `0` indicates no right sibling (e.g., this is the rightmost leaf).
    pub fn leaf_node_next_leaf(&self) -> Result<u32, Error> {
        self.expect_type(NodeType::NodeLeaf)?;
        Ok(self.read_u32(LEAF_NODE_NEXT_LEAF_OFFSET))
    }

    /// Sets the page number of the next leaf node sibling.
    pub fn set_leaf_node_next_leaf(&mut self, next_leaf: u32) -> Result<(), Error> {
        self.expect_type(NodeType::NodeLeaf)?;
        self.write_u32(LEAF_NODE_NEXT_LEAF_OFFSET, next_leaf);
        Ok(())
    }

    /// Computes the offset of a cell in the data buffer.
    ///
    /// # Errors
    /// Returns `Error::Storage` if `cell_num` exceeds `LEAF_NODE_MAX_CELLS`.
    fn leaf_node_cell_offset(&self, cell_num: u32) -> Result<usize, Error> {
        self.expect_type(NodeType::NodeLeaf)?;
        if cell_num as usize >= LEAF_NODE_MAX_CELLS {
            return Err(err!(
                Storage,
                "Cell index {} exceeds max_cells {}",
                cell_num,
                LEAF_NODE_MAX_CELLS
            ));
        }
        Ok(LEAF_NODE_HEADER_SIZE + cell_num as usize * LEAF_NODE_CELL_SIZE)
    }

    /// Returns the raw bytes (key followed by row) of a leaf cell.
    pub fn leaf_node_cell(&self, cell_num: u32) -> Result<&[u8], Error> {
        let offset = self.leaf_node_cell_offset(cell_num)?;
        Ok(&self.data[offset..offset + LEAF_NODE_CELL_SIZE])
    }

    /// Overwrites a leaf cell with raw bytes taken from another leaf cell.
    pub fn set_leaf_node_cell(&mut self, cell_num: u32, cell: &[u8]) -> Result<(), Error> {
        if cell.len() != LEAF_NODE_CELL_SIZE {
            return Err(err!(
                Storage,
                "Cell size mismatch (expected {}, got {})",
                LEAF_NODE_CELL_SIZE,
                cell.len()
            ));
        }
        let offset = self.leaf_node_cell_offset(cell_num)?;
        self.data[offset..offset + LEAF_NODE_CELL_SIZE].copy_from_slice(cell);
        Ok(())
    }

    /// Returns the key of the specified leaf node cell.
    pub fn leaf_node_key(&self, cell_num: u32) -> Result<u32, Error> {
        let offset = self.leaf_node_cell_offset(cell_num)?;
        Ok(self.read_u32(offset + LEAF_NODE_KEY_OFFSET))
    }

    /// Returns the serialized row of the specified leaf node cell.
    pub fn leaf_node_value(&self, cell_num: u32) -> Result<&[u8], Error> {
        let offset = self.leaf_node_cell_offset(cell_num)? + LEAF_NODE_VALUE_OFFSET;
        Ok(&self.data[offset..offset + LEAF_NODE_VALUE_SIZE])
    }

    /// Writes a key and its serialized row into a leaf cell.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the cell index is invalid or `value` is not
    /// exactly one row long.
    pub fn set_leaf_node_entry(&mut self, cell_num: u32, key: u32, value: &[u8]) -> Result<(), Error> {
        if value.len() != LEAF_NODE_VALUE_SIZE {
            return Err(err!(
                Storage,
                "Value size mismatch (expected {}, got {})",
                LEAF_NODE_VALUE_SIZE,
                value.len()
            ));
        }
        let offset = self.leaf_node_cell_offset(cell_num)?;
        self.write_u32(offset + LEAF_NODE_KEY_OFFSET, key);
        let value_offset = offset + LEAF_NODE_VALUE_OFFSET;
        self.data[value_offset..value_offset + LEAF_NODE_VALUE_SIZE].copy_from_slice(value);
        Ok(())
    }

    /// Moves cells `[cell_num, num_cells)` one slot to the right to make room
    /// for a new cell at `cell_num`.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the leaf is already full.
    pub fn leaf_node_make_room(&mut self, cell_num: u32) -> Result<(), Error> {
        let num_cells = self.leaf_node_num_cells()?;
        if num_cells as usize >= LEAF_NODE_MAX_CELLS {
            return Err(err!(Storage, "Leaf node is full ({} cells)", num_cells));
        }
        if cell_num >= num_cells {
            return Ok(());
        }
        let start = self.leaf_node_cell_offset(cell_num)?;
        let end = self.leaf_node_cell_offset(num_cells - 1)? + LEAF_NODE_CELL_SIZE;
        self.data.copy_within(start..end, start + LEAF_NODE_CELL_SIZE);
        Ok(())
    }

    /// Finds the position of `key` in this leaf using binary search.
    ///
    /// Returns the index of the first cell whose key is greater than or equal
    /// to `key`; that is where the key lives, or where it would be inserted.
    pub fn leaf_node_find(&self, key: u32) -> Result<u32, Error> {
        let mut min = 0;
        let mut max = self.leaf_node_num_cells()?;
        while min < max {
            let mid = (min + max) / 2;
            match self.leaf_node_key(mid)?.cmp(&key) {
                Ordering::Equal => return Ok(mid),
                Ordering::Greater => max = mid,
                Ordering::Less => min = mid + 1,
            }
        }
        Ok(min)
    }

    /// Returns the number of keys in this internal node.
    pub fn internal_node_num_keys(&self) -> Result<u32, Error> {
        self.expect_type(NodeType::NodeInternal)?;
        let num_keys = self.read_u32(INTERNAL_NODE_NUM_KEYS_OFFSET);
        if num_keys as usize > INTERNAL_NODE_MAX_KEYS {
            return Err(err!(
                Storage,
                "Internal key count {} exceeds max_keys {}",
                num_keys,
                INTERNAL_NODE_MAX_KEYS
            ));
        }
        Ok(num_keys)
    }

    /// Sets the number of keys in this internal node.
    pub fn set_internal_node_num_keys(&mut self, num_keys: u32) -> Result<(), Error> {
        self.expect_type(NodeType::NodeInternal)?;
        if num_keys as usize > INTERNAL_NODE_MAX_KEYS {
            return Err(err!(
                Storage,
                "Internal key count {} exceeds max_keys {}",
                num_keys,
                INTERNAL_NODE_MAX_KEYS
            ));
        }
        self.write_u32(INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys);
        Ok(())
    }

    /// Returns the right child pointer of this internal node.
    pub fn internal_node_right_child(&self) -> Result<u32, Error> {
        self.expect_type(NodeType::NodeInternal)?;
        let right_child = self.read_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET);
        check_child_page(right_child)?;
        Ok(right_child)
    }

    /// Sets the right child pointer of this internal node.
    pub fn set_internal_node_right_child(&mut self, right_child: u32) -> Result<(), Error> {
        self.expect_type(NodeType::NodeInternal)?;
        self.write_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET, right_child);
        Ok(())
    }

    fn internal_node_cell_offset(&self, cell_num: u32) -> Result<usize, Error> {
        self.expect_type(NodeType::NodeInternal)?;
        if cell_num as usize >= INTERNAL_NODE_MAX_KEYS {
            return Err(err!(
                Storage,
                "Cell index {} exceeds max_keys {}",
                cell_num,
                INTERNAL_NODE_MAX_KEYS
            ));
        }
        Ok(INTERNAL_NODE_HEADER_SIZE + cell_num as usize * INTERNAL_NODE_CELL_SIZE)
    }

    /// Returns the child pointer at the specified index.
    ///
    /// If `child_num` equals the number of keys, returns the right child pointer.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the child index is invalid or the pointer is
    /// `INVALID_PAGE_NUM` or page 0.
    pub fn internal_node_child(&self, child_num: u32) -> Result<u32, Error> {
        let num_keys = self.internal_node_num_keys()?;
        if child_num > num_keys {
            return Err(err!(
                Storage,
                "Tried to access child_num {} > num_keys {}",
                child_num,
                num_keys
            ));
        }
        if child_num == num_keys {
            return self.internal_node_right_child();
        }
        let child = self.read_u32(self.internal_node_cell_offset(child_num)?);
        check_child_page(child)?;
        Ok(child)
    }

    /// Sets the child pointer of the cell at the specified index.
    pub fn set_internal_node_child(&mut self, cell_num: u32, child: u32) -> Result<(), Error> {
        let offset = self.internal_node_cell_offset(cell_num)?;
        self.write_u32(offset, child);
        Ok(())
    }

    /// Returns the key at the specified index in this internal node.
    pub fn internal_node_key(&self, key_num: u32) -> Result<u32, Error> {
        let offset = self.internal_node_cell_offset(key_num)? + INTERNAL_NODE_CHILD_SIZE;
        Ok(self.read_u32(offset))
    }

    /// Sets the key at the specified index in this internal node.
    pub fn set_internal_node_key(&mut self, key_num: u32, key: u32) -> Result<(), Error> {
        let offset = self.internal_node_cell_offset(key_num)? + INTERNAL_NODE_CHILD_SIZE;
        self.write_u32(offset, key);
        Ok(())
    }

    /// Returns the index of the child that should contain the given key in this internal node.
    ///
    /// That is the first child whose key is greater than or equal to `key`, or
    /// the right child (index `num_keys`) when every key is smaller.
    pub fn internal_node_find_child(&self, key: u32) -> Result<u32, Error> {
        let mut min = 0;
        let mut max = self.internal_node_num_keys()?;
        while min < max {
            let mid = (min + max) / 2;
            if self.internal_node_key(mid)? >= key {
                max = mid;
            } else {
                min = mid + 1;
            }
        }
        Ok(min)
    }

    /// Returns every child of this internal node in order, right child last.
    pub fn internal_node_children(&self) -> Result<Vec<u32>, Error> {
        let num_keys = self.internal_node_num_keys()?;
        (0..=num_keys).map(|i| self.internal_node_child(i)).collect()
    }

    /// Replaces the contents of this internal node with `children`, given as
    /// `(page_num, max_key)` pairs in key order.
    ///
    /// All but the last child become key/child cells keyed by their maximum
    /// key; the last one becomes the right child.
    ///
    /// # Errors
    /// Returns `Error::Storage` if `children` is empty or holds more than
    /// `INTERNAL_NODE_MAX_KEYS + 1` entries.
    pub fn set_internal_node_children(&mut self, children: &[(u32, u32)]) -> Result<(), Error> {
        let Some(((right_child, _), cells)) = children.split_last() else {
            return Err(err!(Storage, "Internal node needs at least one child"));
        };
        self.set_internal_node_num_keys(cells.len() as u32)?;
        for (i, (child, key)) in cells.iter().enumerate() {
            self.set_internal_node_child(i as u32, *child)?;
            self.set_internal_node_key(i as u32, *key)?;
        }
        self.set_internal_node_right_child(*right_child)
    }

    fn expect_type(&self, expected: NodeType) -> Result<(), Error> {
        let actual = self.get_node_type()?;
        if actual != expected {
            return Err(err!(
                Storage,
                "Expected {} node, found {} node",
                expected,
                actual
            ));
        }
        Ok(())
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(bytes)
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Page 0 is always the root, so a child pointer to it can only come from a
/// zeroed or corrupt page.
fn check_child_page(page_num: u32) -> Result<(), Error> {
    match page_num {
        INVALID_PAGE_NUM => Err(err!(Storage, "Child pointer is invalid page number")),
        0 => Err(err!(Storage, "Child pointer refers to the root page")),
        _ => Ok(()),
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("type", &self.get_node_type())
            .field("is_root", &self.is_node_root())
            .field("parent", &self.node_parent())
            .finish()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::NodeLeaf => write!(f, "leaf"),
            NodeType::NodeInternal => write!(f, "internal"),
        }
    }
}

/// Layout constants, one `NAME: value` line each.
pub fn constants() -> Vec<String> {
    vec![
        format!("ROW_SIZE: {}", ROW_SIZE),
        format!("COMMON_NODE_HEADER_SIZE: {}", COMMON_NODE_HEADER_SIZE),
        format!("LEAF_NODE_HEADER_SIZE: {}", LEAF_NODE_HEADER_SIZE),
        format!("LEAF_NODE_CELL_SIZE: {}", LEAF_NODE_CELL_SIZE),
        format!("LEAF_NODE_SPACE_FOR_CELLS: {}", LEAF_NODE_SPACE_FOR_CELLS),
        format!("LEAF_NODE_MAX_CELLS: {}", LEAF_NODE_MAX_CELLS),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_with_keys(keys: &[u32]) -> Node {
        let mut node = Node::new();
        node.initialize_leaf_node();
        for (i, key) in keys.iter().enumerate() {
            node.set_leaf_node_entry(i as u32, *key, &[0u8; ROW_SIZE])
                .unwrap();
        }
        node.set_leaf_node_num_cells(keys.len() as u32).unwrap();
        node
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(COMMON_NODE_HEADER_SIZE, 6);
        assert_eq!(LEAF_NODE_HEADER_SIZE, 14);
        assert_eq!(LEAF_NODE_CELL_SIZE, 297);
        assert_eq!(LEAF_NODE_SPACE_FOR_CELLS, 4082);
        assert_eq!(LEAF_NODE_MAX_CELLS, 13);
        assert_eq!(LEAF_NODE_LEFT_SPLIT_COUNT, 7);
        assert_eq!(LEAF_NODE_RIGHT_SPLIT_COUNT, 7);
        assert_eq!(INTERNAL_NODE_HEADER_SIZE, 14);
        assert_eq!(INTERNAL_NODE_SPACE_FOR_CELLS, 510);
        assert_eq!(INTERNAL_NODE_MAX_KEYS, 3);
    }

    #[test]
    fn test_constants_lines() {
        let lines = constants();
        assert_eq!(lines[0], "ROW_SIZE: 293");
        assert_eq!(lines[5], "LEAF_NODE_MAX_CELLS: 13");
    }

    #[test]
    fn test_header_fields() {
        let mut node = Node::new();
        node.initialize_leaf_node();
        assert_eq!(node.get_node_type().unwrap(), NodeType::NodeLeaf);
        assert!(!node.is_node_root());
        assert_eq!(node.as_slice()[0], 1);

        node.set_node_root(true);
        node.set_node_parent(42);
        node.set_leaf_node_next_leaf(7).unwrap();
        assert!(node.is_node_root());
        assert_eq!(node.node_parent(), 42);
        assert_eq!(node.leaf_node_next_leaf().unwrap(), 7);
    }

    #[test]
    fn test_type_guards() {
        let mut internal = Node::new();
        internal.initialize_internal_node();
        assert!(matches!(internal.leaf_node_num_cells(), Err(Error::Storage(_))));
        assert!(matches!(internal.leaf_node_key(0), Err(Error::Storage(_))));

        let leaf = leaf_with_keys(&[1]);
        assert!(matches!(leaf.internal_node_num_keys(), Err(Error::Storage(_))));
        assert!(matches!(leaf.internal_node_find_child(1), Err(Error::Storage(_))));

        let mut garbage = Node::new();
        garbage.as_mut_slice()[0] = 9;
        assert!(matches!(garbage.get_node_type(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_leaf_cell_bounds() {
        let leaf = leaf_with_keys(&[]);
        assert!(leaf.leaf_node_key(LEAF_NODE_MAX_CELLS as u32 - 1).is_ok());
        assert!(leaf.leaf_node_key(LEAF_NODE_MAX_CELLS as u32).is_err());
    }

    #[test]
    fn test_leaf_node_find() {
        let leaf = leaf_with_keys(&[2, 4, 6, 8]);
        assert_eq!(leaf.leaf_node_find(1).unwrap(), 0);
        assert_eq!(leaf.leaf_node_find(2).unwrap(), 0);
        assert_eq!(leaf.leaf_node_find(5).unwrap(), 2);
        assert_eq!(leaf.leaf_node_find(8).unwrap(), 3);
        assert_eq!(leaf.leaf_node_find(9).unwrap(), 4);

        let empty = leaf_with_keys(&[]);
        assert_eq!(empty.leaf_node_find(3).unwrap(), 0);
    }

    #[test]
    fn test_leaf_node_make_room() {
        let mut leaf = leaf_with_keys(&[1, 3, 5]);
        leaf.leaf_node_make_room(1).unwrap();
        leaf.set_leaf_node_entry(1, 2, &[0u8; ROW_SIZE]).unwrap();
        leaf.set_leaf_node_num_cells(4).unwrap();

        let keys: Vec<u32> = (0..4).map(|i| leaf.leaf_node_key(i).unwrap()).collect();
        assert_eq!(keys, vec![1, 2, 3, 5]);

        let keys: Vec<u32> = (1..=LEAF_NODE_MAX_CELLS as u32).collect();
        let mut full = leaf_with_keys(&keys);
        assert!(full.leaf_node_make_room(0).is_err());
    }

    #[test]
    fn test_internal_node_children() {
        let mut node = Node::new();
        node.initialize_internal_node();
        assert!(node.internal_node_right_child().is_err());

        node.set_internal_node_children(&[(3, 10), (5, 20), (4, 30)])
            .unwrap();
        assert_eq!(node.internal_node_num_keys().unwrap(), 2);
        assert_eq!(node.internal_node_key(0).unwrap(), 10);
        assert_eq!(node.internal_node_key(1).unwrap(), 20);
        assert_eq!(node.internal_node_right_child().unwrap(), 4);
        assert_eq!(node.internal_node_children().unwrap(), vec![3, 5, 4]);
        assert!(node.internal_node_child(3).is_err());

        assert_eq!(node.internal_node_find_child(1).unwrap(), 0);
        assert_eq!(node.internal_node_find_child(10).unwrap(), 0);
        assert_eq!(node.internal_node_find_child(11).unwrap(), 1);
        assert_eq!(node.internal_node_find_child(20).unwrap(), 1);
        assert_eq!(node.internal_node_find_child(21).unwrap(), 2);
    }

    #[test]
    fn test_zeroed_page_has_no_children() {
        // A zero-filled page reads as an internal node with right child 0.
        let node = Node::new();
        assert_eq!(node.get_node_type().unwrap(), NodeType::NodeInternal);
        assert!(matches!(node.internal_node_right_child(), Err(Error::Storage(_))));
        assert!(matches!(node.internal_node_child(0), Err(Error::Storage(_))));

        let mut node = Node::new();
        node.initialize_internal_node();
        node.set_internal_node_children(&[(0, 5), (2, 9)]).unwrap();
        assert!(matches!(node.internal_node_child(0), Err(Error::Storage(_))));
        assert_eq!(node.internal_node_child(1).unwrap(), 2);
    }

    #[test]
    fn test_internal_node_capacity() {
        let mut node = Node::new();
        node.initialize_internal_node();
        let too_many: Vec<(u32, u32)> = (0..INTERNAL_NODE_MAX_KEYS as u32 + 2)
            .map(|i| (i + 1, i * 10))
            .collect();
        assert!(node.set_internal_node_children(&too_many).is_err());
        assert!(node.set_internal_node_children(&[]).is_err());
    }
}
