use super::btree::{
    Node, NodeType, INTERNAL_NODE_MAX_KEYS, LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS,
};
use super::cursor::{descent_too_deep, Cursor};
use super::pager::Pager;
use super::row::Row;
use crate::errors::Error;
use std::path::Path;
use tracing::{debug, info, trace};

/// The only table of the database, stored as a B+Tree rooted at page 0.
pub struct Table {
    pub pager: Pager,
    pub root_page_num: u32,
}

/// What the parent of a split node did with the new sibling.
enum Promotion {
    /// The parent had room; nothing left to do.
    Absorbed,
    /// The parent overflowed and was split in turn. `right` must be promoted
    /// into the parent of `left`.
    Split { left: u32, right: u32 },
}

impl Table {
    /// Opens the table stored in `path`, creating an empty root leaf for a new file.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let mut pager = Pager::open(path)?;
        let root_page_num = 0;

        if pager.num_pages() == 0 {
            // New database file. Initialize page 0 as leaf node.
            let page_num = pager.allocate_page()?;
            let root = pager.get_page(page_num)?;
            root.initialize_leaf_node();
            root.set_node_root(true);
            info!(path = %path.display(), "Initialized new database file");
        }

        Ok(Table {
            pager,
            root_page_num,
        })
    }

    /// Writes every cached page back to disk.
    pub fn close(&mut self) -> Result<(), Error> {
        self.pager.flush_all()
    }

    /// Inserts a row keyed by its id.
    ///
    /// # Errors
    /// Returns `Error::DuplicateKey` if the id is already present; the tree is
    /// left untouched in that case.
    pub fn insert(&mut self, row: &Row) -> Result<(), Error> {
        let key = row.id;
        let value = row.encode()?;
        debug!(row_id = key, "Inserting a row...");

        let (cursor, found) = Cursor::find(self, key)?;
        if found {
            return Err(Error::DuplicateKey(key));
        }
        let page_num = cursor.page_num;
        let cell_num = cursor.cell_num;

        let node = self.pager.get_page(page_num)?;
        let num_cells = node.leaf_node_num_cells()?;
        if num_cells as usize >= LEAF_NODE_MAX_CELLS {
            return self.leaf_node_split_and_insert(page_num, cell_num, key, &value);
        }

        node.leaf_node_make_room(cell_num)?;
        node.set_leaf_node_entry(cell_num, key, &value)?;
        node.set_leaf_node_num_cells(num_cells + 1)?;
        Ok(())
    }

    /// Returns every row in ascending key order.
    pub fn select(&mut self) -> Result<Vec<Row>, Error> {
        let max_rows = self.pager.num_pages() as usize * LEAF_NODE_MAX_CELLS;
        let mut rows = Vec::new();
        let mut cursor = Cursor::start(self)?;
        while !cursor.end_of_table {
            if rows.len() >= max_rows {
                return Err(err!(Storage, "Leaf chain revisits a page. Corrupt sibling pointers."));
            }
            rows.push(cursor.value()?);
            cursor.advance()?;
        }
        Ok(rows)
    }

    /// Create a new node and move half the cells over.
    /// Insert the new value in one of the two nodes.
    /// Update parent or create a new parent.
    fn leaf_node_split_and_insert(
        &mut self,
        page_num: u32,
        cell_num: u32,
        key: u32,
        value: &[u8],
    ) -> Result<(), Error> {
        trace!(page_num, "Splitting leaf node...");

        // All existing cells plus the new one, in key order.
        let old_node = self.pager.get_page(page_num)?.clone();
        let num_cells = old_node.leaf_node_num_cells()?;
        let mut cells: Vec<Vec<u8>> = Vec::with_capacity(num_cells as usize + 1);
        for i in 0..num_cells {
            cells.push(old_node.leaf_node_cell(i)?.to_vec());
        }
        let mut new_cell = key.to_le_bytes().to_vec();
        new_cell.extend_from_slice(value);
        cells.insert(cell_num as usize, new_cell);

        let new_page_num = self.pager.allocate_page()?;

        // The old node keeps the lower half, the new node receives the upper half.
        let (left_cells, right_cells) = cells.split_at(LEAF_NODE_LEFT_SPLIT_COUNT);

        {
            let new_node = self.pager.get_page(new_page_num)?;
            new_node.initialize_leaf_node();
            new_node.set_node_parent(old_node.node_parent());
            // Whenever we split a leaf node, update the sibling pointers.
            // The old leaf’s sibling becomes the new leaf, and the new leaf’s sibling becomes
            // whatever used to be the old leaf’s sibling.
            new_node.set_leaf_node_next_leaf(old_node.leaf_node_next_leaf()?)?;
            for (i, cell) in right_cells.iter().enumerate() {
                new_node.set_leaf_node_cell(i as u32, cell)?;
            }
            new_node.set_leaf_node_num_cells(right_cells.len() as u32)?;
        }

        {
            let old_node = self.pager.get_page(page_num)?;
            old_node.set_leaf_node_next_leaf(new_page_num)?;
            for (i, cell) in left_cells.iter().enumerate() {
                old_node.set_leaf_node_cell(i as u32, cell)?;
            }
            old_node.set_leaf_node_num_cells(left_cells.len() as u32)?;
        }

        debug!(
            left = page_num,
            right = new_page_num,
            "Split leaf node"
        );
        self.promote(page_num, new_page_num)
    }

    /// Hooks a freshly split right sibling into the tree, splitting ancestors
    /// as long as they overflow.
    fn promote(&mut self, mut left: u32, mut right: u32) -> Result<(), Error> {
        loop {
            // If the original node was the root, it had no parent.
            // In that case, create a new root node to act as the parent.
            if self.pager.get_page(left)?.is_node_root() {
                return self.create_new_root(right);
            }

            let parent = self.pager.get_page(left)?.node_parent();
            match self.internal_node_insert(parent, left, right)? {
                Promotion::Absorbed => return Ok(()),
                Promotion::Split {
                    left: parent_left,
                    right: parent_right,
                } => {
                    left = parent_left;
                    right = parent_right;
                }
            }
        }
    }

    /// Adds `right` to `parent` directly after its split sibling `left`.
    ///
    /// The key of `left` is recomputed since it just lost its upper half. If
    /// the parent overflows, it keeps the lower half of its children and the
    /// rest move to a new internal page.
    fn internal_node_insert(&mut self, parent: u32, left: u32, right: u32) -> Result<Promotion, Error> {
        let parent_node = self.pager.get_page(parent)?.clone();
        let num_keys = parent_node.internal_node_num_keys()?;

        let mut children: Vec<(u32, u32)> = Vec::with_capacity(num_keys as usize + 2);
        for i in 0..num_keys {
            children.push((
                parent_node.internal_node_child(i)?,
                parent_node.internal_node_key(i)?,
            ));
        }
        let right_child = parent_node.internal_node_right_child()?;
        children.push((right_child, self.max_key(right_child)?));

        let Some(index) = children.iter().position(|(page, _)| *page == left) else {
            return Err(err!(
                Storage,
                "Page {} is not a child of page {}",
                left,
                parent
            ));
        };
        children[index].1 = self.max_key(left)?;
        children.insert(index + 1, (right, self.max_key(right)?));

        if children.len() <= INTERNAL_NODE_MAX_KEYS + 1 {
            self.pager
                .get_page(parent)?
                .set_internal_node_children(&children)?;
            self.pager.get_page(right)?.set_node_parent(parent);
            return Ok(Promotion::Absorbed);
        }

        trace!(page_num = parent, "Splitting internal node...");
        let split_at = (children.len() + 1) / 2;
        let (left_children, right_children) = children.split_at(split_at);

        let new_page_num = self.pager.allocate_page()?;
        {
            let new_node = self.pager.get_page(new_page_num)?;
            new_node.initialize_internal_node();
            new_node.set_node_parent(parent_node.node_parent());
            new_node.set_internal_node_children(right_children)?;
        }
        {
            let parent_node = self.pager.get_page(parent)?;
            parent_node.set_internal_node_children(left_children)?;
        }

        for (child, _) in left_children {
            self.pager.get_page(*child)?.set_node_parent(parent);
        }
        for (child, _) in right_children {
            self.pager.get_page(*child)?.set_node_parent(new_page_num);
        }

        debug!(
            left = parent,
            right = new_page_num,
            "Split internal node"
        );
        Ok(Promotion::Split {
            left: parent,
            right: new_page_num,
        })
    }

    // Creating a New Root
    // Let N be the root node. First allocate two nodes, say L and R. Move lower half of N into L
    // and the upper half into R. Now N is empty. Add 〈L, K,R〉 in N, where K is the max key in L.
    // Page N remains the root. Note that the depth of the tree has increased by one, but the new
    // tree remains height balanced without violating any B+-tree property.
    // At this point, we’ve already allocated the right child and moved the upper half into it.
    // This function takes the right child as input and allocates a new page to store the left child.
    fn create_new_root(&mut self, right_child_page_num: u32) -> Result<(), Error> {
        let root_page_num = self.root_page_num;
        let left_child_page_num = self.pager.allocate_page()?;

        // The old root is copied to the left child so we can reuse the root page
        let mut left_child: Node = self.pager.get_page(root_page_num)?.clone();
        left_child.set_node_root(false);
        left_child.set_node_parent(root_page_num);
        if left_child.get_node_type()? == NodeType::NodeInternal {
            for child in left_child.internal_node_children()? {
                self.pager
                    .get_page(child)?
                    .set_node_parent(left_child_page_num);
            }
        }
        *self.pager.get_page(left_child_page_num)? = left_child;

        // The max key of the left child is only valid once its subtree is in place.
        let left_child_max_key = self.max_key(left_child_page_num)?;

        // Finally we initialize the root page as a new internal node with two children.
        let root = self.pager.get_page(root_page_num)?;
        root.initialize_internal_node();
        root.set_node_root(true);
        root.set_internal_node_children(&[
            (left_child_page_num, left_child_max_key),
            (right_child_page_num, 0),
        ])?;

        self.pager
            .get_page(right_child_page_num)?
            .set_node_parent(root_page_num);

        info!(
            left = left_child_page_num,
            right = right_child_page_num,
            "Created a new root"
        );
        Ok(())
    }

    /// Returns the largest key stored under `page_num`.
    ///
    /// The maximum of an internal node lives in its rightmost leaf.
    pub fn max_key(&mut self, page_num: u32) -> Result<u32, Error> {
        let mut page_num = page_num;
        let max_depth = self.pager.num_pages();
        for _ in 0..max_depth {
            let node = self.pager.get_page(page_num)?;
            match node.get_node_type()? {
                NodeType::NodeInternal => page_num = node.internal_node_right_child()?,
                NodeType::NodeLeaf => {
                    let num_cells = node.leaf_node_num_cells()?;
                    if num_cells == 0 {
                        return Err(err!(Storage, "Leaf page {} is empty", page_num));
                    }
                    return node.leaf_node_key(num_cells - 1);
                }
            }
        }
        Err(descent_too_deep(max_depth))
    }

    /// Renders the tree in pre-order, one line per node header, key or separator.
    pub fn tree_lines(&mut self) -> Result<Vec<String>, Error> {
        let mut lines = Vec::new();
        self.dump_node(self.root_page_num, 0, &mut lines)?;
        Ok(lines)
    }

    fn dump_node(&mut self, page_num: u32, depth: usize, lines: &mut Vec<String>) -> Result<(), Error> {
        if depth >= self.pager.num_pages() as usize {
            return Err(descent_too_deep(self.pager.num_pages()));
        }
        let indent = "  ".repeat(depth);
        let node = self.pager.get_page(page_num)?.clone();
        match node.get_node_type()? {
            NodeType::NodeLeaf => {
                let num_cells = node.leaf_node_num_cells()?;
                lines.push(format!("{}- leaf (size {})", indent, num_cells));
                for i in 0..num_cells {
                    lines.push(format!("{}  - {}", indent, node.leaf_node_key(i)?));
                }
            }
            NodeType::NodeInternal => {
                let num_keys = node.internal_node_num_keys()?;
                lines.push(format!("{}- internal (size {})", indent, num_keys));
                for i in 0..num_keys {
                    self.dump_node(node.internal_node_child(i)?, depth + 1, lines)?;
                    lines.push(format!("{}  - key {}", indent, node.internal_node_key(i)?));
                }
                self.dump_node(node.internal_node_right_child()?, depth + 1, lines)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::pager::PAGE_SIZE;
    use super::*;
    use tempfile::TempDir;

    fn row(id: u32) -> Row {
        Row::new(id, &format!("user{}", id), &format!("person{}@example.com", id)).unwrap()
    }

    fn open_table(dir: &TempDir) -> Table {
        Table::open(&dir.path().join("test.db")).unwrap()
    }

    fn ids(table: &mut Table) -> Vec<u32> {
        table.select().unwrap().iter().map(|r| r.id).collect()
    }

    /// Walks the whole tree checking ordering, parent links, separator keys,
    /// capacities and the leaf sibling chain.
    fn check_invariants(table: &mut Table) {
        let mut leaves = Vec::new();
        check_node(table, table.root_page_num, None, &mut leaves);

        let mut page_num = leaves[0];
        let mut chain = vec![page_num];
        loop {
            let next = table
                .pager
                .get_page(page_num)
                .unwrap()
                .leaf_node_next_leaf()
                .unwrap();
            if next == 0 {
                break;
            }
            chain.push(next);
            page_num = next;
        }
        assert_eq!(chain, leaves, "sibling chain must visit leaves left to right");
    }

    fn check_node(table: &mut Table, page_num: u32, parent: Option<u32>, leaves: &mut Vec<u32>) {
        let node = table.pager.get_page(page_num).unwrap().clone();
        match parent {
            None => assert!(node.is_node_root()),
            Some(parent) => {
                assert!(!node.is_node_root());
                assert_eq!(node.node_parent(), parent, "parent of page {}", page_num);
            }
        }

        match node.get_node_type().unwrap() {
            NodeType::NodeLeaf => {
                let num_cells = node.leaf_node_num_cells().unwrap();
                let keys: Vec<u32> = (0..num_cells)
                    .map(|i| node.leaf_node_key(i).unwrap())
                    .collect();
                assert!(keys.windows(2).all(|w| w[0] < w[1]));
                leaves.push(page_num);
            }
            NodeType::NodeInternal => {
                let num_keys = node.internal_node_num_keys().unwrap();
                assert!(num_keys >= 1);
                assert!(num_keys as usize <= INTERNAL_NODE_MAX_KEYS);
                let mut previous = None;
                for i in 0..num_keys {
                    let child = node.internal_node_child(i).unwrap();
                    let key = node.internal_node_key(i).unwrap();
                    assert_eq!(table.max_key(child).unwrap(), key);
                    if let Some(previous) = previous {
                        assert!(previous < key);
                    }
                    previous = Some(key);
                    check_node(table, child, Some(page_num), leaves);
                }
                let right_child = node.internal_node_right_child().unwrap();
                assert!(table.max_key(right_child).unwrap() > previous.unwrap());
                check_node(table, right_child, Some(page_num), leaves);
            }
        }
    }

    #[test]
    fn test_new_table_is_empty_leaf() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        assert_eq!(table.pager.num_pages(), 1);
        assert!(table.select().unwrap().is_empty());
        assert_eq!(table.tree_lines().unwrap(), vec!["- leaf (size 0)"]);
    }

    #[test]
    fn test_insert_and_select() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        table.insert(&row(1)).unwrap();

        let rows = table.select().unwrap();
        assert_eq!(rows, vec![row(1)]);
    }

    #[test]
    fn test_single_leaf_holds_max_cells() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in 1..=13 {
            table.insert(&row(id)).unwrap();
        }

        assert_eq!(table.pager.num_pages(), 1);
        let lines = table.tree_lines().unwrap();
        assert_eq!(lines[0], "- leaf (size 13)");
        assert_eq!(lines.len(), 14);
        assert_eq!(ids(&mut table), (1..=13).collect::<Vec<_>>());
    }

    #[test]
    fn test_leaf_split_creates_root() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in 1..=14 {
            table.insert(&row(id)).unwrap();
        }

        let mut expected = vec!["- internal (size 1)".to_string(), "  - leaf (size 7)".into()];
        expected.extend((1..=7).map(|k| format!("    - {}", k)));
        expected.push("  - key 7".into());
        expected.push("  - leaf (size 7)".into());
        expected.extend((8..=14).map(|k| format!("    - {}", k)));

        assert_eq!(table.tree_lines().unwrap(), expected);
        assert_eq!(ids(&mut table), (1..=14).collect::<Vec<_>>());
        check_invariants(&mut table);
    }

    #[test]
    fn test_internal_node_absorbs_leaves() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in 1..=28 {
            table.insert(&row(id)).unwrap();
        }

        let lines = table.tree_lines().unwrap();
        assert_eq!(lines[0], "- internal (size 3)");
        let keys: Vec<&String> = lines.iter().filter(|l| l.starts_with("  - key")).collect();
        assert_eq!(keys, vec!["  - key 7", "  - key 14", "  - key 21"]);
        check_invariants(&mut table);
    }

    #[test]
    fn test_internal_split_grows_height() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in 1..=35 {
            table.insert(&row(id)).unwrap();
        }

        let lines = table.tree_lines().unwrap();
        let headers: Vec<&str> = lines
            .iter()
            .filter(|l| l.contains("internal") || l.trim_start().starts_with("- key"))
            .map(|l| l.as_str())
            .collect();
        assert_eq!(
            headers,
            vec![
                "- internal (size 1)",
                "  - internal (size 2)",
                "    - key 7",
                "    - key 14",
                "  - key 21",
                "  - internal (size 1)",
                "    - key 28",
            ]
        );
        assert_eq!(
            lines.iter().filter(|l| l.ends_with("- leaf (size 7)")).count(),
            5
        );
        assert_eq!(ids(&mut table), (1..=35).collect::<Vec<_>>());
        check_invariants(&mut table);
    }

    #[test]
    fn test_descending_inserts() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in (1..=100).rev() {
            table.insert(&row(id)).unwrap();
        }

        assert_eq!(ids(&mut table), (1..=100).collect::<Vec<_>>());
        check_invariants(&mut table);
    }

    #[test]
    fn test_shuffled_inserts() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        // 73 is coprime with 211, so this visits every id in 1..=210 exactly once.
        for i in 1..=210u32 {
            table.insert(&row((i * 73) % 211)).unwrap();
        }

        assert_eq!(ids(&mut table), (1..=210).collect::<Vec<_>>());
        check_invariants(&mut table);
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        table.insert(&row(1)).unwrap();

        let duplicate = Row::new(1, "other", "other@example.com").unwrap();
        assert!(matches!(
            table.insert(&duplicate),
            Err(Error::DuplicateKey(1))
        ));
        assert_eq!(table.select().unwrap(), vec![row(1)]);
    }

    #[test]
    fn test_duplicate_key_after_split() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for id in 1..=40 {
            table.insert(&row(id)).unwrap();
        }
        for id in [1, 7, 8, 21, 40] {
            assert!(matches!(
                table.insert(&row(id)),
                Err(Error::DuplicateKey(_))
            ));
        }
        assert_eq!(ids(&mut table).len(), 40);
    }

    #[test]
    fn test_zeroed_root_page_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        // A zero-filled page reads as an internal root whose right child is itself.
        std::fs::write(&path, vec![0u8; PAGE_SIZE]).unwrap();

        let mut table = Table::open(&path).unwrap();
        assert!(matches!(table.select(), Err(Error::Storage(_))));
        assert!(matches!(table.insert(&row(1)), Err(Error::Storage(_))));
        assert!(matches!(table.tree_lines(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_child_pointer_cycle_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        {
            let mut table = Table::open(&path).unwrap();
            let page_num = table.pager.allocate_page().unwrap();
            let node = table.pager.get_page(page_num).unwrap();
            node.initialize_internal_node();
            node.set_internal_node_children(&[(page_num, 0)]).unwrap();
            let root = table.pager.get_page(0).unwrap();
            root.initialize_internal_node();
            root.set_node_root(true);
            root.set_internal_node_children(&[(page_num, 0)]).unwrap();
            table.close().unwrap();
        }

        let mut table = Table::open(&path).unwrap();
        assert!(matches!(table.select(), Err(Error::Storage(_))));
        assert!(matches!(table.insert(&row(1)), Err(Error::Storage(_))));
        assert!(matches!(table.max_key(0), Err(Error::Storage(_))));
        assert!(matches!(table.tree_lines(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_sibling_cycle_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut table = open_table(&dir);
        for i in 1..=14 {
            table.insert(&row(i)).unwrap();
        }
        let root = table.pager.get_page(0).unwrap();
        let left = root.internal_node_child(0).unwrap();
        let right = root.internal_node_right_child().unwrap();
        // The rightmost leaf points back at the leftmost one.
        table
            .pager
            .get_page(right)
            .unwrap()
            .set_leaf_node_next_leaf(left)
            .unwrap();

        assert!(matches!(table.select(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();
        {
            let mut table = open_table(&dir);
            for id in 1..=50 {
                table.insert(&row(id)).unwrap();
            }
            table.close().unwrap();
        }

        let mut table = open_table(&dir);
        assert_eq!(ids(&mut table), (1..=50).collect::<Vec<_>>());
        check_invariants(&mut table);

        table.insert(&row(51)).unwrap();
        assert!(matches!(table.insert(&row(10)), Err(Error::DuplicateKey(10))));
    }

    #[test]
    fn test_unflushed_changes_are_lost() {
        let dir = TempDir::new().unwrap();
        {
            let mut table = open_table(&dir);
            table.insert(&row(1)).unwrap();
            table.close().unwrap();
            table.insert(&row(2)).unwrap();
        }

        let mut table = open_table(&dir);
        assert_eq!(ids(&mut table), vec![1]);
    }
}
