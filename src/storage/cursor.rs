use super::btree::NodeType;
use super::row::Row;
use super::table::Table;
use crate::errors::Error;

/// A position in the table: a cell of a leaf page.
///
/// Scans walk the sibling chain of leaves, so a full scan never revisits
/// internal nodes after the first descent.
pub struct Cursor<'a> {
    pub table: &'a mut Table,
    pub page_num: u32,
    pub cell_num: u32,
    // Indicates a position one past the last element
    pub end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Positions the cursor on the first row of the leftmost leaf.
    pub fn start(table: &'a mut Table) -> Result<Self, Error> {
        let mut page_num = table.root_page_num;
        let max_depth = table.pager.num_pages();
        for _ in 0..max_depth {
            let node = table.pager.get_page(page_num)?;
            match node.get_node_type()? {
                NodeType::NodeInternal => page_num = node.internal_node_child(0)?,
                NodeType::NodeLeaf => {
                    let end_of_table = node.leaf_node_num_cells()? == 0;
                    return Ok(Cursor {
                        table,
                        page_num,
                        cell_num: 0,
                        end_of_table,
                    });
                }
            }
        }
        Err(descent_too_deep(max_depth))
    }

    /// Returns the position of `key`, or the position where it should be
    /// inserted, together with whether the key is already present.
    pub fn find(table: &'a mut Table, key: u32) -> Result<(Self, bool), Error> {
        let mut page_num = table.root_page_num;
        let max_depth = table.pager.num_pages();
        for _ in 0..max_depth {
            let node = table.pager.get_page(page_num)?;
            match node.get_node_type()? {
                NodeType::NodeInternal => {
                    let child_index = node.internal_node_find_child(key)?;
                    page_num = node.internal_node_child(child_index)?;
                }
                NodeType::NodeLeaf => {
                    let num_cells = node.leaf_node_num_cells()?;
                    let cell_num = node.leaf_node_find(key)?;
                    let found = cell_num < num_cells && node.leaf_node_key(cell_num)? == key;
                    return Ok((
                        Cursor {
                            table,
                            page_num,
                            cell_num,
                            end_of_table: cell_num >= num_cells,
                        },
                        found,
                    ));
                }
            }
        }
        Err(descent_too_deep(max_depth))
    }

    /// Decodes the row under the cursor.
    pub fn value(&mut self) -> Result<Row, Error> {
        let node = self.table.pager.get_page(self.page_num)?;
        Row::decode(node.leaf_node_value(self.cell_num)?)
    }

    /// Moves to the next row, following the sibling pointer at the end of a leaf.
    pub fn advance(&mut self) -> Result<(), Error> {
        let node = self.table.pager.get_page(self.page_num)?;
        self.cell_num += 1;
        if self.cell_num >= node.leaf_node_num_cells()? {
            // Advance to next leaf node
            let next_page_num = node.leaf_node_next_leaf()?;
            if next_page_num == 0 {
                // This was rightmost leaf
                self.end_of_table = true;
            } else {
                self.page_num = next_page_num;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}

/// A descent visits each page at most once, so more steps than pages means
/// the child pointers form a cycle.
pub(super) fn descent_too_deep(max_depth: u32) -> Error {
    err!(
        Storage,
        "No leaf reached after {} pages. Corrupt child pointers.",
        max_depth
    )
}
