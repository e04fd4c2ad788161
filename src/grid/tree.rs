//! Storage of a single hyper tree

/// A recursively refined tree rooted at one cell of the coarse lattice.
///
/// Nodes are stored in an arena and addressed by their local index, the root being node 0.
/// The `number_of_children` children of a coarse node are stored contiguously starting at
/// its elder child index, so no node needs a pointer back to its parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HyperTree {
    tree_index: usize,
    number_of_children: usize,
    elder_child: Vec<Option<usize>>,
    number_of_levels: usize,
    global_index_start: usize,
    global_index_table: Option<Vec<usize>>,
}

impl HyperTree {
    /// Create a tree made of a single leaf.
    pub fn new(tree_index: usize, number_of_children: usize) -> Self {
        assert!(
            number_of_children >= 2,
            "A tree needs at least two children per coarse node"
        );
        Self {
            tree_index,
            number_of_children,
            elder_child: vec![None],
            number_of_levels: 1,
            global_index_start: 0,
            global_index_table: None,
        }
    }

    /// Index of the tree in the coarse lattice.
    pub fn tree_index(&self) -> usize {
        self.tree_index
    }

    /// Number of children of every coarse node.
    pub fn number_of_children(&self) -> usize {
        self.number_of_children
    }

    /// Number of nodes (leaves and coarse nodes) in the tree.
    pub fn number_of_vertices(&self) -> usize {
        self.elder_child.len()
    }

    /// Number of coarse nodes.
    pub fn number_of_nodes(&self) -> usize {
        self.elder_child.iter().filter(|c| c.is_some()).count()
    }

    /// Number of leaves.
    pub fn number_of_leaves(&self) -> usize {
        self.number_of_vertices() - self.number_of_nodes()
    }

    /// Number of levels, a single leaf tree has one level.
    pub fn number_of_levels(&self) -> usize {
        self.number_of_levels
    }

    /// Whether node `index` has no children.
    pub fn is_leaf(&self, index: usize) -> bool {
        self.elder_child[index].is_none()
    }

    /// Local index of the first child of node `index`.
    pub fn elder_child_index(&self, index: usize) -> Option<usize> {
        self.elder_child[index]
    }

    /// Local index of child `ichild` of the coarse node `index`.
    pub fn child_index(&self, index: usize, ichild: usize) -> usize {
        assert!(
            ichild < self.number_of_children,
            "Child {ichild} out of range for {} children",
            self.number_of_children
        );
        match self.elder_child[index] {
            Some(elder) => elder + ichild,
            None => panic!("Node {index} of tree {} is a leaf", self.tree_index),
        }
    }

    /// Turn the leaf `index` at `level` into a coarse node with freshly allocated children.
    pub fn subdivide_leaf(&mut self, index: usize, level: usize) {
        assert!(
            self.is_leaf(index),
            "Node {index} of tree {} is already coarse",
            self.tree_index
        );
        let elder = self.elder_child.len();
        self.elder_child[index] = Some(elder);
        self.elder_child
            .resize(elder + self.number_of_children, None);
        if let Some(table) = self.global_index_table.as_mut() {
            table.resize(elder + self.number_of_children, usize::MAX);
        }
        self.number_of_levels = self.number_of_levels.max(level + 2);
    }

    /// First global index of the tree when indices are implicit.
    pub fn global_index_start(&self) -> usize {
        self.global_index_start
    }

    /// Number the nodes of the tree `start`, `start + 1`, ... by local index.
    pub fn set_global_index_start(&mut self, start: usize) {
        self.global_index_start = start;
        self.global_index_table = None;
    }

    /// Give node `local` an explicit global index.
    ///
    /// Switches the tree to explicit numbering; nodes not set explicitly keep the index
    /// implied by the current start.
    pub fn set_global_index_from_local(&mut self, local: usize, global: usize) {
        let start = self.global_index_start;
        let len = self.elder_child.len();
        let table = self
            .global_index_table
            .get_or_insert_with(|| (start..start + len).collect());
        if table.len() <= local {
            table.resize(local + 1, usize::MAX);
        }
        table[local] = global;
    }

    /// Global index of node `local`.
    pub fn global_index_from_local(&self, local: usize) -> usize {
        match &self.global_index_table {
            Some(table) => table[local],
            None => self.global_index_start + local,
        }
    }

    /// One past the largest global index used by the tree.
    pub fn global_index_bound(&self) -> usize {
        match &self.global_index_table {
            Some(table) => table
                .iter()
                .filter(|&&g| g != usize::MAX)
                .map(|g| g + 1)
                .max()
                .unwrap_or(0),
            None => self.global_index_start + self.elder_child.len(),
        }
    }
}
