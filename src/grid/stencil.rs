//! The 3^D neighbourhood of a lattice cell and the direction masks built on it.
//!
//! An offset `o` in `{-1, 0, 1}^D` has stencil index `sum_a (o_a + 1) * 3^a`, and is encoded in a
//! direction mask as the bit `31 - index`, so a 3D stencil uses the 27 most significant bits.
use itertools::Itertools;

/// An offset to a neighbouring lattice cell, unused axes are zero.
pub type Offset = [isize; 3];

/// Linear index of `offset` in the stencil of a `dimension`-dimensional lattice.
pub fn stencil_index(offset: &Offset, dimension: usize) -> usize {
    let mut index = 0;
    let mut stride = 1;
    for o in offset.iter().take(dimension) {
        index += ((o + 1) as usize) * stride;
        stride *= 3;
    }
    index
}

/// Bit of a direction mask that stands for `offset`.
pub fn direction_bit(offset: &Offset, dimension: usize) -> u32 {
    1u32 << (31 - stencil_index(offset, dimension))
}

/// All `3^dimension - 1` offsets to neighbouring cells, in increasing stencil index.
pub fn neighbour_offsets(dimension: usize) -> impl Iterator<Item = Offset> {
    (0..dimension)
        .map(|_| -1isize..=1)
        .multi_cartesian_product()
        .map(move |o| {
            // multi_cartesian_product varies the last axis fastest, stencil indices the first
            let mut offset = [0; 3];
            for (a, v) in o.iter().rev().enumerate() {
                offset[a] = *v;
            }
            offset
        })
        .filter(|offset| offset.iter().any(|&o| o != 0))
}

/// Coordinates of child `ichild` inside its parent, first axis varying fastest.
pub fn child_coordinates(ichild: usize, dimension: usize, branch_factor: usize) -> [usize; 3] {
    let mut coordinates = [0; 3];
    let mut rest = ichild;
    for c in coordinates.iter_mut().take(dimension) {
        *c = rest % branch_factor;
        rest /= branch_factor;
    }
    coordinates
}

/// Direction masks of every child of a coarse node.
///
/// Child `i` has bit `d` set when the child touches the face, edge or corner of its parent in
/// direction `d`, so a subtree only needs to be shared along the directions in the mask of its
/// root.
pub fn child_masks(dimension: usize, branch_factor: usize) -> Vec<u32> {
    let number_of_children = branch_factor.pow(dimension as u32);
    (0..number_of_children)
        .map(|ichild| {
            let c = child_coordinates(ichild, dimension, branch_factor);
            neighbour_offsets(dimension)
                .filter(|offset| {
                    (0..dimension).all(|a| match offset[a] {
                        -1 => c[a] == 0,
                        1 => c[a] == branch_factor - 1,
                        _ => true,
                    })
                })
                .fold(0u32, |mask, offset| mask | direction_bit(&offset, dimension))
        })
        .collect()
}
