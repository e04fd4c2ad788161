//! Per-cell attribute arrays

/// Storage of the values of a cell array.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayValues {
    /// Double precision values.
    Float64(Vec<f64>),
    /// Byte values.
    UInt8(Vec<u8>),
}

impl ArrayValues {
    fn len(&self) -> usize {
        match self {
            ArrayValues::Float64(v) => v.len(),
            ArrayValues::UInt8(v) => v.len(),
        }
    }

    fn empty_like(&self) -> Self {
        match self {
            ArrayValues::Float64(_) => ArrayValues::Float64(vec![]),
            ArrayValues::UInt8(_) => ArrayValues::UInt8(vec![]),
        }
    }
}

/// A named array with a fixed number of components per tuple, indexed by global node index.
#[derive(Clone, Debug, PartialEq)]
pub struct CellArray {
    name: String,
    number_of_components: usize,
    values: ArrayValues,
}

impl CellArray {
    /// Create an empty array of doubles.
    pub fn new_f64(name: &str, number_of_components: usize) -> Self {
        Self::new(name, number_of_components, ArrayValues::Float64(vec![]))
    }

    /// Create an empty array of bytes.
    pub fn new_u8(name: &str, number_of_components: usize) -> Self {
        Self::new(name, number_of_components, ArrayValues::UInt8(vec![]))
    }

    /// Create an array from flat values, tuple after tuple.
    pub fn new(name: &str, number_of_components: usize, values: ArrayValues) -> Self {
        assert!(number_of_components > 0, "An array needs at least one component");
        assert_eq!(
            values.len() % number_of_components,
            0,
            "Values do not fill a whole number of tuples"
        );
        Self {
            name: name.to_string(),
            number_of_components,
            values,
        }
    }

    /// Name of the array.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of components of each tuple.
    pub fn number_of_components(&self) -> usize {
        self.number_of_components
    }

    /// Number of tuples stored.
    pub fn number_of_tuples(&self) -> usize {
        self.values.len() / self.number_of_components
    }

    /// Raw values.
    pub fn values(&self) -> &ArrayValues {
        &self.values
    }

    /// Values if the array stores doubles.
    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.values {
            ArrayValues::Float64(v) => Some(v),
            ArrayValues::UInt8(_) => None,
        }
    }

    /// Values if the array stores bytes.
    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.values {
            ArrayValues::UInt8(v) => Some(v),
            ArrayValues::Float64(_) => None,
        }
    }

    /// Resize to `n` tuples, new tuples are zero.
    pub fn set_number_of_tuples(&mut self, n: usize) {
        let len = n * self.number_of_components;
        match &mut self.values {
            ArrayValues::Float64(v) => v.resize(len, 0.0),
            ArrayValues::UInt8(v) => v.resize(len, 0),
        }
    }

    /// Component `component` of tuple `tuple`, converted to a double.
    pub fn component(&self, tuple: usize, component: usize) -> f64 {
        let i = tuple * self.number_of_components + component;
        match &self.values {
            ArrayValues::Float64(v) => v[i],
            ArrayValues::UInt8(v) => v[i] as f64,
        }
    }

    /// Set component `component` of tuple `tuple`, growing the array if the tuple does not exist.
    pub fn insert_component(&mut self, tuple: usize, component: usize, value: f64) {
        assert!(component < self.number_of_components);
        if tuple >= self.number_of_tuples() {
            self.set_number_of_tuples(tuple + 1);
        }
        let i = tuple * self.number_of_components + component;
        match &mut self.values {
            ArrayValues::Float64(v) => v[i] = value,
            ArrayValues::UInt8(v) => v[i] = value as u8,
        }
    }

    /// Smallest and largest value of a component, `None` for an empty array.
    pub fn range(&self, component: usize) -> Option<(f64, f64)> {
        (0..self.number_of_tuples())
            .map(|t| self.component(t, component))
            .fold(None, |acc, x| match acc {
                None => Some((x, x)),
                Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
            })
    }

    /// An array with the same name, type and number of components, but no tuples.
    pub fn copy_empty(&self) -> Self {
        Self {
            name: self.name.clone(),
            number_of_components: self.number_of_components,
            values: self.values.empty_like(),
        }
    }
}

/// The set of cell arrays of a grid, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellData {
    arrays: Vec<CellArray>,
}

impl CellData {
    /// Create an empty set of arrays.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an array, replacing any array with the same name.
    pub fn add_array(&mut self, array: CellArray) {
        match self.arrays.iter_mut().find(|a| a.name == array.name) {
            Some(existing) => *existing = array,
            None => self.arrays.push(array),
        }
    }

    /// Number of arrays.
    pub fn number_of_arrays(&self) -> usize {
        self.arrays.len()
    }

    /// Array by position.
    pub fn array_by_index(&self, index: usize) -> Option<&CellArray> {
        self.arrays.get(index)
    }

    /// Mutable array by position.
    pub fn array_by_index_mut(&mut self, index: usize) -> Option<&mut CellArray> {
        self.arrays.get_mut(index)
    }

    /// Array by name.
    pub fn array(&self, name: &str) -> Option<&CellArray> {
        self.arrays.iter().find(|a| a.name == name)
    }

    /// Mutable array by name.
    pub fn array_mut(&mut self, name: &str) -> Option<&mut CellArray> {
        self.arrays.iter_mut().find(|a| a.name == name)
    }

    /// Iterate over the arrays.
    pub fn iter(&self) -> impl Iterator<Item = &CellArray> {
        self.arrays.iter()
    }

    /// Iterate mutably over the arrays.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CellArray> {
        self.arrays.iter_mut()
    }

    /// Sum of the number of components over all arrays.
    pub fn number_of_components(&self) -> usize {
        self.arrays.iter().map(|a| a.number_of_components).sum()
    }

    /// The same arrays without any tuples.
    pub fn copy_empty(&self) -> Self {
        Self {
            arrays: self.arrays.iter().map(|a| a.copy_empty()).collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_insert_component_grows() {
        let mut array = CellArray::new_f64("Velocity", 3);
        array.insert_component(2, 1, 4.5);
        assert_eq!(array.number_of_tuples(), 3);
        assert_eq!(array.component(2, 1), 4.5);
        assert_eq!(array.component(0, 0), 0.0);
    }

    #[test]
    fn test_u8_array() {
        let mut array = CellArray::new_u8("Flags", 1);
        array.insert_component(4, 0, 1.0);
        assert_eq!(array.as_u8().unwrap(), &[0, 0, 0, 0, 1]);
        assert_eq!(array.range(0), Some((0.0, 1.0)));
    }

    #[test]
    fn test_add_array_replaces() {
        let mut data = CellData::new();
        data.add_array(CellArray::new_f64("Depth", 1));
        data.add_array(CellArray::new_f64("Velocity", 3));
        data.add_array(CellArray::new(
            "Depth",
            1,
            ArrayValues::Float64(vec![1.0, 2.0]),
        ));
        assert_eq!(data.number_of_arrays(), 2);
        assert_eq!(data.array("Depth").unwrap().number_of_tuples(), 2);
        assert_eq!(data.array_by_index(1).unwrap().name(), "Velocity");
        assert_eq!(data.number_of_components(), 4);

        let empty = data.copy_empty();
        assert_eq!(empty.number_of_arrays(), 2);
        assert_eq!(empty.array("Depth").unwrap().number_of_tuples(), 0);
    }
}
