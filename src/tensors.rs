//! Core tensor data structures.
//!
//! # Tensor Buffers
//!
//! Layers never allocate the buffers they compute into. The caller hands in
//! [`Tensor`]s that are already shaped, and kernels read and write them row by
//! row.
//!
//! ## Layout
//! - Row-major, flat `data` with a `shape` describing it
//! - The trailing dimension is the feature axis
//! - Every leading dimension is folded into the batch, so a `[4, 3]` tensor is
//!   four samples of three features and a `[3]` tensor is a single sample
//!
//! ## Example
//!
//! ```rust
//! use fc_core::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.batch_size(), 2);
//! assert_eq!(t.row(1), &[4.0, 5.0, 6.0]);
//! ```

use core::fmt;

/// The float stored in tensors (`f32`).
pub type TensorFloat = f32;

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tensor {
    /// Extent of every dimension.
    pub shape: Vec<usize>,
    /// Flattened row-major values.
    pub data: Vec<TensorFloat>,
}

impl Tensor {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<TensorFloat>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Creates a zero-filled tensor of the given shape.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    /// Number of elements along the trailing (feature) dimension.
    ///
    /// A rank-0 tensor has a single feature.
    #[must_use]
    pub fn features(&self) -> usize {
        self.shape.last().copied().unwrap_or(1)
    }

    /// Number of samples, i.e. the product of every leading dimension.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        match self.features() {
            0 => 0,
            n => self.data.len() / n,
        }
    }

    /// Borrows the features of sample `i`.
    ///
    /// # Panics
    /// Panics if `i` is not a valid sample index.
    #[must_use]
    pub fn row(&self, i: usize) -> &[TensorFloat] {
        let n = self.features();
        &self.data[i * n..(i + 1) * n]
    }

    /// Mutably borrows the features of sample `i`.
    ///
    /// # Panics
    /// Panics if `i` is not a valid sample index.
    pub fn row_mut(&mut self, i: usize) -> &mut [TensorFloat] {
        let n = self.features();
        &mut self.data[i * n..(i + 1) * n]
    }

    /// Sets every element to zero, keeping the allocation.
    pub fn fill_zero(&mut self) {
        self.data.fill(0.0);
    }

    /// Replaces this tensor's data with another tensor of the same shape.
    ///
    /// # Panics
    /// Panics if shapes do not match.
    pub fn update(&mut self, mut other: Tensor) {
        assert_eq!(self.shape, other.shape, "shape mismatch");
        std::mem::swap(&mut self.data, &mut other.data);
    }
}

/// Extents of a layer's input or output in `(width, height, depth)` form.
///
/// Fully-connected layers report `(features, 1, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Shape3d {
    /// Innermost extent.
    pub width: usize,
    /// Middle extent.
    pub height: usize,
    /// Outermost extent (channels).
    pub depth: usize,
}

impl Shape3d {
    /// Builds a shape from its three extents.
    #[must_use]
    pub const fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Total element count.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.width * self.height * self.depth
    }
}

impl fmt::Display for Shape3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use fc_core::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    // innermost row; `literal` also accepts negative numbers
    ([ $( $lit:literal ),+ $(,)? ]) => {{
        let data = vec![ $( $lit ),+ ];
        $crate::tensors::Tensor::new(vec![data.len()], data)
    }};

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}
