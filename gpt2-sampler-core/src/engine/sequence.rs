//! Batch layout helpers.
//!
//! A sample batch is `[batch_size, context_len + generated]`: every row starts
//! with the same conditioning context, followed by that row's continuation.

use ndarray::{s, Array2, ArrayView2};

/// Replicate `context` into `batch_size` identical rows.
pub fn replicate_context(context: &[u32], batch_size: usize) -> Array2<u32> {
    Array2::from_shape_fn((batch_size, context.len()), |(_, j)| context[j])
}

/// Tokens generated strictly after the first `context_len` positions.
pub fn continuation(batch: &Array2<u32>, context_len: usize) -> ArrayView2<'_, u32> {
    let start = context_len.min(batch.ncols());
    batch.slice(s![.., start..])
}

/// Continuation rows as owned token vectors, in batch order.
pub fn continuation_rows(batch: &Array2<u32>, context_len: usize) -> Vec<Vec<u32>> {
    continuation(batch, context_len)
        .rows()
        .into_iter()
        .map(|row| row.to_vec())
        .collect()
}
