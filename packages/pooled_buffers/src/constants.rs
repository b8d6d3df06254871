/// Upper bound on the byte size of any single array this crate will rent or allocate.
///
/// Rust allocations cannot exceed `isize::MAX` bytes.
const MAX_ALLOCATION_BYTES: usize = isize::MAX.unsigned_abs();

/// The largest number of `T` elements that fit in a single allocation.
#[must_use]
pub(crate) const fn max_array_length<T>() -> usize {
    match MAX_ALLOCATION_BYTES.checked_div(size_of::<T>()) {
        Some(length) => length,
        // Zero-sized types never allocate.
        None => usize::MAX,
    }
}
