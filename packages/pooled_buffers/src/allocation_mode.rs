/// Determines whether freshly rented memory is zeroed before it is handed out.
///
/// Pools reuse arrays, so a rented array may still contain whatever the previous tenant wrote
/// into it. By default the visible region is reset to the element type's default value.
///
/// # Examples
///
/// ```
/// use pooled_buffers::{AllocationMode, MemoryOwner};
///
/// // Zeroed memory, the default.
/// let zeroed = MemoryOwner::<u8>::allocate(64, AllocationMode::Clear).unwrap();
/// assert!(zeroed.span().unwrap().iter().all(|b| *b == 0));
///
/// // Skips the fill. Contents are whatever the pool had lying around.
/// let stale = MemoryOwner::<u8>::allocate(64, AllocationMode::Uninitialized).unwrap();
/// assert_eq!(stale.len().unwrap(), 64);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum AllocationMode {
    /// The visible region is filled with `T::default()` after renting. This is the default.
    #[default]
    Clear,

    /// The visible region is returned as rented, possibly holding data from a previous tenant.
    ///
    /// This avoids the cost of the fill for callers that overwrite the whole region anyway.
    Uninitialized,
}
