use std::sync::Arc;

use crate::{ArrayPool, MemoryOwner};

/// Contiguous bytes that a [`MemoryStream`][crate::MemoryStream] can be projected over.
///
/// Whether the stream is writable is decided by the memory: read-only memory returns `None`
/// from [`bytes_mut()`][Self::bytes_mut].
pub trait StreamMemory {
    /// The bytes of the region.
    fn bytes(&self) -> &[u8];

    /// The bytes of the region, if the region is writable.
    fn bytes_mut(&mut self) -> Option<&mut [u8]>;

    /// Whether [`bytes_mut()`][Self::bytes_mut] returns `Some`.
    fn is_writable(&self) -> bool;
}

impl StreamMemory for &[u8] {
    #[inline]
    fn bytes(&self) -> &[u8] {
        self
    }

    #[inline]
    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        None
    }

    #[inline]
    fn is_writable(&self) -> bool {
        false
    }
}

impl StreamMemory for Arc<[u8]> {
    #[inline]
    fn bytes(&self) -> &[u8] {
        self
    }

    #[inline]
    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        None
    }

    #[inline]
    fn is_writable(&self) -> bool {
        false
    }
}

impl StreamMemory for &mut [u8] {
    #[inline]
    fn bytes(&self) -> &[u8] {
        self
    }

    #[inline]
    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        Some(&mut **self)
    }

    #[inline]
    fn is_writable(&self) -> bool {
        true
    }
}

impl StreamMemory for Box<[u8]> {
    #[inline]
    fn bytes(&self) -> &[u8] {
        self
    }

    #[inline]
    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        Some(&mut **self)
    }

    #[inline]
    fn is_writable(&self) -> bool {
        true
    }
}

impl StreamMemory for Vec<u8> {
    #[inline]
    fn bytes(&self) -> &[u8] {
        self
    }

    #[inline]
    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        Some(self.as_mut_slice())
    }

    #[inline]
    fn is_writable(&self) -> bool {
        true
    }
}

/// A disposed owner projects as an empty region.
impl<P> StreamMemory for MemoryOwner<u8, P>
where
    P: ArrayPool<u8>,
{
    #[inline]
    fn bytes(&self) -> &[u8] {
        self.span().unwrap_or_default()
    }

    #[inline]
    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        Some(self.span_mut().unwrap_or_default())
    }

    #[inline]
    fn is_writable(&self) -> bool {
        true
    }
}
