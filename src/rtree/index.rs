use std::marker::PhantomData;

use log::debug;

use crate::error::{RTreeError, Result};
use crate::r#type::IndexableNum;
use crate::rtree::constants::{HEADER_BYTE_LENGTH, MAX_HEIGHT, RTREE_MAGIC, VERSION};
use crate::rtree::cursor::{read_at, NodeCursor};

/// Metadata read from the header of a serialized tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RTreeMetadata<N: IndexableNum> {
    height: u16,
    root_offset: usize,
    phantom: PhantomData<N>,
}

impl<N: IndexableNum> RTreeMetadata<N> {
    /// Parse and validate the header of `data`.
    ///
    /// Besides the magic byte, format version and scalar type, this checks that the root offset
    /// points at a well-formed node record.
    pub fn try_new(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_BYTE_LENGTH {
            return Err(RTreeError::General(format!(
                "Buffer of {} bytes is too short for a header.",
                data.len()
            )));
        }

        let magic = data[0];
        if magic != RTREE_MAGIC {
            return Err(RTreeError::General(
                "Data not in serialized RTree format.".to_string(),
            ));
        }

        let version_and_type = data[1];
        let version = version_and_type >> 4;
        if version != VERSION {
            return Err(RTreeError::General(format!(
                "Got v{} data when expected v{}.",
                version, VERSION
            )));
        }

        let type_ = version_and_type & 0x0f;
        if type_ != N::TYPE_INDEX {
            return Err(RTreeError::General(format!(
                "Got type {} data when expected type {}.",
                type_,
                N::TYPE_INDEX
            )));
        }

        let height: u16 = read_at(data, 2)?;
        let root_offset: u32 = read_at(data, 4)?;
        let root_offset = root_offset as usize;
        if height == 0 {
            return Err(RTreeError::General("Tree height must be at least 1.".to_string()));
        }
        if height > MAX_HEIGHT {
            return Err(RTreeError::General(format!(
                "Tree height {} exceeds the maximum of {}.",
                height, MAX_HEIGHT
            )));
        }
        if root_offset < HEADER_BYTE_LENGTH {
            return Err(RTreeError::MalformedNode {
                offset: root_offset,
            });
        }
        NodeCursor::<N>::at(data, root_offset)?;

        debug!(
            "opened tree of {} bytes, height {}, root at offset {}",
            data.len(),
            height,
            root_offset
        );

        Ok(Self {
            height,
            root_offset,
            phantom: PhantomData,
        })
    }

    /// Number of levels, counting the root and the leaves.
    pub fn height(&self) -> usize {
        self.height as usize
    }

    pub fn root_offset(&self) -> usize {
        self.root_offset
    }
}

/// An owned serialized tree.
///
/// Usually this will be created from scratch via [`RTreeWriter`][crate::rtree::RTreeWriter].
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedRTree<N: IndexableNum> {
    pub(crate) buffer: Vec<u8>,
    pub(crate) metadata: RTreeMetadata<N>,
}

impl<N: IndexableNum> SerializedRTree<N> {
    pub fn try_new(buffer: Vec<u8>) -> Result<Self> {
        let metadata = RTreeMetadata::try_new(&buffer)?;
        Ok(Self { buffer, metadata })
    }

    pub(crate) fn from_parts(buffer: Vec<u8>, metadata: RTreeMetadata<N>) -> Self {
        Self { buffer, metadata }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    pub fn as_rtree_ref(&self) -> SerializedRTreeRef<'_, N> {
        SerializedRTreeRef {
            data: &self.buffer,
            metadata: self.metadata,
        }
    }
}

impl<N: IndexableNum> AsRef<[u8]> for SerializedRTree<N> {
    fn as_ref(&self) -> &[u8] {
        &self.buffer
    }
}

/// A reference on an external serialized tree buffer.
///
/// Usually this will be created from a [`SerializedRTree`] via its
/// [`as_rtree_ref`][SerializedRTree::as_rtree_ref] method, but it can also be created from any
/// existing data buffer, such as a memory map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SerializedRTreeRef<'a, N: IndexableNum> {
    pub(crate) data: &'a [u8],
    pub(crate) metadata: RTreeMetadata<N>,
}

impl<'a, N: IndexableNum> SerializedRTreeRef<'a, N> {
    pub fn try_new<T: AsRef<[u8]>>(data: &'a T) -> Result<Self> {
        let data = data.as_ref();
        let metadata = RTreeMetadata::try_new(data)?;
        Ok(Self { data, metadata })
    }
}
