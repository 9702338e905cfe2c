//! Partition descriptors and the version gate.
//!
//! A [`PartitionDescriptor`] locates the nodes subspace, content subspace,
//! version key, and stamp key of one independent directory tree. Crossing
//! into a nested partition (a node whose layer id is `"partition"`) produces
//! a fresh descriptor rooted at that node's allocated prefix.

use byteorder::{LittleEndian, WriteBytesExt};
use foundationdb::tuple::Subspace;

use crate::allocator::HighContentionAllocator;
use crate::error::DirError;
use crate::txn_state::DirTransaction;

const HCA_KEY_NAME: &[u8] = b"hca";

/// The directory layer's on-disk format version this crate reads and writes.
pub const MAJOR_VERSION: u32 = 1;
pub const MINOR_VERSION: u32 = 0;
pub const PATCH_VERSION: u32 = 0;

const VERSION_KEY_NAME: &[u8] = b"version";
const STAMP_KEY_NAME: &[u8] = b"stamp";

/// Locates the metadata and content of one directory tree (the root
/// Directory Layer, or a nested partition).
#[derive(Debug, Clone)]
pub struct PartitionDescriptor {
    /// Byte prefix under which this partition's application subspaces live.
    pub content: Subspace,
    /// Byte prefix under which this partition's tree metadata lives.
    pub nodes: Subspace,
    /// The root node of this partition: `nodes.subspace(&nodes.bytes())`.
    pub root_node: Subspace,
}

impl PartitionDescriptor {
    /// Builds the root partition descriptor from explicit node/content
    /// prefixes (matching `DirectoryLayer::new`).
    pub fn new(nodes: Subspace, content: Subspace) -> Self {
        let root_node = nodes.subspace(&nodes.bytes().to_vec());
        PartitionDescriptor {
            content,
            nodes,
            root_node,
        }
    }

    /// Builds a nested partition descriptor rooted at `prefix` (the allocated
    /// prefix of the directory whose layer id is `"partition"`).
    pub fn create_child(&self, prefix: Vec<u8>) -> Self {
        let mut node_bytes = prefix.clone();
        node_bytes.extend_from_slice(b"\xFE");
        let nodes = Subspace::from_bytes(&node_bytes);
        let content = Subspace::from_bytes(&prefix);
        Self::new(nodes, content)
    }

    /// `Nodes+encode(Nodes, "version")`.
    pub fn version_key(&self) -> Vec<u8> {
        self.root_node.pack(&VERSION_KEY_NAME.to_vec())
    }

    /// `Nodes+encode(Nodes, "stamp")`.
    pub fn stamp_key(&self) -> Vec<u8> {
        self.root_node.pack(&STAMP_KEY_NAME.to_vec())
    }

    /// Reads the current stamp value, or `0` if this partition was never
    /// initialized (should not happen once [`PartitionDescriptor::check_version`]
    /// has run).
    pub async fn get_stamp_value(&self, trx: &DirTransaction) -> Result<i64, DirError> {
        let key = self.stamp_key();
        match trx.inner().get(&key, false).await? {
            None => Ok(0),
            Some(bytes) => {
                if bytes.len() != 8 {
                    return Err(DirError::IncompatibleLayerVersion(
                        "malformed stamp value".to_string(),
                    ));
                }
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                Ok(i64::from_le_bytes(arr))
            }
        }
    }

    /// Bumps the partition stamp by one, returning the new value. Callers
    /// should use the atomic `Add` mutation rather than read-then-write so
    /// concurrent mutations in the same partition don't spuriously conflict
    /// on the stamp key itself — only readers that cached a specific stamp
    /// value conflict, which is the point of invariant 4.
    pub fn bump_stamp(&self, trx: &DirTransaction) {
        let key = self.stamp_key();
        const ONE: &[u8] = &1i64.to_le_bytes();
        trx.inner()
            .atomic_op(&key, ONE, foundationdb::options::MutationType::Add);
    }

    /// Reads and validates the partition's on-disk version record. If absent
    /// and `allow_creation`, initializes it (version + stamp = 0). If
    /// present, rejects major-version mismatches always, and minor-version
    /// mismatches for writing operations.
    pub async fn check_version(
        &self,
        trx: &DirTransaction,
        allow_creation: bool,
        is_write: bool,
    ) -> Result<(), DirError> {
        let key = self.version_key();
        match trx.inner().get(&key, false).await? {
            None => {
                if allow_creation {
                    self.initialize(trx);
                }
                Ok(())
            }
            Some(bytes) => {
                if bytes.len() < 12 {
                    return Err(DirError::IncompatibleLayerVersion(
                        "version record is too short".to_string(),
                    ));
                }
                let major = read_u32_le(&bytes[0..4]);
                let minor = read_u32_le(&bytes[4..8]);
                let patch = read_u32_le(&bytes[8..12]);

                if major > MAJOR_VERSION {
                    return Err(DirError::IncompatibleLayerVersion(format!(
                        "cannot load directory with version {major}.{minor}.{patch} using directory layer {MAJOR_VERSION}.{MINOR_VERSION}.{PATCH_VERSION}"
                    )));
                }
                if is_write && minor > MINOR_VERSION {
                    return Err(DirError::IncompatibleLayerVersion(format!(
                        "directory with version {major}.{minor}.{patch} is read-only when opened using directory layer {MAJOR_VERSION}.{MINOR_VERSION}.{PATCH_VERSION}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// The allocator that mints prefixes for new children directly under this
    /// partition's node subspace: `Nodes+encode(Nodes, "hca")`.
    pub fn allocator(&self) -> HighContentionAllocator {
        HighContentionAllocator::new(self.root_node.subspace(&HCA_KEY_NAME.to_vec()))
    }

    /// Writes the initial version record and stamp for a freshly created
    /// partition root.
    pub fn initialize(&self, trx: &DirTransaction) {
        let mut value = Vec::with_capacity(12);
        value.write_u32::<LittleEndian>(MAJOR_VERSION).unwrap();
        value.write_u32::<LittleEndian>(MINOR_VERSION).unwrap();
        value.write_u32::<LittleEndian>(PATCH_VERSION).unwrap();
        trx.inner().set(&self.version_key(), &value);
        trx.inner().set(&self.stamp_key(), &0i64.to_le_bytes());
    }
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(bytes);
    u32::from_le_bytes(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_nodes_prefix_is_content_plus_fe() {
        let root = PartitionDescriptor::new(
            Subspace::from_bytes(b"\xFE"),
            Subspace::from_bytes(b""),
        );
        let child = root.create_child(vec![0x15]);
        assert_eq!(child.nodes.bytes(), &[0x15, 0xFE]);
        assert_eq!(child.content.bytes(), &[0x15]);
    }

    #[test]
    fn root_node_prefix_equals_nodes_bytes_tuple_packed() {
        let root = PartitionDescriptor::new(
            Subspace::from_bytes(b"\xFE"),
            Subspace::from_bytes(b""),
        );
        assert!(root.root_node.bytes().starts_with(b"\xFE"));
    }
}
