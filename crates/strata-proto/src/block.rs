//! Block-UID: the globally-unique identifier of a stored block payload.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a block's stored payload as a `(left, right)` pair.
///
/// `left` is the numeric id of the version that minted the block, `right`
/// is the block's index within that version plus one. This guarantees every
/// freshly written object has a globally unique key without any
/// coordination between concurrent backups: two versions can never mint the
/// same pair, since version ids are assigned by the metadata store's
/// autoincrement counter.
///
/// A block with no stored payload (a *sparse* block) is represented by the
/// pair `(None, None)` rather than by a magic sentinel value, so that the
/// type system rules out a "half sparse" UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockUid {
    left: Option<u64>,
    right: Option<u64>,
}

impl BlockUid {
    /// Construct a UID referencing a real stored object.
    pub fn new(left: u64, right: u64) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
        }
    }

    /// The UID of a sparse block: no stored object.
    pub const fn sparse() -> Self {
        Self {
            left: None,
            right: None,
        }
    }

    /// Mint the UID for block `index` of version `version_id`.
    ///
    /// `right` is `index + 1` so that the all-zero pair stays reserved for
    /// [`Self::sparse`].
    pub fn for_block(version_id: u64, index: u64) -> Self {
        Self::new(version_id, index + 1)
    }

    pub fn is_sparse(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn left(&self) -> Option<u64> {
        self.left
    }

    pub fn right(&self) -> Option<u64> {
        self.right
    }

    /// The 32-byte big-endian key used to address this UID's object in
    /// storage, before sharding. Panics on a sparse UID — callers must
    /// check [`Self::is_sparse`] first, since sparse blocks have no object.
    pub fn object_key_component(&self) -> String {
        let (left, right) = (
            self.left.expect("sparse block has no storage object"),
            self.right.expect("sparse block has no storage object"),
        );
        format!("{left:016x}-{right:016x}")
    }

    /// Parse the `<left-hex-16>-<right-hex-16>` component back into a UID.
    pub fn parse_object_key_component(s: &str) -> Option<Self> {
        let (left, right) = s.split_once('-')?;
        if left.len() != 16 || right.len() != 16 {
            return None;
        }
        let left = u64::from_str_radix(left, 16).ok()?;
        let right = u64::from_str_radix(right, 16).ok()?;
        Some(Self::new(left, right))
    }
}

impl fmt::Display for BlockUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.left, self.right) {
            (Some(l), Some(r)) => write!(f, "{l}-{r}"),
            _ => write!(f, "sparse"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_block_uses_index_plus_one() {
        let uid = BlockUid::for_block(7, 0);
        assert_eq!(uid.left(), Some(7));
        assert_eq!(uid.right(), Some(1));
    }

    #[test]
    fn sparse_has_no_components() {
        let uid = BlockUid::sparse();
        assert!(uid.is_sparse());
        assert_eq!(uid.left(), None);
    }

    #[test]
    fn object_key_component_roundtrips() {
        let uid = BlockUid::new(0x1, 0x2a);
        let key = uid.object_key_component();
        assert_eq!(key, "0000000000000001-000000000000002a");
        assert_eq!(BlockUid::parse_object_key_component(&key), Some(uid));
    }
}
