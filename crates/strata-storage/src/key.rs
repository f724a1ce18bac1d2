//! Sharded object-key layout: `blocks/<mm>/<nn>/<uid>` and
//! `versions/<mm>/<nn>/<uid>`, where `mm/nn` are the first four hex
//! characters of the MD5 digest of the key component. Sharding keeps any
//! one "directory" in the object store from accumulating millions of keys.

use md5::{Digest, Md5};
use strata_proto::BlockUid;

const BLOCKS_PREFIX: &str = "blocks/";
const VERSIONS_PREFIX: &str = "versions/";
const META_SUFFIX: &str = ".meta";

fn shard(component: &str) -> (String, String) {
    let digest = hex::encode(Md5::digest(component.as_bytes()));
    (digest[0..2].to_string(), digest[2..4].to_string())
}

fn block_object_key(uid: &BlockUid, suffix: &str) -> String {
    let component = uid.object_key_component();
    let (mm, nn) = shard(&component);
    format!("{BLOCKS_PREFIX}{mm}/{nn}/{component}{suffix}")
}

pub fn block_key(uid: &BlockUid) -> String {
    block_object_key(uid, "")
}

pub fn block_meta_key(uid: &BlockUid) -> String {
    block_object_key(uid, META_SUFFIX)
}

pub fn version_key(uid: &str) -> String {
    let (mm, nn) = shard(uid);
    format!("{VERSIONS_PREFIX}{mm}/{nn}/{uid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_key_is_sharded_and_stable() {
        let uid = BlockUid::new(1, 1);
        let k1 = block_key(&uid);
        let k2 = block_key(&uid);
        assert_eq!(k1, k2);
        assert!(k1.starts_with("blocks/"));
        assert_eq!(k1.matches('/').count(), 3);
    }

    #[test]
    fn meta_key_appends_suffix() {
        let uid = BlockUid::new(1, 1);
        assert!(block_meta_key(&uid).ends_with(".meta"));
    }

    #[test]
    fn version_key_is_sharded() {
        let k = version_key("V0000000001");
        assert!(k.starts_with("versions/"));
    }
}
