//! CID canonicalization and double-hash pre-images.
//!
//! Index keys are the base58btc string of the multihash portion of a CID,
//! which is identical for a CIDv0 and any CIDv1 carrying the same digest.
//! For a CIDv0 the key therefore equals the CID string itself.

use cid::Cid;
use multihash::Multihash;
use sha2::{Digest, Sha256, Sha512};

use gatefs_types::error::{BlockError, Result};

/// sha2-256 multicodec identifier.
pub const SHA2_256: u64 = 0x12;

/// sha2-512 multicodec identifier.
pub const SHA2_512: u64 = 0x13;

/// BLAKE3 multicodec identifier.
pub const BLAKE3: u64 = 0x1e;

/// Parse a CID string in any supported encoding.
pub fn parse_cid(s: &str) -> Result<Cid> {
    Cid::try_from(s).map_err(|_| BlockError::MalformedCid(s.to_string()))
}

/// The base58btc string of a multihash, the canonical index key.
pub fn multihash_b58(mh: &Multihash<64>) -> String {
    bs58::encode(mh.to_bytes()).into_string()
}

/// Canonical key of a CID: base58btc of its multihash, version-agnostic.
pub fn canonical_key(c: &Cid) -> String {
    multihash_b58(c.hash())
}

/// Re-encode a CID as v1 keeping its codec. The v1 text form is base32lower.
pub fn cid_v1_base32(c: &Cid) -> String {
    Cid::new_v1(c.codec(), *c.hash()).to_string()
}

/// Digest `data` with the hash function named by the multicodec `code` and
/// wrap the digest as a multihash.
pub fn multihash_sum(code: u64, data: &[u8]) -> Result<Multihash<64>> {
    let mh = match code {
        SHA2_256 => Multihash::wrap(code, Sha256::digest(data).as_slice()),
        SHA2_512 => Multihash::wrap(code, Sha512::digest(data).as_slice()),
        BLAKE3 => Multihash::wrap(code, blake3::hash(data).as_bytes()),
        other => return Err(BlockError::UnsupportedHashFunction(other)),
    };
    Ok(mh.expect("digest always fits in a 64-byte multihash"))
}

// ── Double-hash pre-images ────────────────────────────────────────────────────

/// `<cidv1-base32>/<subpath>`. The slash is appended even for an empty
/// subpath, matching the convention of the deployed denylist producers.
pub fn preimage_v1(c: &Cid, subpath: &str) -> String {
    format!("{}/{}", cid_v1_base32(c), subpath)
}

/// `<b58-multihash>[/<subpath>]`, with no trailing slash on bare keys.
pub fn preimage_b58(key: &str, subpath: &str) -> String {
    if subpath.is_empty() {
        key.to_string()
    } else {
        format!("{key}/{subpath}")
    }
}

/// `/ipns/<name>[/<subpath>]`.
pub fn preimage_ipns(name: &str, subpath: &str) -> String {
    if subpath.is_empty() {
        format!("/ipns/{name}")
    } else {
        format!("/ipns/{name}/{subpath}")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // The same sha2-256 digest in three encodings: dag-pb v1, raw v1, and v0.
    const V1_DAGPB: &str = "bafybeihvvulpp4evxj7x7armbqcyg6uezzuig6jp3lktpbovlqfkuqeuoq";
    const V1_RAW: &str = "bafkreihvvulpp4evxj7x7armbqcyg6uezzuig6jp3lktpbovlqfkuqeuoq";
    const V0: &str = "QmesfgDQ3q6prBy2Kg2gKbW4MAGuWiRP2DVuGA5MZSERLo";

    #[test]
    fn canonical_key_is_version_agnostic() {
        let a = canonical_key(&parse_cid(V1_DAGPB).unwrap());
        let b = canonical_key(&parse_cid(V1_RAW).unwrap());
        let c = canonical_key(&parse_cid(V0).unwrap());
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn canonical_key_of_cidv0_is_the_cid_string() {
        let c = parse_cid(V0).unwrap();
        assert_eq!(canonical_key(&c), V0);
    }

    #[test]
    fn v1_base32_round_trip() {
        // A v0 CID re-encoded as v1 keeps its dag-pb codec.
        let c = parse_cid(V0).unwrap();
        assert_eq!(cid_v1_base32(&c), V1_DAGPB);
        // Already-v1 CIDs come back unchanged.
        let v1 = parse_cid(V1_RAW).unwrap();
        assert_eq!(cid_v1_base32(&v1), V1_RAW);
    }

    #[test]
    fn parse_cid_rejects_garbage() {
        let err = parse_cid("not-a-cid").unwrap_err();
        assert!(matches!(err, BlockError::MalformedCid(_)));
    }

    #[test]
    fn multihash_sum_supported_functions() {
        for code in [SHA2_256, SHA2_512, BLAKE3] {
            let mh = multihash_sum(code, b"gatefs").unwrap();
            assert_eq!(mh.code(), code);
        }
        assert_eq!(multihash_sum(SHA2_256, b"x").unwrap().digest().len(), 32);
        assert_eq!(multihash_sum(SHA2_512, b"x").unwrap().digest().len(), 64);
        assert_eq!(multihash_sum(BLAKE3, b"x").unwrap().digest().len(), 32);
    }

    #[test]
    fn multihash_sum_unknown_function() {
        let err = multihash_sum(0xff00, b"x").unwrap_err();
        assert!(matches!(err, BlockError::UnsupportedHashFunction(0xff00)));
    }

    #[test]
    fn preimages() {
        let c = parse_cid(V0).unwrap();
        assert_eq!(preimage_v1(&c, ""), format!("{V1_DAGPB}/"));
        assert_eq!(preimage_v1(&c, "sub"), format!("{V1_DAGPB}/sub"));
        assert_eq!(preimage_b58(V0, ""), V0);
        assert_eq!(preimage_b58(V0, "sub"), format!("{V0}/sub"));
        assert_eq!(preimage_ipns("example.org", ""), "/ipns/example.org");
        assert_eq!(preimage_ipns("example.org", "a/b"), "/ipns/example.org/a/b");
    }
}
