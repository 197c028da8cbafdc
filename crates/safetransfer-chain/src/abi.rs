//! Solidity ABI encoding for the two registry calls
//!
//! Only the shapes the registry uses are supported: `addFile(string,bytes32)`
//! calldata, `getFilesByOwner(address)` calldata and its
//! `tuple(string,bytes32,uint256)[]` return value.

use safetransfer_core::types::{Address, ContentDigest};
use safetransfer_core::{SafeTransferError, SafeTransferResult};

use crate::contract::FileRecord;

const WORD: usize = 32;

/// `keccak256("addFile(string,bytes32)")[..4]`
pub const ADD_FILE_SELECTOR: [u8; 4] = [0x12, 0x94, 0x49, 0x5f];
/// `keccak256("getFilesByOwner(address)")[..4]`
pub const GET_FILES_BY_OWNER_SELECTOR: [u8; 4] = [0xfc, 0x08, 0xa7, 0xd7];

fn uint_word(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

pub fn encode_add_file(content_id: &str, digest: &ContentDigest) -> Vec<u8> {
    let bytes = content_id.as_bytes();
    let padded = bytes.len().div_ceil(WORD) * WORD;

    let mut out = Vec::with_capacity(4 + 3 * WORD + padded);
    out.extend_from_slice(&ADD_FILE_SELECTOR);
    // head: offset of the string tail, then the static bytes32
    out.extend_from_slice(&uint_word(2 * WORD));
    out.extend_from_slice(digest.as_bytes());
    out.extend_from_slice(&uint_word(bytes.len()));
    out.extend_from_slice(bytes);
    out.resize(4 + 3 * WORD + padded, 0);
    out
}

pub fn encode_get_files_by_owner(owner: &Address) -> SafeTransferResult<Vec<u8>> {
    let raw = hex::decode(owner.as_str().trim_start_matches("0x"))
        .map_err(|e| SafeTransferError::Malformed(format!("address {owner}: {e}")))?;
    let mut out = Vec::with_capacity(4 + WORD);
    out.extend_from_slice(&GET_FILES_BY_OWNER_SELECTOR);
    out.extend_from_slice(&[0u8; WORD - 20]);
    out.extend_from_slice(&raw);
    Ok(out)
}

fn malformed(what: impl Into<String>) -> SafeTransferError {
    SafeTransferError::Malformed(format!("getFilesByOwner result: {}", what.into()))
}

fn word_at(data: &[u8], at: usize) -> SafeTransferResult<&[u8]> {
    at.checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| malformed(format!("word at {at} is out of bounds")))
}

fn u64_at(data: &[u8], at: usize) -> SafeTransferResult<u64> {
    let word = word_at(data, at)?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(malformed(format!("integer at {at} does not fit in 64 bits")));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(buf))
}

fn usize_at(data: &[u8], at: usize) -> SafeTransferResult<usize> {
    usize::try_from(u64_at(data, at)?).map_err(|_| malformed(format!("offset at {at} overflows")))
}

fn offset(base: usize, rel: usize) -> SafeTransferResult<usize> {
    base.checked_add(rel)
        .ok_or_else(|| malformed("offset overflows"))
}

/// Decode `tuple(string ipfsCid, bytes32 originalFileHash, uint256 timestamp)[]`.
///
/// Every offset and length is bounds-checked against `data`, so a hostile
/// node answer is an error, never a panic or a huge allocation.
pub fn decode_file_records(data: &[u8]) -> SafeTransferResult<Vec<FileRecord>> {
    if data.is_empty() {
        // eth_call against an address without code returns 0x
        return Err(malformed("empty return data, no contract at address?"));
    }

    let array_at = usize_at(data, 0)?;
    let count = usize_at(data, array_at)?;
    let heads = offset(array_at, WORD)?;
    if count > data.len().saturating_sub(heads) / WORD {
        return Err(malformed(format!("{count} records cannot fit in {} bytes", data.len())));
    }

    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let tuple_at = offset(heads, usize_at(data, heads + i * WORD)?)?;
        let string_at = offset(tuple_at, usize_at(data, tuple_at)?)?;
        let hash = word_at(data, offset(tuple_at, WORD)?)?;
        let timestamp = u64_at(data, offset(tuple_at, 2 * WORD)?)?;

        let len = usize_at(data, string_at)?;
        let start = offset(string_at, WORD)?;
        let cid = offset(start, len)
            .ok()
            .and_then(|end| data.get(start..end))
            .ok_or_else(|| malformed(format!("string of {len} bytes at {string_at} is out of bounds")))?;
        let ipfs_cid = String::from_utf8(cid.to_vec())
            .map_err(|_| malformed(format!("record {i}: ipfsCid is not UTF-8")))?;

        records.push(FileRecord {
            ipfs_cid,
            original_file_hash: format!("0x{}", hex::encode(hash)),
            timestamp,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    // computed with a reference ABI encoder
    const ADD_FILE_CALLDATA: &str = "1294495f\
        0000000000000000000000000000000000000000000000000000000000000040\
        5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a\
        0000000000000000000000000000000000000000000000000000000000000008\
        75706c6f61642d31000000000000000000000000000000000000000000000000";

    const TWO_RECORDS: &str = "\
        0000000000000000000000000000000000000000000000000000000000000020\
        0000000000000000000000000000000000000000000000000000000000000002\
        0000000000000000000000000000000000000000000000000000000000000040\
        00000000000000000000000000000000000000000000000000000000000000e0\
        0000000000000000000000000000000000000000000000000000000000000060\
        1111111111111111111111111111111111111111111111111111111111111111\
        000000000000000000000000000000000000000000000000000000006553f100\
        0000000000000000000000000000000000000000000000000000000000000008\
        626166792d6f6e65000000000000000000000000000000000000000000000000\
        0000000000000000000000000000000000000000000000000000000000000060\
        abababababababababababababababababababababababababababababababab\
        000000000000000000000000000000000000000000000000000000006553f2f4\
        0000000000000000000000000000000000000000000000000000000000000008\
        75706c6f61642d32000000000000000000000000000000000000000000000000";

    #[test]
    fn test_add_file_calldata() {
        let data = encode_add_file("upload-1", &ContentDigest::from_bytes([0x5a; 32]));
        assert_eq!(hex::encode(data), ADD_FILE_CALLDATA);
    }

    #[test]
    fn test_add_file_empty_and_word_sized_ids() {
        let digest = ContentDigest::from_bytes([0; 32]);
        assert_eq!(encode_add_file("", &digest).len(), 4 + 3 * WORD);
        assert_eq!(encode_add_file(&"a".repeat(32), &digest).len(), 4 + 4 * WORD);
        assert_eq!(encode_add_file(&"a".repeat(33), &digest).len(), 4 + 5 * WORD);
    }

    #[test]
    fn test_get_files_by_owner_calldata() {
        let owner = Address::parse("0x00000000000000000000000000000000000000aa").unwrap();
        let data = encode_get_files_by_owner(&owner).unwrap();
        assert_eq!(
            hex::encode(data),
            "fc08a7d700000000000000000000000000000000000000000000000000000000000000aa"
        );
    }

    #[test]
    fn test_decode_two_records() {
        let records = decode_file_records(&hex::decode(TWO_RECORDS).unwrap()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ipfs_cid, "bafy-one");
        assert_eq!(records[0].original_file_hash, format!("0x{}", "11".repeat(32)));
        assert_eq!(records[0].timestamp, 1_700_000_000);
        assert_eq!(records[1].ipfs_cid, "upload-2");
        assert_eq!(records[1].original_file_hash, format!("0x{}", "ab".repeat(32)));
        assert_eq!(records[1].timestamp, 1_700_000_500);
    }

    #[test]
    fn test_decode_empty_array() {
        let data = hex::decode(
            "0000000000000000000000000000000000000000000000000000000000000020\
             0000000000000000000000000000000000000000000000000000000000000000",
        )
        .unwrap();
        assert!(decode_file_records(&data).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(
            decode_file_records(&[]),
            Err(SafeTransferError::Malformed(_))
        ));

        let full = hex::decode(TWO_RECORDS).unwrap();
        let truncated = &full[..full.len() - WORD];
        assert!(matches!(
            decode_file_records(truncated),
            Err(SafeTransferError::Malformed(_))
        ));

        // claims 2^40 records in 64 bytes
        let mut huge = vec![0u8; 2 * WORD];
        huge[WORD - 1] = 0x20;
        huge[2 * WORD - 6] = 0x01;
        assert!(matches!(
            decode_file_records(&huge),
            Err(SafeTransferError::Malformed(_))
        ));

        // offset word with high bits set
        let mut wide = full.clone();
        wide[0] = 0xff;
        assert!(matches!(
            decode_file_records(&wide),
            Err(SafeTransferError::Malformed(_))
        ));
    }
}
