//! Content-hash utility behind conflict detection and the rsync manifest:
//! git's own blob hash, `sha1("blob " + len + "\0" + content)`, computed over
//! content normalized the way git normalizes text on checkin (BOM stripped,
//! CRLF folded to LF, skipped entirely for binary-looking content) so the
//! result is directly comparable against `git hash-object`.

use sha1::{Digest, Sha1};
use std::borrow::Cow;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// `sha1` hex digest of the git blob preimage for `content`, after BOM strip
/// and CRLF→LF normalization (skipped for binary-looking content).
pub fn git_blob_hash(content: &[u8]) -> String {
    let normalized = normalize(content);
    let mut hasher = Sha1::new();
    hasher.update(b"blob ");
    hasher.update(normalized.len().to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(&normalized);
    format!("{:x}", hasher.finalize())
}

pub fn git_blob_hash_str(content: &str) -> String {
    git_blob_hash(content.as_bytes())
}

fn normalize(input: &[u8]) -> Cow<'_, [u8]> {
    let stripped = strip_bom(input);
    if looks_binary(stripped) || !contains_crlf(stripped) {
        return stripped;
    }
    let mut out = Vec::with_capacity(stripped.len());
    let mut idx = 0;
    while idx < stripped.len() {
        if idx + 1 < stripped.len() && stripped[idx] == b'\r' && stripped[idx + 1] == b'\n' {
            out.push(b'\n');
            idx += 2;
        } else {
            out.push(stripped[idx]);
            idx += 1;
        }
    }
    Cow::Owned(out)
}

fn strip_bom(input: &[u8]) -> Cow<'_, [u8]> {
    if input.starts_with(UTF8_BOM) {
        Cow::Borrowed(&input[UTF8_BOM.len()..])
    } else {
        Cow::Borrowed(input)
    }
}

fn looks_binary(data: &[u8]) -> bool {
    data.contains(&0)
}

fn contains_crlf(data: &[u8]) -> bool {
    data.windows(2).any(|w| matches!(w, b"\r\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_git_blob_hash() {
        // `git hash-object` on an empty blob.
        assert_eq!(
            git_blob_hash(b""),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
        // `echo -n "hello world" | git hash-object --stdin`
        assert_eq!(
            git_blob_hash_str("hello world"),
            "95d09f2b10159347eece71399a7e2e907ea3df4f"
        );
    }

    #[test]
    fn crlf_and_lf_hash_identically() {
        assert_eq!(
            git_blob_hash_str("a\r\nb\r\n"),
            git_blob_hash_str("a\nb\n")
        );
    }

    #[test]
    fn bom_is_stripped_before_hashing() {
        let with_bom = [UTF8_BOM, b"hello"].concat();
        assert_eq!(git_blob_hash(&with_bom), git_blob_hash_str("hello"));
    }

    #[test]
    fn binary_content_is_not_crlf_normalized() {
        let data = vec![0u8, b'\r', b'\n', 1, 2];
        assert_eq!(normalize(&data).as_ref(), data.as_slice());
    }
}
