//! Sample identifiers and chunk data.

use bytes::Bytes;

/// Short magnet URI used across scenarios.
pub const SAMPLE_MAGNET: &str = "magnet:?xt=urn:btih:ABC";

/// Realistic magnet URI carrying a display name and tracker.
pub const SINTEL_MAGNET: &str = "magnet:?xt=urn:btih:08ada5a7a6183aae1e09d831df6748d566095a10&dn=Sintel&tr=wss%3A%2F%2Ftracker.openwebtorrent.com";

/// Info hash reported for [`SINTEL_MAGNET`].
pub const SINTEL_INFO_HASH: &str = "08ADA5A7A6183AAE1E09D831DF6748D566095A10";

/// Minimal bencoded metainfo payload.
#[must_use]
pub fn sample_metainfo() -> Vec<u8> {
    b"d8:announce31:wss://tracker.openwebtorrent.com4:infod6:lengthi5e4:name9:hello.txtee".to_vec()
}

/// Wrap static slices into chunks.
#[must_use]
pub fn chunks(parts: &[&'static [u8]]) -> Vec<Bytes> {
    parts.iter().map(|part| Bytes::from_static(part)).collect()
}

/// `count` chunks of `size` bytes, each filled with its own index.
#[must_use]
pub fn patterned_chunks(count: usize, size: usize) -> Vec<Bytes> {
    (0..count)
        .map(|index| {
            let fill = u8::try_from(index % 256).unwrap_or(0);
            Bytes::from(vec![fill; size])
        })
        .collect()
}

/// Concatenate chunks into one buffer.
#[must_use]
pub fn concat(chunks: &[Bytes]) -> Vec<u8> {
    chunks.iter().flat_map(|chunk| chunk.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterned_chunks_are_distinct() {
        let parts = patterned_chunks(3, 4);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].as_ref(), &[2, 2, 2, 2]);
        assert_eq!(concat(&parts).len(), 12);
    }

    #[test]
    fn fixtures_are_valid_inputs() {
        assert!(SAMPLE_MAGNET.starts_with("magnet:"));
        assert!(!sample_metainfo().is_empty());
        assert_eq!(concat(&chunks(&[b"ab", b"c"])), b"abc");
    }
}
