//! Lowercase RFC4648 base32 used by content ids and peer ids.

pub(crate) fn encode_base32(bytes: &[u8]) -> String {
    fast32::base32::RFC4648_NOPAD
        .encode(bytes)
        .to_ascii_lowercase()
}

pub(crate) fn decode_base32(text: &str) -> Option<Vec<u8>> {
    fast32::base32::RFC4648_NOPAD
        .decode_str(&text.to_ascii_uppercase())
        .ok()
}
