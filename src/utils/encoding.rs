//! Encoding repair for mis-decoded portal text.

/// Best-effort repair of mojibake produced upstream by reading UTF-8 bytes
/// as Latin-1 (e.g. "TÃ©lÃ©com" for "Télécom").
///
/// Re-encodes the string as Latin-1 and reinterprets the bytes as UTF-8.
/// Falls back to the original string whenever the reinterpretation fails or
/// the input contains characters outside Latin-1; this is a mitigation, not
/// a correctness guarantee.
pub fn force_utf8(value: &str) -> String {
    let mut bytes = Vec::with_capacity(value.len());
    for c in value.chars() {
        let cp = c as u32;
        if cp > 0xFF {
            // Not representable as Latin-1 bytes, so the text was not
            // mis-decoded in the first place.
            return value.to_string();
        }
        bytes.push(cp as u8);
    }
    match String::from_utf8(bytes) {
        Ok(repaired) => repaired,
        Err(_) => value.to_string(),
    }
}
