//! The consensus-level entry model and its on-disk framing (spec §3, §6).

/// The first valid consensus log index; `0` always means "no entry" (spec
/// §3, "Log entry").
pub const BEGIN_INDEX: u64 = 1;

/// One consensus log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub index: u64,
    pub term: u64,
    pub entry_type: u8,
    pub bytes: Vec<u8>,
}

/// `[u32 len_le][u64 index][u64 term][u8 entry_type][bytes]`; `len` covers
/// everything after itself (spec §6, "Log-entry framing").
pub fn encode(entry: &LogEntry) -> Vec<u8> {
    let body_len = 8 + 8 + 1 + entry.bytes.len();
    let mut out = Vec::with_capacity(4 + body_len);
    out.extend_from_slice(&(body_len as u32).to_le_bytes());
    out.extend_from_slice(&entry.index.to_le_bytes());
    out.extend_from_slice(&entry.term.to_le_bytes());
    out.push(entry.entry_type);
    out.extend_from_slice(&entry.bytes);
    out
}

/// Decode a frame body (the bytes *after* the `len` prefix).
pub fn decode_body(body: &[u8]) -> Option<LogEntry> {
    if body.len() < 17 {
        return None;
    }
    let index = u64::from_le_bytes(body[0..8].try_into().ok()?);
    let term = u64::from_le_bytes(body[8..16].try_into().ok()?);
    let entry_type = body[16];
    let bytes = body[17..].to_vec();
    Some(LogEntry {
        index,
        term,
        entry_type,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips() {
        let entry = LogEntry {
            index: 7,
            term: 3,
            entry_type: 2,
            bytes: b"payload".to_vec(),
        };
        let framed = encode(&entry);
        let len = u32::from_le_bytes(framed[0..4].try_into().unwrap()) as usize;
        let body = &framed[4..4 + len];
        assert_eq!(decode_body(body).unwrap(), entry);
    }
}
