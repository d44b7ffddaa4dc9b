//! Snapshot file codec
//!
//! The snapshot is a flat sequence of tagged records. Each record starts
//! with one ASCII tag byte; lengths are decimal ASCII and payloads are raw
//! bytes, so values may contain any byte including newlines:
//!
//! ```text
//! K <klen> <vlen>\n<key><value>\n          string
//! L <klen> <count>\n<key>( <ilen>\n<item>)*\n   list
//! H <klen> <pairs>\n<key>( <flen> <vlen>\n<field><value>)*\n   hash
//! E <klen> <ms_since_epoch>\n<key>\n       expiry deadline
//! ```
//!
//! Records with an unknown tag are skipped up to the next newline, so the
//! format can grow without breaking old readers.

use crate::error::{Result, RustyRadishError};
use crate::storage::memory::{MemoryStore, StoreSnapshot};
use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Serialize a point-in-time store copy into the record stream.
pub fn encode(snapshot: &StoreSnapshot) -> Vec<u8> {
    let mut out = Vec::new();

    for (key, value) in &snapshot.strings {
        out.push(b'K');
        out.extend_from_slice(format!(" {} {}\n", key.len(), value.len()).as_bytes());
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(value.as_bytes());
        out.push(b'\n');
    }

    for (key, items) in &snapshot.lists {
        out.push(b'L');
        out.extend_from_slice(format!(" {} {}\n", key.len(), items.len()).as_bytes());
        out.extend_from_slice(key.as_bytes());
        for item in items {
            out.extend_from_slice(format!(" {}\n", item.len()).as_bytes());
            out.extend_from_slice(item.as_bytes());
        }
        out.push(b'\n');
    }

    for (key, fields) in &snapshot.hashes {
        out.push(b'H');
        out.extend_from_slice(format!(" {} {}\n", key.len(), fields.len()).as_bytes());
        out.extend_from_slice(key.as_bytes());
        for (field, value) in fields {
            out.extend_from_slice(format!(" {} {}\n", field.len(), value.len()).as_bytes());
            out.extend_from_slice(field.as_bytes());
            out.extend_from_slice(value.as_bytes());
        }
        out.push(b'\n');
    }

    for (key, deadline) in &snapshot.expiry {
        let ms = deadline
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        out.push(b'E');
        out.extend_from_slice(format!(" {} {}\n", key.len(), ms).as_bytes());
        out.extend_from_slice(key.as_bytes());
        out.push(b'\n');
    }

    out
}

/// Parse a record stream back into a store copy.
pub fn decode(data: &[u8]) -> Result<StoreSnapshot> {
    let mut snapshot = StoreSnapshot::default();
    let mut reader = Reader { data, pos: 0 };

    while let Some(tag) = reader.next_byte() {
        match tag {
            b'K' => {
                reader.expect(b' ')?;
                let klen = reader.read_number()? as usize;
                reader.expect(b' ')?;
                let vlen = reader.read_number()? as usize;
                reader.expect(b'\n')?;
                let key = reader.read_string(klen)?;
                let value = reader.read_string(vlen)?;
                reader.expect(b'\n')?;
                snapshot.strings.insert(key, value);
            }
            b'L' => {
                reader.expect(b' ')?;
                let klen = reader.read_number()? as usize;
                reader.expect(b' ')?;
                let count = reader.read_number()? as usize;
                reader.expect(b'\n')?;
                let key = reader.read_string(klen)?;
                let mut items = VecDeque::with_capacity(count);
                for _ in 0..count {
                    reader.expect(b' ')?;
                    let ilen = reader.read_number()? as usize;
                    reader.expect(b'\n')?;
                    items.push_back(reader.read_string(ilen)?);
                }
                reader.expect(b'\n')?;
                snapshot.lists.insert(key, items);
            }
            b'H' => {
                reader.expect(b' ')?;
                let klen = reader.read_number()? as usize;
                reader.expect(b' ')?;
                let pairs = reader.read_number()? as usize;
                reader.expect(b'\n')?;
                let key = reader.read_string(klen)?;
                let mut fields = std::collections::HashMap::with_capacity(pairs);
                for _ in 0..pairs {
                    reader.expect(b' ')?;
                    let flen = reader.read_number()? as usize;
                    reader.expect(b' ')?;
                    let vlen = reader.read_number()? as usize;
                    reader.expect(b'\n')?;
                    let field = reader.read_string(flen)?;
                    let value = reader.read_string(vlen)?;
                    fields.insert(field, value);
                }
                reader.expect(b'\n')?;
                snapshot.hashes.insert(key, fields);
            }
            b'E' => {
                reader.expect(b' ')?;
                let klen = reader.read_number()? as usize;
                reader.expect(b' ')?;
                let ms = reader.read_number()?;
                reader.expect(b'\n')?;
                let key = reader.read_string(klen)?;
                reader.expect(b'\n')?;
                let Some(deadline) = UNIX_EPOCH.checked_add(Duration::from_millis(ms)) else {
                    return Err(corrupt(format!("expiry timestamp {ms} out of range")));
                };
                snapshot.expiry.insert(key, deadline);
            }
            other => {
                warn!(tag = %(other as char), "skipping unknown snapshot record");
                reader.skip_line();
            }
        }
    }

    Ok(snapshot)
}

/// Write a snapshot of `store` to `path`. The store copy is taken under the
/// store lock; file I/O happens after, and the file lands via a temp-file
/// rename so a crash mid-write never clobbers the previous snapshot.
pub async fn dump(store: &MemoryStore, path: &Path) -> Result<()> {
    let snapshot = store.export();
    let key_count = snapshot.strings.len() + snapshot.lists.len() + snapshot.hashes.len();
    let bytes = encode(&snapshot);

    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|e| RustyRadishError::PersistenceError {
            message: format!("failed to write {}", tmp_path.display()),
            source: Some(e),
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| RustyRadishError::PersistenceError {
            message: format!("failed to move snapshot into {}", path.display()),
            source: Some(e),
        })?;

    debug!(
        keys = key_count,
        bytes = bytes.len(),
        path = %path.display(),
        "snapshot written"
    );
    Ok(())
}

/// Replace the store's contents with the snapshot at `path`, purging keys
/// that expired while it sat on disk.
pub async fn load(store: &MemoryStore, path: &Path) -> Result<()> {
    let bytes =
        tokio::fs::read(path)
            .await
            .map_err(|e| RustyRadishError::PersistenceError {
                message: format!("failed to read {}", path.display()),
                source: Some(e),
            })?;

    let snapshot = decode(&bytes)?;
    let key_count = snapshot.strings.len() + snapshot.lists.len() + snapshot.hashes.len();
    store.import(snapshot);

    info!(keys = key_count, path = %path.display(), "snapshot loaded");
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.next_byte() {
            Some(byte) if byte == expected => Ok(()),
            Some(byte) => Err(corrupt(format!(
                "expected {:?} at offset {}, found {:?}",
                expected as char,
                self.pos - 1,
                byte as char
            ))),
            None => Err(corrupt("unexpected end of snapshot".to_string())),
        }
    }

    fn read_number(&mut self) -> Result<u64> {
        let start = self.pos;
        while self
            .data
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_digit())
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(corrupt(format!("expected number at offset {start}")));
        }
        let digits = std::str::from_utf8(&self.data[start..self.pos])
            .expect("digits are ASCII");
        digits
            .parse::<u64>()
            .map_err(|_| corrupt(format!("number out of range at offset {start}")))
    }

    fn read_string(&mut self, len: usize) -> Result<String> {
        if self.pos + len > self.data.len() {
            return Err(corrupt("truncated payload".to_string()));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| corrupt("payload is not valid UTF-8".to_string()))
    }

    fn skip_line(&mut self) {
        while let Some(byte) = self.next_byte() {
            if byte == b'\n' {
                break;
            }
        }
    }
}

fn corrupt(message: String) -> RustyRadishError {
    RustyRadishError::PersistenceError {
        message: format!("corrupt snapshot: {message}"),
        source: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn encodes_string_record_layout() {
        let mut snapshot = StoreSnapshot::default();
        snapshot
            .strings
            .insert("foo".to_string(), "bar".to_string());
        assert_eq!(encode(&snapshot), b"K 3 3\nfoobar\n");
    }

    #[test]
    fn encodes_list_record_layout() {
        let mut snapshot = StoreSnapshot::default();
        snapshot
            .lists
            .insert("l".to_string(), VecDeque::from(["a".to_string(), "bc".to_string()]));
        assert_eq!(encode(&snapshot), b"L 1 2\nl 1\na 2\nbc\n");
    }

    #[test]
    fn encodes_hash_record_layout() {
        let mut snapshot = StoreSnapshot::default();
        let mut fields = HashMap::new();
        fields.insert("f".to_string(), "v".to_string());
        snapshot.hashes.insert("h".to_string(), fields);
        assert_eq!(encode(&snapshot), b"H 1 1\nh 1 1\nfv\n");
    }

    #[test]
    fn encodes_expiry_record_layout() {
        let mut snapshot = StoreSnapshot::default();
        snapshot
            .expiry
            .insert("k".to_string(), UNIX_EPOCH + Duration::from_millis(1234));
        assert_eq!(encode(&snapshot), b"E 1 1234\nk\n");
    }

    #[test]
    fn round_trips_every_shape() {
        let mut snapshot = StoreSnapshot::default();
        snapshot
            .strings
            .insert("s".to_string(), "value with\nnewline".to_string());
        snapshot.strings.insert("empty".to_string(), String::new());
        snapshot.lists.insert(
            "l".to_string(),
            VecDeque::from(["a".to_string(), "b b".to_string(), String::new()]),
        );
        let mut fields = HashMap::new();
        fields.insert("f1".to_string(), "v1".to_string());
        fields.insert("f2".to_string(), "v 2".to_string());
        snapshot.hashes.insert("h".to_string(), fields);
        snapshot.expiry.insert(
            "s".to_string(),
            UNIX_EPOCH + Duration::from_millis(1_800_000_000_000),
        );

        let decoded = decode(&encode(&snapshot)).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn unknown_tags_are_skipped() {
        let mut data = b"X some legacy junk\n".to_vec();
        data.extend_from_slice(b"K 1 1\nab\n");

        let decoded = decode(&data).unwrap();
        assert_eq!(decoded.strings.get("a"), Some(&"b".to_string()));
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let data = b"K 3 100\nfoo";
        assert!(matches!(
            decode(data),
            Err(RustyRadishError::PersistenceError { .. })
        ));
    }

    #[test]
    fn garbage_header_is_an_error() {
        let data = b"K x y\n";
        assert!(decode(data).is_err());
    }

    #[test]
    fn empty_input_decodes_to_empty_snapshot() {
        let decoded = decode(b"").unwrap();
        assert_eq!(decoded, StoreSnapshot::default());
    }

    #[tokio::test]
    async fn dump_then_load_restores_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.my_rdb");

        let store = MemoryStore::new();
        store.set("s", "v".to_string());
        store.rpush("l", "a".to_string()).unwrap();
        store.hset("h", "f", "v".to_string()).unwrap();
        store.expire("s", 300);

        dump(&store, &path).await.unwrap();
        store.flush_all();
        assert!(store.keys().is_empty());

        load(&store, &path).await.unwrap();
        assert_eq!(store.get("s").unwrap(), Some("v".to_string()));
        assert_eq!(store.lget("l").unwrap(), vec!["a"]);
        assert_eq!(store.hget("h", "f").unwrap(), Some("v".to_string()));
        let ttl = store.ttl("s");
        assert!(ttl > 0 && ttl <= 300, "got {ttl}");
    }

    #[tokio::test]
    async fn load_from_missing_file_fails() {
        let store = MemoryStore::new();
        let missing = Path::new("/definitely/not/here.my_rdb");
        assert!(load(&store, missing).await.is_err());
    }

    #[tokio::test]
    async fn dump_replaces_previous_snapshot_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.my_rdb");

        let store = MemoryStore::new();
        store.set("first", "1".to_string());
        dump(&store, &path).await.unwrap();

        store.set("second", "2".to_string());
        dump(&store, &path).await.unwrap();

        let restored = MemoryStore::new();
        load(&restored, &path).await.unwrap();
        let mut keys = restored.keys();
        keys.sort();
        assert_eq!(keys, vec!["first", "second"]);
        assert!(!path.with_extension("tmp").exists());
    }
}
