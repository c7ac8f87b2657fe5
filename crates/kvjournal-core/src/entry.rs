//! Operation codes, the caller-supplied `Entry` contract, and journal records.

/// Kind of mutation recorded in the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Insert or overwrite a key
    Put = 1,
    /// Change the time-to-live of an existing key
    UpdateTtl = 2,
    /// Remove a key
    Delete = 3,
}

impl OpCode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(OpCode::Put),
            2 => Some(OpCode::UpdateTtl),
            3 => Some(OpCode::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpCode::Put => "put",
            OpCode::UpdateTtl => "update_ttl",
            OpCode::Delete => "delete",
        }
    }
}

/// Accessors the storage engine's entry type must expose.
///
/// The journal only calls the getters, and only for the duration of
/// `Journal::append`. Setters exist so replayed records and engine entries
/// share one contract.
pub trait Entry {
    fn key(&self) -> &str;
    fn set_key(&mut self, key: String);

    fn value(&self) -> &[u8];
    fn set_value(&mut self, value: Vec<u8>);

    /// Nanoseconds since the Unix epoch
    fn timestamp(&self) -> i64;
    fn set_timestamp(&mut self, timestamp: i64);

    fn ttl(&self) -> i64;
    fn set_ttl(&mut self, ttl: i64);
}

/// One queued or persisted journal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub op: OpCode,
    /// Caller-computed key hash, opaque to the journal
    pub fingerprint: u64,
    pub key: String,
    pub value: Vec<u8>,
    pub timestamp: i64,
    pub ttl: i64,
}

impl Record {
    /// Capture the entry's current fields.
    pub fn from_entry<E: Entry + ?Sized>(op: OpCode, fingerprint: u64, entry: &E) -> Self {
        Self {
            op,
            fingerprint,
            key: entry.key().to_owned(),
            value: entry.value().to_vec(),
            timestamp: entry.timestamp(),
            ttl: entry.ttl(),
        }
    }
}

impl Entry for Record {
    fn key(&self) -> &str {
        &self.key
    }

    fn set_key(&mut self, key: String) {
        self.key = key;
    }

    fn value(&self) -> &[u8] {
        &self.value
    }

    fn set_value(&mut self, value: Vec<u8>) {
        self.value = value;
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    fn ttl(&self) -> i64 {
        self.ttl
    }

    fn set_ttl(&mut self, ttl: i64) {
        self.ttl = ttl;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal engine-side entry used by tests.
    #[derive(Debug, Default)]
    pub(crate) struct MockEntry {
        key: String,
        value: Vec<u8>,
        timestamp: i64,
        ttl: i64,
    }

    impl MockEntry {
        pub(crate) fn new(key: &str, value: &[u8], timestamp: i64, ttl: i64) -> Self {
            Self {
                key: key.to_string(),
                value: value.to_vec(),
                timestamp,
                ttl,
            }
        }
    }

    impl Entry for MockEntry {
        fn key(&self) -> &str {
            &self.key
        }
        fn set_key(&mut self, key: String) {
            self.key = key;
        }
        fn value(&self) -> &[u8] {
            &self.value
        }
        fn set_value(&mut self, value: Vec<u8>) {
            self.value = value;
        }
        fn timestamp(&self) -> i64 {
            self.timestamp
        }
        fn set_timestamp(&mut self, timestamp: i64) {
            self.timestamp = timestamp;
        }
        fn ttl(&self) -> i64 {
            self.ttl
        }
        fn set_ttl(&mut self, ttl: i64) {
            self.ttl = ttl;
        }
    }

    #[test]
    fn test_opcode_byte_mapping() {
        for op in [OpCode::Put, OpCode::UpdateTtl, OpCode::Delete] {
            assert_eq!(OpCode::from_u8(op as u8), Some(op));
        }
        assert_eq!(OpCode::from_u8(0), None);
        assert_eq!(OpCode::from_u8(4), None);
    }

    #[test]
    fn test_record_captures_entry_fields() {
        let mut entry = MockEntry::default();
        entry.set_key("user:42".into());
        entry.set_value(b"payload".to_vec());
        entry.set_timestamp(1_700_000_000_000_000_000);
        entry.set_ttl(18071988);

        let record = Record::from_entry(OpCode::Put, 0xDEADBEEF, &entry);
        assert_eq!(record.op, OpCode::Put);
        assert_eq!(record.fingerprint, 0xDEADBEEF);
        assert_eq!(record.key(), "user:42");
        assert_eq!(record.value(), b"payload");
        assert_eq!(record.timestamp(), 1_700_000_000_000_000_000);
        assert_eq!(record.ttl(), 18071988);

        // Later changes to the engine entry do not leak into the record
        entry.set_ttl(1);
        assert_eq!(record.ttl, 18071988);
    }

    #[test]
    fn test_record_from_trait_object() {
        let entry = MockEntry::new("k", b"v", 1, 2);
        let dyn_entry: &dyn Entry = &entry;
        let record = Record::from_entry(OpCode::Delete, 7, dyn_entry);
        assert_eq!(record.key, "k");
        assert_eq!(record.op, OpCode::Delete);
    }
}
