/*
 * Structural trace emitter.
 *
 * Every decoder and envelope parser writes into a `TraceSink`, which is a
 * plain `serde_json::Map` builder with `open`/`close` nesting. Pretty JSON
 * falls out of `serde_json::to_string_pretty` on the finished tree, so
 * there is no hand-rolled JSON writer anywhere in this crate.
 */

use serde_json::{Map, Value};

pub struct TraceSink {
    root: Map<String, Value>,
    stack: Vec<(String, Map<String, Value>)>,
    verbose: bool,
}

impl TraceSink {
    pub fn new(verbose: bool) -> Self {
        Self {
            root: Map::new(),
            stack: Vec::new(),
            verbose,
        }
    }

    /// Verbose mode additionally wants raw-byte dumps and per-symbol
    /// tables; callers check this before doing the (otherwise wasted)
    /// work of building them.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Open a new named nested record. Must be matched by a `close()`.
    pub fn open(&mut self, name: impl Into<String>) {
        self.stack.push((name.into(), Map::new()));
    }

    /// Close the innermost open record, inserting it under the name given
    /// to the matching `open()` into whatever record now becomes current.
    pub fn close(&mut self) {
        let (name, map) = self
            .stack
            .pop()
            .expect("TraceSink::close() with no matching open()");
        self.insert(name, Value::Object(map));
    }

    fn current(&mut self) -> &mut Map<String, Value> {
        match self.stack.last_mut() {
            Some((_, map)) => map,
            None => &mut self.root,
        }
    }

    fn insert(&mut self, name: String, value: Value) {
        self.current().insert(name, value);
    }

    pub fn field_u64(&mut self, name: &str, value: u64) {
        self.insert(name.to_string(), Value::from(value));
    }

    pub fn field_i64(&mut self, name: &str, value: i64) {
        self.insert(name.to_string(), Value::from(value));
    }

    pub fn field_bool(&mut self, name: &str, value: bool) {
        self.insert(name.to_string(), Value::from(value));
    }

    pub fn field_str(&mut self, name: &str, value: impl Into<String>) {
        self.insert(name.to_string(), Value::from(value.into()));
    }

    /// Records a raw byte sequence as a JSON array of small integers,
    /// without forcing a particular textual radix on the consumer.
    pub fn field_bytes(&mut self, name: &str, value: &[u8]) {
        let arr: Vec<Value> = value.iter().map(|&b| Value::from(b)).collect();
        self.insert(name.to_string(), Value::Array(arr));
    }

    pub fn array(&mut self, name: &str, items: Vec<Value>) {
        self.insert(name.to_string(), Value::Array(items));
    }

    /// Builds a standalone leaf record of the shape every decoded Huffman
    /// symbol gets: `bit_size`, `value` (the canonical encoded integer),
    /// `decoded_value` (the literal/length/distance/repeat semantic), and
    /// a human `description`. Returned as a bare `Value` so callers can
    /// accumulate a `Vec<Value>` and hand it to `array()` once a block is
    /// fully decoded.
    pub fn symbol_record(
        bit_size: u32,
        value: u32,
        decoded_value: i64,
        description: impl Into<String>,
    ) -> Value {
        let mut m = Map::new();
        m.insert("bit_size".into(), Value::from(bit_size));
        m.insert("value".into(), Value::from(value));
        m.insert("decoded_value".into(), Value::from(decoded_value));
        m.insert("description".into(), Value::from(description.into()));
        Value::Object(m)
    }

    /// Finish the trace, asserting every `open()` was matched by a
    /// `close()`.
    pub fn finish(self) -> Value {
        assert!(
            self.stack.is_empty(),
            "TraceSink::finish() called with {} unclosed open()",
            self.stack.len()
        );
        Value::Object(self.root)
    }

    /// Finish the trace even if some records were left open, used on the
    /// error path so a truncated decode still yields a best-effort,
    /// well-formed trace up to the point of failure.
    pub fn finish_partial(mut self) -> Value {
        while !self.stack.is_empty() {
            self.close();
        }
        Value::Object(self.root)
    }

    pub fn to_pretty_string(value: &Value) -> String {
        serde_json::to_string_pretty(value).expect("serializing a Value tree cannot fail")
    }
}
