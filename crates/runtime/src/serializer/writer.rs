use crate::error::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

/// Accumulates JSON text during a generator walk, owning the comma and
/// bracket bookkeeping so visits stay single-pass and streaming-friendly.
/// Scalar escaping is delegated to serde_json rather than hand-rolled.
#[derive(Debug, Default)]
pub struct JsonWriter {
    buffer: String,
    containers: Vec<(Container, usize)>,
    /// A key was just written; the next value follows it without a comma.
    pending_value: bool,
}

impl JsonWriter {
    pub fn new() -> Self {
        JsonWriter::default()
    }

    fn before_item(&mut self) {
        if self.pending_value {
            self.pending_value = false;
            return;
        }
        if let Some((_, count)) = self.containers.last_mut() {
            if *count > 0 {
                self.buffer.push(',');
            }
            *count += 1;
        }
    }

    pub fn open_object(&mut self) {
        self.before_item();
        self.buffer.push('{');
        self.containers.push((Container::Object, 0));
    }

    pub fn close_object(&mut self) {
        debug_assert_eq!(
            self.containers.last().map(|(c, _)| *c),
            Some(Container::Object)
        );
        self.containers.pop();
        self.buffer.push('}');
    }

    pub fn open_array(&mut self) {
        self.before_item();
        self.buffer.push('[');
        self.containers.push((Container::Array, 0));
    }

    pub fn close_array(&mut self) {
        debug_assert_eq!(
            self.containers.last().map(|(c, _)| *c),
            Some(Container::Array)
        );
        self.containers.pop();
        self.buffer.push(']');
    }

    pub fn write_key(&mut self, key: &str) {
        self.before_item();
        self.buffer.push_str(&escape_string(key));
        self.buffer.push(':');
        self.pending_value = true;
    }

    /// Write a pre-formatted JSON literal (number, boolean, or an already
    /// escaped string).
    pub fn write_raw_value(&mut self, raw: &str) {
        self.before_item();
        self.buffer.push_str(raw);
    }

    pub fn write_string_value(&mut self, value: &str) {
        self.before_item();
        self.buffer.push_str(&escape_string(value));
    }

    pub fn write_key_string_value(&mut self, key: &str, value: &str) {
        self.write_key(key);
        self.write_string_value(value);
    }

    /// Finish and hand back the accumulated text. Unbalanced containers
    /// mean a generator bug; the reparse in `Serializer::to_json` is the
    /// backstop that turns that into an explicit error.
    pub fn into_string(self) -> String {
        self.buffer
    }
}

/// JSON-escape a string, quotes included.
fn escape_string(s: &str) -> String {
    serde_json::to_string(s).expect("string serialization is infallible")
}

/// Format a double as a JSON literal.
pub fn double_literal(value: f64) -> Result<String, RuntimeError> {
    if !value.is_finite() {
        return Err(RuntimeError::SerializationInvariant {
            message: format!("double value {} has no JSON representation", value),
        });
    }
    Ok(serde_json::to_string(&value).expect("finite double serialization is infallible"))
}
