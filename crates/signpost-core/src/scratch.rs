/// A reusable, grow-only buffer that holds the most recent lookup value.
///
/// Each [`ConnectionHandle`](crate::ConnectionHandle) owns exactly one of
/// these, so a steady stream of lookups on one worker allocates only when a
/// value longer than any seen before arrives.
///
/// Invariants:
/// - `capacity() >= len()`;
/// - the contents are followed by a single NUL byte;
/// - capacity never decreases over the buffer's lifetime.
#[derive(Debug, Clone)]
pub struct ScratchBuffer {
    // Contents plus the trailing NUL.
    data: String,
}

impl ScratchBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty buffer able to hold `capacity` bytes without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut data = String::with_capacity(capacity + 1);
        data.push('\0');
        Self { data }
    }

    /// Length of the current contents in bytes, excluding the terminator.
    pub fn len(&self) -> usize {
        self.data.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of content bytes the buffer can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.data.capacity() - 1
    }

    /// The current contents.
    pub fn as_str(&self) -> &str {
        &self.data[..self.len()]
    }

    /// The current contents including the trailing NUL byte.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// Grows the buffer so that it can hold at least `length` bytes.
    pub fn ensure_capacity(&mut self, length: usize) {
        if self.capacity() < length {
            self.data.reserve(length + 1 - self.data.len());
        }
    }

    /// Replaces the contents with `value`, growing as needed.
    pub fn write(&mut self, value: &str) {
        self.ensure_capacity(value.len());
        self.data.clear();
        self.data.push_str(value);
        self.data.push('\0');
    }

    /// Appends `value` to the current contents, growing as needed.
    pub fn append(&mut self, value: &str) {
        self.ensure_capacity(self.len() + value.len());
        self.data.pop();
        self.data.push_str(value);
        self.data.push('\0');
    }

    /// Replaces the contents with an owned value.
    ///
    /// If the value fits the current capacity it is copied in and dropped;
    /// otherwise its allocation is taken over and the old one released, so a
    /// value fetched from a client library costs no second copy.
    pub fn adopt(&mut self, mut value: String) {
        if value.len() <= self.capacity() {
            self.write(&value);
            return;
        }
        value.push('\0');
        self.data = value;
    }

    /// Empties the buffer without releasing its allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.data.push('\0');
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}
