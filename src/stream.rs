use std::sync::Arc;
use tokio::sync::Mutex;

/// Marks the end of a stream in `stream text all` replies.
const EOF_MARKER: &str = "eof";

pub type SharedBuffer = Arc<Mutex<StreamBuffer>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk {
    Rows(usize),
    Eof,
}

/// In-memory CSV of one stream: the header line followed by data rows.
#[derive(Debug, Default, Clone)]
pub struct StreamBuffer {
    header: Option<String>,
    rows: Vec<String>,
}

impl StreamBuffer {
    pub fn shared() -> SharedBuffer {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn reset(&mut self) {
        self.header = None;
        self.rows.clear();
    }

    pub fn set_header(&mut self, header: impl AsRef<str>) {
        let header = header.as_ref().trim();
        self.header = (!header.is_empty()).then(|| header.to_string());
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    /// Adds the rows of one `stream text all` reply.
    pub fn append(&mut self, chunk: &str) -> Chunk {
        let mut count = 0;
        for line in chunk.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if line.eq_ignore_ascii_case(EOF_MARKER) {
                return Chunk::Eof;
            }
            self.rows.push(line.to_string());
            count += 1;
        }
        Chunk::Rows(count)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.rows.is_empty()
    }

    /// The whole buffer as CSV text.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for line in self.header.iter().chain(self.rows.iter()) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Header names paired with the fields of the last row.
    ///
    /// Empty header names are skipped, as are fields missing from a
    /// short row. Returns nothing until at least one row arrived.
    pub fn last_sample(&self) -> Vec<(&str, &str)> {
        let (Some(header), Some(last)) = (self.header.as_deref(), self.rows.last()) else {
            return Vec::new();
        };
        header
            .split(',')
            .zip(last.split(','))
            .map(|(name, value)| (name.trim(), value.trim()))
            .filter(|(name, _)| !name.is_empty())
            .collect()
    }
}
