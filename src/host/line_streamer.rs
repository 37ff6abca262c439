//! Line Streamer
//!
//! Turns a push-based stream of arbitrarily sized chunks into a push-based
//! stream of complete lines. Used to give child process output a line-oriented
//! shape without tying the splitting logic to any particular reader.

/// Buffers partial lines across chunk boundaries and hands complete lines to a sink.
///
/// After every [`feed`](LineStreamer::feed) the buffer holds no `\n`: every
/// terminated line has already been delivered. Whatever is left is flushed as
/// a final, unterminated line by [`close`](LineStreamer::close).
///
/// Splitting happens on raw bytes, so a multibyte UTF-8 character cut in half
/// by a chunk boundary is reassembled before the line is decoded. `\r` is kept.
pub struct LineStreamer<F>
where
    F: FnMut(String),
{
    buffer: Vec<u8>,
    sink: F,
}

impl<F> LineStreamer<F>
where
    F: FnMut(String),
{
    pub fn new(sink: F) -> Self {
        Self {
            buffer: Vec::new(),
            sink,
        }
    }

    /// Append a chunk and emit every line it completes, in order
    pub fn feed(&mut self, chunk: impl AsRef<[u8]>) {
        let chunk = chunk.as_ref();
        if chunk.is_empty() {
            return;
        }

        // The buffer had no newline before this chunk, so only the new bytes need scanning.
        let mut scan_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut line_start = 0;
        while let Some(offset) = self.buffer[scan_from..].iter().position(|b| *b == b'\n') {
            let newline = scan_from + offset;
            let line = String::from_utf8_lossy(&self.buffer[line_start..newline]).into_owned();
            (self.sink)(line);
            line_start = newline + 1;
            scan_from = line_start;
        }

        if line_start > 0 {
            self.buffer.drain(..line_start);
        }
    }

    /// Number of buffered bytes still waiting for a newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Signal end of stream, flushing any unterminated remainder as a last line
    pub fn close(mut self) {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            (self.sink)(String::from_utf8_lossy(&rest).into_owned());
        }
    }
}

/// Run a finite sequence of chunks through a streamer and collect every line
pub fn split_lines<I, C>(chunks: I) -> Vec<String>
where
    I: IntoIterator<Item = C>,
    C: AsRef<[u8]>,
{
    let mut lines = Vec::new();
    let mut streamer = LineStreamer::new(|line| lines.push(line));
    for chunk in chunks {
        streamer.feed(chunk);
    }
    streamer.close();
    lines
}
