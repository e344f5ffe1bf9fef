use std::io::{self, Write};

/// In-memory sink that collects encoder output as an ordered list of chunks.
///
/// Bytes accumulate in the open chunk until [`ChunkBuffer::cut`] seals it.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    open: Vec<u8>,
    sealed: Vec<Vec<u8>>,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seal the open chunk. Empty chunks are never emitted.
    pub fn cut(&mut self) {
        if !self.open.is_empty() {
            self.sealed.push(std::mem::take(&mut self.open));
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.sealed.len()
    }

    /// Total bytes written so far, sealed or not.
    pub fn len(&self) -> usize {
        self.sealed.iter().map(Vec::len).sum::<usize>() + self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_chunks(mut self) -> Vec<Vec<u8>> {
        self.cut();
        self.sealed
    }
}

impl Write for ChunkBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.open.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Encoded output handed back by an encoder's `finish`.
#[derive(Debug, Clone)]
pub struct EncodedStream {
    pub chunks: Vec<Vec<u8>>,
    pub mime_type: &'static str,
}
