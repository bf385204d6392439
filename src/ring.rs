//! Power-of-two growable circular byte buffer, plus the non-blocking-drain
//! read helper that feeds it.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

const MIN_CAPACITY: usize = 64;

/// A growable circular buffer. One byte of capacity is always kept free so
/// that `head == tail` is an unambiguous empty marker.
#[derive(Debug)]
pub struct Ring {
    buf: Vec<u8>,
    head: usize,
    tail: usize,
}

impl Default for Ring {
    fn default() -> Self {
        Self::new()
    }
}

impl Ring {
    pub fn new() -> Self {
        Ring {
            buf: vec![0u8; MIN_CAPACITY],
            head: 0,
            tail: 0,
        }
    }

    fn cap(&self) -> usize {
        self.buf.len()
    }

    fn mask(&self) -> usize {
        self.cap() - 1
    }

    pub fn len(&self) -> usize {
        (self.tail.wrapping_sub(self.head)) & self.mask()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Ensures room for `add` more bytes plus the one separator byte that
    /// must always stay free.
    pub fn grow(&mut self, add: usize) {
        let required = self.len() + add + 1;
        if required <= self.cap() {
            return;
        }
        let mut new_cap = self.cap();
        while new_cap < required {
            new_cap *= 2;
        }
        let mut new_buf = vec![0u8; new_cap];
        let len = self.len();
        // Linearize the occupied span into the front of the new buffer.
        let old_mask = self.mask();
        for i in 0..len {
            new_buf[i] = self.buf[(self.head + i) & old_mask];
        }
        self.buf = new_buf;
        self.head = 0;
        self.tail = len;
    }

    pub fn push(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.grow(data.len());
        let mask = self.mask();
        for &b in data {
            self.buf[self.tail & mask] = b;
            self.tail = self.tail.wrapping_add(1);
        }
    }

    /// Returns up to two slices covering the occupied span, in order.
    pub fn peek(&self) -> (&[u8], Option<&[u8]>) {
        if self.is_empty() {
            return (&[], None);
        }
        let mask = self.mask();
        let h = self.head & mask;
        let t = self.tail & mask;
        if h < t {
            (&self.buf[h..t], None)
        } else {
            (&self.buf[h..], Some(&self.buf[..t]))
        }
    }

    /// Copies the occupied span out as a single contiguous `Vec<u8>`.
    pub fn peek_contiguous(&self) -> Vec<u8> {
        let (a, b) = self.peek();
        let mut out = Vec::with_capacity(a.len() + b.map_or(0, |s| s.len()));
        out.extend_from_slice(a);
        if let Some(b) = b {
            out.extend_from_slice(b);
        }
        out
    }

    /// Advances `head` by `n`, clamped to the occupied length.
    pub fn pop(&mut self, n: usize) {
        let n = n.min(self.len());
        self.head = self.head.wrapping_add(n);
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    /// Iterates over occupied bytes in order without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        let (a, b) = self.peek();
        a.iter().copied().chain(b.unwrap_or(&[]).iter().copied())
    }
}

/// Controls how `read_available` treats bytes as it drains them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Read and drop everything; used to drain a self-pipe / wakeup source.
    Discard,
    /// Copy bytes through unmodified.
    Raw,
    /// Sanitize interior `\0` to `0x01`, terminate the batch with one `\0`.
    CString,
}

/// Where drained bytes land.
pub enum Sink<'a> {
    /// Replaces `*out`, extending any existing prefix already in it.
    Heap(&'a mut Vec<u8>),
    /// Appends to a ring.
    Ring(&'a mut Ring),
}

/// Outcome of one [`read_available`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOutcome {
    /// Bytes delivered to the sink this call (post-sanitization, so not
    /// necessarily equal to bytes read).
    pub delivered: usize,
    /// Whether the underlying reader hit EOF (a raw zero-byte read) during
    /// this call. Checked instead of `delivered == 0`, since `CString`
    /// framing still appends a trailing separator on EOF.
    pub hangup: bool,
}

/// Drains `reader` into `sink` according to `framing`, stopping once a read
/// returns fewer bytes than requested (the tokio-native analogue of
/// EAGAIN/EWOULDBLOCK on a non-blocking fd) or hits EOF.
pub async fn read_available<R>(
    reader: &mut R,
    framing: Framing,
    sink: &mut Sink<'_>,
) -> io::Result<ReadOutcome>
where
    R: AsyncRead + Unpin,
{
    const CHUNK: usize = 8192;
    let mut chunk = vec![0u8; CHUNK];
    let mut delivered = 0usize;
    let mut hangup = false;

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if n == 0 {
            hangup = true;
            break;
        }
        match framing {
            Framing::Discard => {
                delivered += n;
            }
            Framing::Raw => {
                deliver(sink, &chunk[..n]);
                delivered += n;
            }
            Framing::CString => {
                let mut sanitized = Vec::with_capacity(n);
                for &b in &chunk[..n] {
                    sanitized.push(if b == 0 { 1 } else { b });
                }
                deliver(sink, &sanitized);
                delivered += sanitized.len();
            }
        }
        if n < CHUNK {
            break;
        }
    }

    if framing == Framing::CString {
        match sink {
            // Heap sink: exactly one trailing \0 per call.
            Sink::Heap(buf) => {
                buf.push(0);
                delivered += 1;
            }
            // Ring sink: append a \0 separator whenever this call produced
            // (or was asked to produce) an envelope, even an empty one.
            Sink::Ring(ring) => {
                ring.push(&[0]);
                delivered += 1;
            }
        }
    }

    Ok(ReadOutcome { delivered, hangup })
}

fn deliver(sink: &mut Sink<'_>, data: &[u8]) {
    match sink {
        Sink::Heap(buf) => buf.extend_from_slice(data),
        Sink::Ring(ring) => ring.push(data),
    }
}
