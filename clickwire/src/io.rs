use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::READ_CHUNK_SIZE;
use crate::native::protocol::MAX_STRING_SIZE;
use crate::{Error, Result};

/// Buffered reader over the raw socket.
///
/// Incoming bytes accumulate in an internal buffer and are consumed through a
/// cursor. Consumed bytes stay buffered until [`ByteReader::advance`] reclaims
/// them, which the packet loop calls once a full server packet has been
/// parsed.
pub(crate) struct ByteReader<R> {
    inner: R,
    buf: BytesMut,
    pos: usize,
    timeout: Duration,
}

impl<R: AsyncRead + Unpin> ByteReader<R> {
    pub(crate) fn new(inner: R, timeout: Duration) -> Self {
        Self { inner, buf: BytesMut::with_capacity(READ_CHUNK_SIZE), pos: 0, timeout }
    }

    /// Pulls at least one byte off the socket into the buffer.
    async fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let n = tokio::time::timeout(self.timeout, self.inner.read(&mut chunk))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        if n == 0 {
            return Err(Error::Protocol("read fail".into()));
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(())
    }

    /// Returns the next `n` bytes, filling from the socket until enough have
    /// accumulated.
    pub(crate) async fn read_fixed(&mut self, n: usize) -> Result<&[u8]> {
        while self.buf.len() - self.pos < n {
            self.fill().await?;
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..self.pos])
    }

    pub(crate) async fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_fixed(N).await?);
        Ok(out)
    }

    pub(crate) async fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_fixed(1).await?[0])
    }

    pub(crate) async fn read_i32_le(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array().await?))
    }

    pub(crate) async fn read_var_uint(&mut self) -> Result<u64> {
        let mut out = 0u64;
        for i in 0..9u64 {
            let octet = self.read_u8().await?;
            out |= u64::from(octet & 0x7F) << (7 * i);
            if (octet & 0x80) == 0 {
                break;
            }
        }
        Ok(out)
    }

    /// Server strings carry a single length byte. Names and type text never
    /// exceed 255 bytes in the frames this client reads, and the insert path
    /// enforces the same bound on what it sends.
    pub(crate) async fn read_string(&mut self) -> Result<Vec<u8>> {
        let len = usize::from(self.read_u8().await?);
        Ok(self.read_fixed(len).await?.to_vec())
    }

    pub(crate) async fn read_utf8_string(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.read_string().await?)?)
    }

    /// Discards everything consumed so far, reclaiming buffer space.
    /// Unconsumed bytes are preserved.
    pub(crate) fn advance(&mut self) {
        self.buf.advance(self.pos);
        self.pos = 0;
    }
}

/// Buffered writer over the raw socket.
///
/// Frame pieces append synchronously to an internal buffer and
/// [`ByteWriter::flush`] pushes the accumulated frame to the socket, so a
/// multi-part client packet goes out in a single write.
pub(crate) struct ByteWriter<W> {
    inner: W,
    buf: BytesMut,
    timeout: Duration,
}

impl<W: AsyncWrite + Unpin> ByteWriter<W> {
    pub(crate) fn new(inner: W, timeout: Duration) -> Self {
        Self { inner, buf: BytesMut::with_capacity(READ_CHUNK_SIZE), timeout }
    }

    #[expect(clippy::cast_possible_truncation)]
    pub(crate) fn write_var_uint(&mut self, mut value: u64) {
        let mut buf = [0u8; 9]; // Max 9 bytes for u64
        let mut pos = 0;

        while pos < 9 {
            let mut byte = value & 0x7F;
            value >>= 7;
            if value > 0 {
                byte |= 0x80;
            }
            buf[pos] = byte as u8;
            pos += 1;
            if value == 0 {
                break;
            }
        }
        self.buf.put_slice(&buf[..pos]);
    }

    pub(crate) fn write_string<V: AsRef<[u8]>>(&mut self, value: V) -> Result<()> {
        let value = value.as_ref();
        if value.len() > MAX_STRING_SIZE {
            return Err(Error::Protocol(format!(
                "string too large: {} > {MAX_STRING_SIZE}",
                value.len()
            )));
        }
        self.write_var_uint(value.len() as u64);
        self.buf.put_slice(value);
        Ok(())
    }

    /// Strings the server reads back through single-length-byte framing.
    /// The length goes out as one raw byte, so anything over 255 is rejected
    /// before it can desync the stream.
    pub(crate) fn write_short_string<V: AsRef<[u8]>>(&mut self, value: V) -> Result<()> {
        let value = value.as_ref();
        let Ok(len) = u8::try_from(value.len()) else {
            return Err(Error::Encoding(format!(
                "string too long for single-byte framing: {} > 255",
                value.len()
            )));
        };
        self.write_u8(len);
        self.buf.put_slice(value);
        Ok(())
    }

    pub(crate) fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub(crate) fn write_i32_le(&mut self, value: i32) {
        self.buf.put_slice(&value.to_le_bytes());
    }

    pub(crate) fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Pushes the accumulated frame to the socket and clears the buffer.
    pub(crate) async fn flush(&mut self) -> Result<()> {
        let timeout = self.timeout;
        let io = async {
            self.inner.write_all(&self.buf).await?;
            self.inner.flush().await
        };
        tokio::time::timeout(timeout, io).await.map_err(|_| Error::Timeout(timeout))??;
        self.buf.clear();
        Ok(())
    }

    pub(crate) async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
impl<W> ByteWriter<W> {
    pub(crate) fn into_inner(self) -> W { self.inner }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn reader(bytes: Vec<u8>) -> ByteReader<Cursor<Vec<u8>>> {
        ByteReader::new(Cursor::new(bytes), TIMEOUT)
    }

    fn writer() -> ByteWriter<Cursor<Vec<u8>>> {
        ByteWriter::new(Cursor::new(Vec::new()), TIMEOUT)
    }

    #[tokio::test]
    async fn var_uint_round_trip() {
        let mut values = vec![0_u64, 1, 2, (1 << 35) - 1];
        for shift in 1..35_u64 {
            let v = 1 << shift;
            values.extend([v - 1, v, v + 1]);
        }

        let mut writer = writer();
        for &v in &values {
            writer.write_var_uint(v);
        }
        writer.flush().await.unwrap();

        let mut reader = reader(writer.into_inner().into_inner());
        for &v in &values {
            assert_eq!(reader.read_var_uint().await.unwrap(), v);
        }
    }

    #[tokio::test]
    async fn string_round_trip_through_single_length_byte() {
        // Up to 127 bytes the written var_uint length is a single byte, so
        // the read side's one-byte framing lines up with the write side.
        let mut writer = writer();
        writer.write_string("").unwrap();
        writer.write_string("hello").unwrap();
        writer.write_string(vec![b'x'; 127]).unwrap();
        writer.flush().await.unwrap();

        let mut reader = reader(writer.into_inner().into_inner());
        assert_eq!(reader.read_string().await.unwrap(), b"");
        assert_eq!(reader.read_utf8_string().await.unwrap(), "hello");
        assert_eq!(reader.read_string().await.unwrap(), vec![b'x'; 127]);
    }

    #[tokio::test]
    async fn read_string_accepts_lengths_up_to_255() {
        let mut bytes = vec![200_u8];
        bytes.extend(vec![b'y'; 200]);
        bytes.push(0);

        let mut reader = reader(bytes);
        assert_eq!(reader.read_string().await.unwrap(), vec![b'y'; 200]);
        assert_eq!(reader.read_string().await.unwrap(), b"");
    }

    #[tokio::test]
    async fn short_string_round_trips_at_every_length() {
        // Between 128 and 255 a var_uint length would take two bytes, so the
        // short framing writes the length as one raw byte instead.
        let mut writer = writer();
        writer.write_short_string(vec![b'a'; 255]).unwrap();
        writer.write_short_string(vec![b'b'; 128]).unwrap();
        writer.write_short_string("").unwrap();
        writer.flush().await.unwrap();

        let mut reader = reader(writer.into_inner().into_inner());
        assert_eq!(reader.read_string().await.unwrap(), vec![b'a'; 255]);
        assert_eq!(reader.read_string().await.unwrap(), vec![b'b'; 128]);
        assert_eq!(reader.read_string().await.unwrap(), b"");
    }

    #[tokio::test]
    async fn short_string_rejects_over_255() {
        let mut writer = writer();
        assert!(matches!(
            writer.write_short_string(vec![b'a'; 256]),
            Err(Error::Encoding(_))
        ));
    }

    #[tokio::test]
    async fn i32_little_endian() {
        let mut writer = writer();
        writer.write_i32_le(-1);
        writer.write_i32_le(0x0102_0304);
        writer.flush().await.unwrap();

        let bytes = writer.into_inner().into_inner();
        assert_eq!(bytes, vec![0xFF, 0xFF, 0xFF, 0xFF, 0x04, 0x03, 0x02, 0x01]);

        let mut reader = reader(bytes);
        assert_eq!(reader.read_i32_le().await.unwrap(), -1);
        assert_eq!(reader.read_i32_le().await.unwrap(), 0x0102_0304);
    }

    #[tokio::test]
    async fn advance_discards_consumed_bytes() {
        let mut reader = reader(vec![1, 2, 3, 4, 5]);
        assert_eq!(reader.read_u8().await.unwrap(), 1);
        assert_eq!(reader.read_u8().await.unwrap(), 2);

        reader.advance();
        assert_eq!(reader.pos, 0);
        assert_eq!(reader.read_fixed(3).await.unwrap(), &[3, 4, 5]);
    }

    #[tokio::test]
    async fn exhausted_stream_errors() {
        let mut reader = reader(vec![1]);
        assert_eq!(reader.read_u8().await.unwrap(), 1);
        assert!(matches!(reader.read_u8().await, Err(Error::Protocol(_))));
    }
}
