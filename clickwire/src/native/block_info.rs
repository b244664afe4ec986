use tokio::io::{AsyncRead, AsyncWrite};

use crate::io::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// Metadata about a block, carried as tagged fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub is_overflows: bool,
    pub bucket_num:   i32,
}

impl Default for BlockInfo {
    fn default() -> Self { BlockInfo { is_overflows: false, bucket_num: -1 } }
}

impl BlockInfo {
    pub(crate) async fn read<R: AsyncRead + Unpin>(reader: &mut ByteReader<R>) -> Result<Self> {
        let mut new = Self::default();
        loop {
            let field_num = reader.read_var_uint().await?;
            match field_num {
                0 => break,
                1 => {
                    new.is_overflows = reader.read_u8().await? != 0;
                }
                2 => {
                    new.bucket_num = reader.read_i32_le().await?;
                }
                field_num => {
                    return Err(Error::Protocol(format!(
                        "unknown block info field number: {field_num}"
                    )));
                }
            }
        }
        Ok(new)
    }

    pub(crate) fn write<W: AsyncWrite + Unpin>(&self, writer: &mut ByteWriter<W>) {
        writer.write_var_uint(1); // Is overflows field
        writer.write_u8(u8::from(self.is_overflows));
        writer.write_var_uint(2); // Bucket num field
        writer.write_i32_le(self.bucket_num);
        writer.write_var_uint(0); // End field
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn round_trip_default() {
        let mut writer = ByteWriter::new(Cursor::new(Vec::new()), Duration::from_secs(5));
        BlockInfo::default().write(&mut writer);
        writer.flush().await.unwrap();

        let mut reader =
            ByteReader::new(Cursor::new(writer.into_inner().into_inner()), Duration::from_secs(5));
        let info = BlockInfo::read(&mut reader).await.unwrap();
        assert_eq!(info, BlockInfo::default());
    }

    #[tokio::test]
    async fn unknown_field_rejected() {
        let mut reader = ByteReader::new(Cursor::new(vec![7_u8]), Duration::from_secs(5));
        assert!(matches!(BlockInfo::read(&mut reader).await, Err(Error::Protocol(_))));
    }
}
