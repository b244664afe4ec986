use chrono_tz::Tz;
use tokio::io::{AsyncRead, AsyncWrite};

use super::block_info::BlockInfo;
use super::protocol::{
    ClientPacketId, DBMS_MIN_REVISION_WITH_BLOCK_INFO, DBMS_MIN_REVISION_WITH_TEMPORARY_TABLES,
};
use super::types::{Type, decode_column};
use super::values::Value;
use crate::io::{ByteReader, ByteWriter};
use crate::{Result, Row};

/// A column head: name and type text as they appear on the wire, plus the
/// parsed type driving the codec. The raw text is kept so inserts can echo
/// the server's spelling back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name:      String,
    pub type_text: String,
    pub type_:     Type,
}

/// A decoded data block. Values are column-major in `column_data`: `rows`
/// values per column, columns in head order.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub info:        BlockInfo,
    pub rows:        u64,
    pub columns:     Vec<Column>,
    pub column_data: Vec<Value>,
}

/// Outcome of reading a data packet body.
pub(crate) enum BlockRead {
    Block(Block),
    /// The name slot carried the next packet's code instead of a name; the
    /// dispatch loop handles it without reading a fresh code.
    Forwarded(u64),
}

impl Block {
    /// Reads a block body, everything following the DATA packet code.
    #[expect(clippy::cast_possible_truncation)]
    pub(crate) async fn read<R: AsyncRead + Unpin>(
        reader: &mut ByteReader<R>,
        revision: u64,
        tz: Tz,
    ) -> Result<BlockRead> {
        if revision >= DBMS_MIN_REVISION_WITH_TEMPORARY_TABLES {
            match reader.read_var_uint().await? {
                0 => {}
                1 => {
                    // A forwarded DATA code; the real name slot follows.
                    let _ = reader.read_string().await?;
                }
                code => return Ok(BlockRead::Forwarded(code)),
            }
        }

        let info = if revision >= DBMS_MIN_REVISION_WITH_BLOCK_INFO {
            BlockInfo::read(reader).await?
        } else {
            BlockInfo::default()
        };

        let n_columns = reader.read_var_uint().await?;
        let rows = reader.read_var_uint().await?;

        let mut columns = Vec::with_capacity(n_columns as usize);
        let mut column_data = Vec::new();
        for _ in 0..n_columns {
            let name = reader.read_utf8_string().await?;
            let type_text = reader.read_utf8_string().await?;
            let type_ = Type::parse(&type_text)?;
            let mut values = decode_column(reader, &type_, rows as usize, tz).await?;
            column_data.append(&mut values);
            columns.push(Column { name, type_text, type_ });
        }

        Ok(BlockRead::Block(Block { info, rows, columns, column_data }))
    }

    /// Converts the block into row maps, preserving column order.
    #[expect(clippy::cast_possible_truncation)]
    pub(crate) fn into_rows(mut self) -> Vec<Row> {
        let rows = self.rows as usize;
        let mut out = vec![Row::default(); rows];
        let mut column_data = std::mem::take(&mut self.column_data);
        for column in &self.columns {
            for (i, value) in column_data.drain(..rows).enumerate() {
                if let Some(row) = out.get_mut(i) {
                    let _ = row.insert(column.name.clone(), value);
                }
            }
        }
        out
    }
}

/// Writes the lead-in of a client data packet: the packet code, an empty
/// table name, and default block info, the trailing two gated on revision.
pub(crate) fn write_block_head<W: AsyncWrite + Unpin>(
    writer: &mut ByteWriter<W>,
    revision: u64,
) -> Result<()> {
    writer.write_var_uint(ClientPacketId::Data as u64);
    if revision >= DBMS_MIN_REVISION_WITH_TEMPORARY_TABLES {
        writer.write_string("")?;
    }
    if revision >= DBMS_MIN_REVISION_WITH_BLOCK_INFO {
        BlockInfo::default().write(writer);
    }
    Ok(())
}
