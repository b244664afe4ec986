use strum::AsRefStr;
use tokio::io::AsyncRead;

use crate::io::ByteReader;
use crate::prelude::*;
use crate::{Error, Result, ServerError};

pub(crate) const DBMS_MIN_REVISION_WITH_TEMPORARY_TABLES: u64 = 50264;
pub(crate) const DBMS_MIN_REVISION_WITH_TOTAL_ROWS_IN_PROGRESS: u64 = 51554;
pub(crate) const DBMS_MIN_REVISION_WITH_BLOCK_INFO: u64 = 51903;
pub(crate) const DBMS_MIN_REVISION_WITH_CLIENT_INFO: u64 = 54032;
pub(crate) const DBMS_MIN_REVISION_WITH_SERVER_TIMEZONE: u64 = 54058;
pub(crate) const DBMS_MIN_REVISION_WITH_QUOTA_KEY_IN_CLIENT_INFO: u64 = 54060;

/// Protocol revision advertised in the hello packet. Optional frame sections
/// in both directions are then gated on the revision the server reports back,
/// stored as-is in [`ServerInfo`].
pub(crate) const DBMS_TCP_PROTOCOL_VERSION: u64 = 54213;

pub(crate) const MAX_STRING_SIZE: usize = 1 << 30;

#[repr(u64)]
#[derive(Clone, Copy, Debug)]
pub(crate) enum QueryProcessingStage {
    #[expect(unused)]
    FetchColumns,
    #[expect(unused)]
    WithMergeableState,
    Complete,
}

#[repr(u64)]
#[derive(Clone, Copy, Debug)]
pub(crate) enum ClientPacketId {
    Hello,
    Query,
    Data,
    #[expect(unused)]
    Cancel,
    Ping,
}

#[repr(u64)]
#[derive(Clone, Copy, Debug, AsRefStr)]
pub(crate) enum ServerPacketId {
    Hello,
    Data,
    Exception,
    Progress,
    Pong,
    EndOfStream,
    ProfileInfo,
    Totals,
    Extremes,
}

impl ServerPacketId {
    pub(crate) fn from_u64(i: u64) -> Result<Self> {
        Ok(match i {
            0 => ServerPacketId::Hello,
            1 => ServerPacketId::Data,
            2 => ServerPacketId::Exception,
            3 => ServerPacketId::Progress,
            4 => ServerPacketId::Pong,
            5 => ServerPacketId::EndOfStream,
            6 => ServerPacketId::ProfileInfo,
            7 => ServerPacketId::Totals,
            8 => ServerPacketId::Extremes,
            x => {
                error!("invalid packet id from server: {}", x);
                return Err(Error::Protocol(format!("undefined response code {i}")));
            }
        })
    }
}

/// Server identity captured from the handshake reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub name:          String,
    pub major_version: u64,
    pub minor_version: u64,
    pub revision:      u64,
    pub timezone:      Option<String>,
}

impl ServerInfo {
    pub(crate) async fn read<R: AsyncRead + Unpin>(reader: &mut ByteReader<R>) -> Result<Self> {
        let name = reader.read_utf8_string().await?;
        let major_version = reader.read_var_uint().await?;
        let minor_version = reader.read_var_uint().await?;
        let revision = reader.read_var_uint().await?;
        let timezone = if revision >= DBMS_MIN_REVISION_WITH_SERVER_TIMEZONE {
            Some(reader.read_utf8_string().await?)
        } else {
            None
        };
        Ok(Self { name, major_version, minor_version, revision, timezone })
    }
}

/// Query execution progress.
/// Values are delta and must be summed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub read_rows:          u64,
    pub read_bytes:         u64,
    pub total_rows_to_read: u64,
}

impl Progress {
    pub(crate) async fn read<R: AsyncRead + Unpin>(
        reader: &mut ByteReader<R>,
        revision: u64,
    ) -> Result<Self> {
        let read_rows = reader.read_var_uint().await?;
        let read_bytes = reader.read_var_uint().await?;
        let total_rows_to_read = if revision >= DBMS_MIN_REVISION_WITH_TOTAL_ROWS_IN_PROGRESS {
            reader.read_var_uint().await?
        } else {
            0
        };
        Ok(Self { read_rows, read_bytes, total_rows_to_read })
    }
}

impl std::ops::Add for Progress {
    type Output = Progress;

    fn add(self, rhs: Self) -> Self::Output {
        Self::Output {
            read_rows:          self.read_rows.saturating_add(rhs.read_rows),
            read_bytes:         self.read_bytes.saturating_add(rhs.read_bytes),
            total_rows_to_read: self.total_rows_to_read.saturating_add(rhs.total_rows_to_read),
        }
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self { read_rows, read_bytes, total_rows_to_read } = self;
        write!(f, "{read_rows}/{total_rows_to_read} rows, {read_bytes} bytes")
    }
}

/// Stream statistics the server reports once per query, ahead of the end of
/// the stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProfileInfo {
    pub rows:                         u64,
    pub blocks:                       u64,
    pub bytes:                        u64,
    pub applied_limit:                bool,
    pub rows_before_limit:            u64,
    pub calculated_rows_before_limit: bool,
}

impl ProfileInfo {
    pub(crate) async fn read<R: AsyncRead + Unpin>(reader: &mut ByteReader<R>) -> Result<Self> {
        let rows = reader.read_var_uint().await?;
        let blocks = reader.read_var_uint().await?;
        let bytes = reader.read_var_uint().await?;
        let applied_limit = reader.read_var_uint().await? != 0;
        let rows_before_limit = reader.read_var_uint().await?;
        let calculated_rows_before_limit = reader.read_var_uint().await? != 0;
        Ok(Self {
            rows,
            blocks,
            bytes,
            applied_limit,
            rows_before_limit,
            calculated_rows_before_limit,
        })
    }
}

/// Reads an exception payload and folds it into a [`ServerError`].
///
/// Servers repeat the exception name as a `{name}: ` prefix on the message;
/// the prefix is dropped so the message carries only the description.
pub(crate) async fn read_exception<R: AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
) -> Result<ServerError> {
    let code = reader.read_i32_le().await?;
    let name = reader.read_utf8_string().await?;
    let message = String::from_utf8_lossy(&reader.read_string().await?).into_owned();
    let message = match message.strip_prefix(name.as_str()) {
        Some(rest) => rest.strip_prefix(':').unwrap_or(rest).trim_start().to_string(),
        None => message,
    };
    Ok(ServerError { code, message })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use super::*;

    fn reader(bytes: Vec<u8>) -> ByteReader<Cursor<Vec<u8>>> {
        ByteReader::new(Cursor::new(bytes), Duration::from_secs(5))
    }

    fn put_string(bytes: &mut Vec<u8>, s: &str) {
        bytes.push(u8::try_from(s.len()).unwrap());
        bytes.extend_from_slice(s.as_bytes());
    }

    #[test]
    fn packet_id_bounds() {
        assert!(matches!(ServerPacketId::from_u64(0).unwrap(), ServerPacketId::Hello));
        assert!(matches!(ServerPacketId::from_u64(8).unwrap(), ServerPacketId::Extremes));
        let err = ServerPacketId::from_u64(9).unwrap_err();
        assert!(err.to_string().contains("undefined response code 9"));
    }

    #[tokio::test]
    async fn exception_drops_name_prefix() {
        let mut bytes = (-1_i32).to_le_bytes().to_vec();
        put_string(&mut bytes, "DB::Exception");
        put_string(&mut bytes, "DB::Exception: Table not found");

        let error = read_exception(&mut reader(bytes)).await.unwrap();
        assert_eq!(error.code, -1);
        assert_eq!(error.message, "Table not found");
    }

    #[tokio::test]
    async fn exception_without_prefix_kept_whole() {
        let mut bytes = 57_i32.to_le_bytes().to_vec();
        put_string(&mut bytes, "DB::Exception");
        put_string(&mut bytes, "table already exists");

        let error = read_exception(&mut reader(bytes)).await.unwrap();
        assert_eq!(error.code, 57);
        assert_eq!(error.message, "table already exists");
    }

    #[tokio::test]
    async fn progress_total_rows_gated_on_revision() {
        let bytes = vec![10, 20, 30];
        let progress =
            Progress::read(&mut reader(bytes.clone()), DBMS_MIN_REVISION_WITH_TOTAL_ROWS_IN_PROGRESS)
                .await
                .unwrap();
        assert_eq!(progress, Progress { read_rows: 10, read_bytes: 20, total_rows_to_read: 30 });

        let progress = Progress::read(&mut reader(bytes), 50000).await.unwrap();
        assert_eq!(progress, Progress { read_rows: 10, read_bytes: 20, total_rows_to_read: 0 });
    }
}
