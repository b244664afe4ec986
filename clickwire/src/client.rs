//! Connection handling and the operation surface: handshake, queries,
//! streaming inserts, and ping.
//!
//! A [`Client`] owns one socket and runs one request at a time. Every
//! operation writes its frames, then drains server packets until a terminal
//! one, so the stream is always at a packet boundary between calls.

mod options;
mod tcp;

use chrono_tz::Tz;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;

pub use self::options::ClientOptions;
pub use self::tcp::Destination;
use crate::constants::{CLIENT_NAME, CLIENT_VERSION_MAJOR, CLIENT_VERSION_MINOR};
use crate::io::{ByteReader, ByteWriter};
use crate::native::block::{Block, BlockRead, Column, write_block_head};
use crate::native::protocol::{
    ClientPacketId, DBMS_MIN_REVISION_WITH_CLIENT_INFO,
    DBMS_MIN_REVISION_WITH_QUOTA_KEY_IN_CLIENT_INFO, DBMS_TCP_PROTOCOL_VERSION,
    QueryProcessingStage, ServerPacketId, read_exception,
};
use crate::native::types::encode_column;
use crate::prelude::*;
use crate::query::Qid;
use crate::{Error, Result, Row};

/// Outcome of a completed round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Column heads from the first data block of the response.
    pub columns:   Vec<Column>,
    /// Decoded rows in server order.
    pub rows:      Vec<Row>,
    /// Total rows decoded across all data blocks.
    pub row_count: u64,
    /// Progress counters summed over the stream.
    pub progress:  Progress,
    /// Stream statistics, when the server sent them.
    pub profile:   Option<ProfileInfo>,
}

/// Terminal packets a receive pass can end on.
enum Terminal {
    Hello,
    EndOfStream,
    Pong,
}

/// A connection to `ClickHouse`, generic over the transport stream.
pub struct Client<S> {
    reader:         ByteReader<ReadHalf<S>>,
    writer:         ByteWriter<WriteHalf<S>>,
    server:         ServerInfo,
    server_tz:      Tz,
    // Response state, reset at the start of each receive pass
    columns:        Vec<Column>,
    rows:           Vec<Row>,
    total_rows:     u64,
    progress:       Progress,
    profile:        Option<ProfileInfo>,
    // Table header cached by `write_start` for the insert in flight
    insert_columns: Option<Vec<Column>>,
}

impl Client<TcpStream> {
    /// Opens a TCP connection and performs the handshake.
    #[instrument(
        level = "debug",
        name = "clickwire.connect",
        skip_all,
        fields(db.system = "clickhouse")
    )]
    pub async fn connect(
        destination: impl Into<Destination>,
        options: ClientOptions,
    ) -> Result<Self> {
        let destination = destination.into();
        let addrs = destination.resolve(options.ipv4_only).await?;
        let stream = tcp::connect_socket(&addrs, options.connect_timeout).await?;
        debug!("Connected to {destination}");
        Self::handshake(stream, options).await
    }
}

impl<S: AsyncRead + AsyncWrite> Client<S> {
    /// Performs the hello exchange over an established stream.
    pub async fn handshake(stream: S, options: ClientOptions) -> Result<Self> {
        let (read, write) = tokio::io::split(stream);
        let mut client = Self {
            reader:         ByteReader::new(read, options.read_timeout),
            writer:         ByteWriter::new(write, options.read_timeout),
            server:         ServerInfo::default(),
            server_tz:      Tz::UTC,
            columns:        Vec::new(),
            rows:           Vec::new(),
            total_rows:     0,
            progress:       Progress::default(),
            profile:        None,
            insert_columns: None,
        };

        client.send_hello(&options)?;
        client.writer.flush().await?;
        match client.receive().await? {
            Terminal::Hello => {}
            _ => return Err(Error::Connect("server did not answer the hello".into())),
        }
        debug!(
            server = %client.server.name,
            revision = client.server.revision,
            timezone = client.server.timezone.as_deref().unwrap_or(""),
            "handshake complete"
        );
        Ok(client)
    }

    /// Identity and capabilities the server reported during the handshake.
    pub fn server_info(&self) -> &ServerInfo { &self.server }

    /// Round-trips a ping.
    #[instrument(level = "trace", name = "clickwire.ping", skip_all)]
    pub async fn ping(&mut self) -> Result<()> {
        self.writer.write_var_uint(ClientPacketId::Ping as u64);
        self.writer.flush().await?;
        match self.receive().await? {
            Terminal::Pong => Ok(()),
            _ => Err(Error::Protocol("expected pong".into())),
        }
    }

    /// Runs a query and collects the full result set.
    #[instrument(skip_all, fields(db.system = "clickhouse", db.operation = "query"))]
    pub async fn query(&mut self, query: impl Into<ParsedQuery>) -> Result<QueryResult> {
        let query = query.into();
        let qid = Qid::new();
        self.send_query(qid, &query)?;
        self.write_empty_block()?;
        self.writer.flush().await?;
        trace!(%qid, "query sent");
        match self.receive().await? {
            Terminal::EndOfStream => Ok(self.take_result()),
            _ => Err(Error::Protocol("query did not run to end of stream".into())),
        }
    }

    /// Runs a statement for its side effects, returning the count of rows the
    /// server streamed back.
    pub async fn execute(&mut self, query: impl Into<ParsedQuery>) -> Result<u64> {
        Ok(self.query(query).await?.row_count)
    }

    /// Inserts rows in one shot: start, a single block, end.
    #[instrument(skip_all, fields(db.system = "clickhouse", db.operation = "insert"))]
    pub async fn insert(
        &mut self,
        table: &str,
        columns: &[impl AsRef<str>],
        rows: &[Row],
    ) -> Result<QueryResult> {
        self.write_start(table, columns).await?;
        self.write_block(rows).await?;
        self.write_end().await
    }

    /// Opens a streaming insert: sends the INSERT query and caches the column
    /// header the server answers with. Progress packets during setup are
    /// drained and dropped.
    pub async fn write_start(&mut self, table: &str, columns: &[impl AsRef<str>]) -> Result<()> {
        let fields = columns.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",");
        let query = format!("INSERT INTO {} ({fields}) VALUES ", table.trim());
        let qid = Qid::new();
        self.insert_columns = None;
        self.send_query(qid, &query)?;
        self.write_empty_block()?;
        self.writer.flush().await?;
        trace!(%qid, table, "insert started");

        let mut forwarded = None;
        loop {
            let code = match forwarded.take() {
                Some(code) => code,
                None => self.reader.read_var_uint().await?,
            };
            match ServerPacketId::from_u64(code)? {
                ServerPacketId::Data => {
                    let read =
                        Block::read(&mut self.reader, self.server.revision, self.server_tz).await?;
                    match read {
                        BlockRead::Forwarded(code) => forwarded = Some(code),
                        BlockRead::Block(block) => {
                            self.insert_columns = Some(block.columns);
                            self.reader.advance();
                            return Ok(());
                        }
                    }
                }
                ServerPacketId::Progress => {
                    let _ = Progress::read(&mut self.reader, self.server.revision).await?;
                }
                ServerPacketId::Exception => {
                    let error = read_exception(&mut self.reader).await?;
                    error!("received exception: {error}");
                    return Err(Error::Server(error));
                }
                packet => {
                    return Err(Error::Protocol(format!(
                        "unexpected response {} during insert setup",
                        packet.as_ref()
                    )));
                }
            }
            self.reader.advance();
        }
    }

    /// Sends one block of rows, column-major, against the header cached by
    /// [`Client::write_start`].
    pub async fn write_block(&mut self, rows: &[Row]) -> Result<()> {
        let Self { writer, insert_columns, server, .. } = self;
        let columns = insert_columns
            .as_ref()
            .ok_or_else(|| Error::Protocol("must call write_start first".into()))?;

        write_block_head(writer, server.revision)?;
        writer.write_var_uint(columns.len() as u64);
        writer.write_var_uint(rows.len() as u64);

        let mut values = Vec::with_capacity(rows.len());
        for column in columns {
            values.clear();
            for (i, row) in rows.iter().enumerate() {
                let value = row.get(&column.name).ok_or_else(|| {
                    Error::Encoding(format!("row {i} missing value for column `{}`", column.name))
                })?;
                values.push(value.clone());
            }
            writer.write_short_string(&column.name)?;
            writer.write_short_string(&column.type_text)?;
            encode_column(writer, &column.name, &column.type_, &values)?;
            writer.flush().await?;
        }
        writer.flush().await?;
        Ok(())
    }

    /// Closes the insert stream with an empty block and drains the server's
    /// acknowledgement.
    pub async fn write_end(&mut self) -> Result<QueryResult> {
        self.write_empty_block()?;
        self.writer.flush().await?;
        self.insert_columns = None;
        match self.receive().await? {
            Terminal::EndOfStream => Ok(self.take_result()),
            _ => Err(Error::Protocol("insert did not run to end of stream".into())),
        }
    }

    /// Closes the write half. The server drops the connection in turn.
    pub async fn shutdown(mut self) -> Result<()> { self.writer.shutdown().await }

    fn send_hello(&mut self, options: &ClientOptions) -> Result<()> {
        self.writer.write_var_uint(ClientPacketId::Hello as u64);
        self.writer.write_string(CLIENT_NAME)?;
        self.writer.write_var_uint(CLIENT_VERSION_MAJOR);
        self.writer.write_var_uint(CLIENT_VERSION_MINOR);
        self.writer.write_var_uint(DBMS_TCP_PROTOCOL_VERSION);
        self.writer.write_string(&options.default_database)?;
        self.writer.write_string(&options.username)?;
        self.writer.write_string(options.password.get())?;
        Ok(())
    }

    fn send_query(&mut self, qid: Qid, query: &str) -> Result<()> {
        let revision = self.server.revision;
        self.writer.write_var_uint(ClientPacketId::Query as u64);
        qid.write_id(&mut self.writer)?;
        if revision >= DBMS_MIN_REVISION_WITH_CLIENT_INFO {
            self.write_client_info(revision)?;
        }
        self.writer.write_var_uint(0); // end of settings
        self.writer.write_var_uint(QueryProcessingStage::Complete as u64);
        self.writer.write_var_uint(0); // compression disabled
        self.writer.write_string(query)?;
        Ok(())
    }

    // Minimal identification: initial user, query id, os user, and hostname
    // stay empty, with the loopback placeholder for the initial address.
    fn write_client_info(&mut self, revision: u64) -> Result<()> {
        self.writer.write_var_uint(1); // initial query
        self.writer.write_string("")?; // initial user
        self.writer.write_string("")?; // initial query id
        self.writer.write_string("[::ffff:127.0.0.1]:0")?; // initial address
        self.writer.write_var_uint(1); // tcp interface
        self.writer.write_string("")?; // os user
        self.writer.write_string("")?; // hostname
        self.writer.write_string(CLIENT_NAME)?;
        self.writer.write_var_uint(CLIENT_VERSION_MAJOR);
        self.writer.write_var_uint(CLIENT_VERSION_MINOR);
        self.writer.write_var_uint(DBMS_TCP_PROTOCOL_VERSION);
        if revision >= DBMS_MIN_REVISION_WITH_QUOTA_KEY_IN_CLIENT_INFO {
            self.writer.write_string("")?; // quota key
        }
        Ok(())
    }

    /// Terminating empty block: zero columns, zero rows.
    fn write_empty_block(&mut self) -> Result<()> {
        write_block_head(&mut self.writer, self.server.revision)?;
        self.writer.write_var_uint(0);
        self.writer.write_var_uint(0);
        Ok(())
    }

    fn take_result(&mut self) -> QueryResult {
        QueryResult {
            columns:   std::mem::take(&mut self.columns),
            rows:      std::mem::take(&mut self.rows),
            row_count: self.total_rows,
            progress:  self.progress,
            profile:   self.profile.take(),
        }
    }

    /// Drains server packets until a terminal one, accumulating rows,
    /// progress, and profile info along the way.
    async fn receive(&mut self) -> Result<Terminal> {
        self.columns.clear();
        self.rows.clear();
        self.total_rows = 0;
        self.progress = Progress::default();
        self.profile = None;

        let mut forwarded = None;
        loop {
            let code = match forwarded.take() {
                Some(code) => code,
                None => self.reader.read_var_uint().await?,
            };
            let packet = ServerPacketId::from_u64(code)?;
            trace!(packet = packet.as_ref(), "received packet");
            match packet {
                ServerPacketId::Hello => {
                    self.server = ServerInfo::read(&mut self.reader).await?;
                    self.server_tz = self
                        .server
                        .timezone
                        .as_deref()
                        .and_then(|tz| tz.parse::<Tz>().ok())
                        .unwrap_or(Tz::UTC);
                    self.reader.advance();
                    return Ok(Terminal::Hello);
                }
                ServerPacketId::Data => {
                    let read =
                        Block::read(&mut self.reader, self.server.revision, self.server_tz).await?;
                    match read {
                        BlockRead::Forwarded(code) => forwarded = Some(code),
                        BlockRead::Block(block) => {
                            if self.columns.is_empty() && !block.columns.is_empty() {
                                self.columns = block.columns.clone();
                            }
                            self.total_rows += block.rows;
                            self.rows.extend(block.into_rows());
                        }
                    }
                }
                ServerPacketId::Exception => {
                    let error = read_exception(&mut self.reader).await?;
                    error!("received exception: {error}");
                    return Err(Error::Server(error));
                }
                ServerPacketId::Progress => {
                    let progress = Progress::read(&mut self.reader, self.server.revision).await?;
                    self.progress = self.progress + progress;
                }
                ServerPacketId::Pong => {
                    self.reader.advance();
                    return Ok(Terminal::Pong);
                }
                ServerPacketId::EndOfStream => {
                    self.reader.advance();
                    return Ok(Terminal::EndOfStream);
                }
                ServerPacketId::ProfileInfo => {
                    self.profile = Some(ProfileInfo::read(&mut self.reader).await?);
                }
                ServerPacketId::Totals | ServerPacketId::Extremes => {
                    // Decoded and dropped; only the main stream accumulates.
                    let read =
                        Block::read(&mut self.reader, self.server.revision, self.server_tz).await?;
                    if let BlockRead::Forwarded(code) = read {
                        forwarded = Some(code);
                    }
                }
            }
            self.reader.advance();
        }
    }
}
