// Client identity advertised during the handshake and echoed in the
// client-info section of every query. The version pair and the protocol
// revision in `native::protocol` drive server-side feature negotiation, so
// they are fixed independently of the crate version.
pub(super) const CLIENT_NAME: &str = "CLICKWIRE-CLIENT";
pub(super) const CLIENT_VERSION_MAJOR: u64 = 1;
pub(super) const CLIENT_VERSION_MINOR: u64 = 1;

// 16KB receive and 8MB send buffer sizes
pub(super) const TCP_READ_BUFFER_SIZE: u32 = 16 * 1024; // 16KB
pub(super) const TCP_WRITE_BUFFER_SIZE: u32 = 8 * 1024 * 1024; // 8MB
// Connection establishment and socket reads
pub(super) const TCP_CONNECT_TIMEOUT: u64 = 30;
pub(super) const TCP_READ_TIMEOUT: u64 = 30;
// Keep alive
pub(super) const TCP_KEEP_ALIVE_SECS: u64 = 60;
pub(super) const TCP_KEEP_ALIVE_INTERVAL: u64 = 10;
pub(super) const TCP_KEEP_ALIVE_RETRIES: u32 = 6;

// Socket reads refill the parse buffer in chunks of this size.
pub(super) const READ_CHUNK_SIZE: usize = 4096;
