use {
    super::*,
    snafu::ResultExt,
    tokio::time::{self, timeout_at},
};

/// A full scratchpad arrives as a single line of hex.
const MAX_LINE_LENGTH: usize = SCRATCHPAD_CAPACITY_WORDS * 16 + 64 * 1024;

const INCOMING_BUFFER: usize = 64;

/// A newline-delimited JSON-RPC channel to a Stratum pool. A reader task parses incoming
/// lines and forwards every message; requests are written directly.
pub(crate) struct Connection {
    writer: BufWriter<OwnedWriteHalf>,
    incoming: mpsc::Receiver<Message>,
    reader: JoinHandle<()>,
    last_received: time::Instant,
    next_id: u64,
    protocol_dump: bool,
}

impl Connection {
    /// Tries each address in order and keeps the first that accepts.
    pub(crate) async fn connect(
        addresses: &[SocketAddr],
        limit: Duration,
        protocol_dump: bool,
    ) -> Result<Self> {
        let mut last_error = None;

        for address in addresses {
            let stream = match timeout(limit, TcpStream::connect(address)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(source)) => {
                    warn!("Failed to connect to {address}: {source}");
                    last_error = Some(SessionError::Io { source });
                    continue;
                }
                Err(_) => {
                    warn!("Timed out connecting to {address}");
                    last_error = Some(SessionError::Timeout { timeout: limit });
                    continue;
                }
            };

            stream.set_nodelay(true).context(IoSnafu)?;

            debug!("Connected to {address}");

            return Ok(Self::new(stream, protocol_dump));
        }

        Err(last_error.unwrap_or(SessionError::Disconnected))
    }

    fn new(stream: TcpStream, protocol_dump: bool) -> Self {
        let (reader, writer) = stream.into_split();

        let (tx, incoming) = mpsc::channel(INCOMING_BUFFER);

        let reader = tokio::spawn(Self::reader_task(
            FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            tx,
            protocol_dump,
        ));

        Self {
            writer: BufWriter::new(writer),
            incoming,
            reader,
            last_received: time::Instant::now(),
            next_id: 0,
            protocol_dump,
        }
    }

    async fn reader_task(
        mut reader: FramedRead<OwnedReadHalf, LinesCodec>,
        tx: mpsc::Sender<Message>,
        protocol_dump: bool,
    ) {
        while let Some(result) = reader.next().await {
            let line = match result {
                Ok(line) => line,
                Err(err) => {
                    error!("Read error: {err}");
                    break;
                }
            };

            if protocol_dump {
                debug!("<- {line}");
            }

            if line.trim().is_empty() {
                continue;
            }

            let message = match serde_json::from_str::<Message>(&line) {
                Ok(message) => message,
                Err(err) => {
                    warn!("Invalid JSON message ({} bytes): {err}", line.len());
                    continue;
                }
            };

            if tx.send(message).await.is_err() {
                debug!("Message forwarding dropped: session gone");
                break;
            }
        }
    }

    /// Writes a request and returns its id.
    pub(crate) async fn send(&mut self, method: &str, params: impl Serialize) -> Result<u64> {
        self.next_id += 1;

        let id = self.next_id;

        let message = Message::request(id, method, params).context(SerializationSnafu)?;

        let frame = serde_json::to_string(&message).context(SerializationSnafu)?;

        if self.protocol_dump {
            debug!("-> {frame}");
        }

        self.writer
            .write_all(frame.as_bytes())
            .await
            .context(IoSnafu)?;
        self.writer.write_all(b"\n").await.context(IoSnafu)?;
        self.writer.flush().await.context(IoSnafu)?;

        Ok(id)
    }

    /// Waits for the next message. A pool that has sent nothing for `limit`, counted from the
    /// last message received rather than from this call, counts as a dead one.
    pub(crate) async fn recv(&mut self, limit: Duration) -> Result<Message> {
        match timeout_at(self.last_received + limit, self.incoming.recv()).await {
            Ok(Some(message)) => {
                self.last_received = time::Instant::now();
                Ok(message)
            }
            Ok(None) => DisconnectedSnafu.fail(),
            Err(_) => TimeoutSnafu { timeout: limit }.fail(),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
