use log::{debug, info};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::board::Side;
use crate::error::{CheckersError, Result};
use crate::wire::{Seat, WireMove, REQUEST_STEP, REQUEST_TURN, TERMINATOR};

const MAX_RECORD: usize = 128;

/// Connection to the two-player relay. Every message in either direction ends with `.`.
pub struct PeerLink<S = TcpStream> {
    stream: BufReader<S>,
}

impl PeerLink<TcpStream> {
    pub async fn connect(address: &str) -> Result<Self> {
        let stream = TcpStream::connect(address).await.map_err(CheckersError::Connectivity)?;
        info!("Connected to relay at {}", address);
        Ok(Self::from_stream(stream))
    }
}

impl<S> PeerLink<S> where S: AsyncRead + AsyncWrite + Unpin {
    pub fn from_stream(stream: S) -> Self {
        Self { stream: BufReader::new(stream) }
    }

    pub async fn send(&mut self, message: &str) -> Result<()> {
        self.stream.write_all(message.as_bytes()).await.map_err(CheckersError::Connectivity)?;
        self.stream.flush().await.map_err(CheckersError::Connectivity)?;
        debug!("Sent to relay: {}", message);
        Ok(())
    }

    /// Reads up to and including the terminator, at most `MAX_RECORD` bytes.
    pub async fn receive(&mut self) -> Result<String> {
        let mut record = Vec::new();
        (&mut self.stream).take(MAX_RECORD as u64)
            .read_until(TERMINATOR as u8, &mut record)
            .await
            .map_err(CheckersError::Connectivity)?;
        if record.last() != Some(&(TERMINATOR as u8)) {
            if record.len() < MAX_RECORD {
                return Err(CheckersError::Disconnected);
            }
            return Err(CheckersError::InvalidMessage(
                format!("relay message exceeds {} bytes without '{}'", MAX_RECORD, TERMINATOR)
            ));
        }
        let record = String::from_utf8_lossy(&record).into_owned();
        debug!("Received from relay: {}", record);
        Ok(record)
    }

    /// Asks the relay whose turn it is; `Side::COMPUTER` means the peer moves next.
    pub async fn request_turn(&mut self) -> Result<Side> {
        self.send(REQUEST_TURN).await?;
        let reply = self.receive().await?;
        Ok(Seat::parse_turn_reply(&reply)?)
    }

    /// Asks the relay for the peer's next move record.
    pub async fn request_step(&mut self) -> Result<WireMove> {
        self.send(REQUEST_STEP).await?;
        let reply = self.receive().await?;
        Ok(reply.parse::<WireMove>()?)
    }

    pub async fn send_move(&mut self, record: &WireMove) -> Result<()> {
        self.send(&record.to_string()).await
    }
}
