use async_trait::async_trait;
use std::fmt;

use crate::engine::RankId;
use crate::errors::TransportError;

/// The driver calls a queue makes, used by test drivers to select and record them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverCall {
    TransferIn,
    TransferOut,
    Launch,
    ReadLog,
}

impl fmt::Display for DriverCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DriverCall::TransferIn => "transfer_in",
            DriverCall::TransferOut => "transfer_out",
            DriverCall::Launch => "launch",
            DriverCall::ReadLog => "read_log",
        })
    }
}

/// Byte-level access to one rank.
///
/// Every call is awaited to completion from the rank's own queue worker, so a
/// driver never sees two concurrent calls for the same rank from the queue. It
/// can see concurrent calls for different ranks. The transfer size is the
/// length of the buffer.
#[async_trait]
pub trait TransportDriver: Send + Sync {
    /// Copy `data` to `address` on `rank`.
    async fn transfer_in(&self, rank: RankId, address: u32, data: &[u8]) -> Result<(), TransportError>;

    /// Fill `data` from `address` on `rank`.
    async fn transfer_out(&self, rank: RankId, address: u32, data: &mut [u8]) -> Result<(), TransportError>;

    /// Boot the loaded program on `rank` and wait until it finishes.
    async fn launch(&self, rank: RankId) -> Result<(), TransportError>;

    /// Fetch whatever the program printed during its last run.
    async fn read_log(&self, _rank: RankId) -> Result<Vec<u8>, TransportError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str;
}
