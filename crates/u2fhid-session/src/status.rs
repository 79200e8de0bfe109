/// Error status reported by the device in an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeviceStatus {
    #[error("invalid command")]
    InvalidCommand,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("invalid message length")]
    InvalidLength,
    #[error("invalid message sequencing")]
    InvalidSequence,
    #[error("message timed out")]
    MessageTimeout,
    #[error("channel busy")]
    ChannelBusy,
    #[error("command requires channel lock")]
    LockRequired,
    #[error("sync failed")]
    SyncFailed,
    #[error("unspecified error")]
    Other,
    #[error("unknown error code {0:#04x}")]
    Unknown(u8),
}

pub const ERR_INVALID_CMD: u8 = 0x01;
pub const ERR_INVALID_PAR: u8 = 0x02;
pub const ERR_INVALID_LEN: u8 = 0x03;
pub const ERR_INVALID_SEQ: u8 = 0x04;
pub const ERR_MSG_TIMEOUT: u8 = 0x05;
pub const ERR_CHANNEL_BUSY: u8 = 0x06;
pub const ERR_LOCK_REQUIRED: u8 = 0x0a;
pub const ERR_SYNC_FAIL: u8 = 0x0b;
pub const ERR_OTHER: u8 = 0x7f;

impl DeviceStatus {
    /// The status byte as sent by the device.
    pub fn code(self) -> u8 {
        match self {
            DeviceStatus::InvalidCommand => ERR_INVALID_CMD,
            DeviceStatus::InvalidParameter => ERR_INVALID_PAR,
            DeviceStatus::InvalidLength => ERR_INVALID_LEN,
            DeviceStatus::InvalidSequence => ERR_INVALID_SEQ,
            DeviceStatus::MessageTimeout => ERR_MSG_TIMEOUT,
            DeviceStatus::ChannelBusy => ERR_CHANNEL_BUSY,
            DeviceStatus::LockRequired => ERR_LOCK_REQUIRED,
            DeviceStatus::SyncFailed => ERR_SYNC_FAIL,
            DeviceStatus::Other => ERR_OTHER,
            DeviceStatus::Unknown(code) => code,
        }
    }

    /// Returns true if retrying the same request later may succeed.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            DeviceStatus::ChannelBusy | DeviceStatus::MessageTimeout | DeviceStatus::LockRequired
        )
    }
}

impl From<u8> for DeviceStatus {
    fn from(code: u8) -> Self {
        match code {
            ERR_INVALID_CMD => DeviceStatus::InvalidCommand,
            ERR_INVALID_PAR => DeviceStatus::InvalidParameter,
            ERR_INVALID_LEN => DeviceStatus::InvalidLength,
            ERR_INVALID_SEQ => DeviceStatus::InvalidSequence,
            ERR_MSG_TIMEOUT => DeviceStatus::MessageTimeout,
            ERR_CHANNEL_BUSY => DeviceStatus::ChannelBusy,
            ERR_LOCK_REQUIRED => DeviceStatus::LockRequired,
            ERR_SYNC_FAIL => DeviceStatus::SyncFailed,
            ERR_OTHER => DeviceStatus::Other,
            other => DeviceStatus::Unknown(other),
        }
    }
}
