// Wed Jan 15 2026 - Alex

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 42;
pub const MIN_PROTOCOL_VERSION: u32 = 29;
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Length prefix plus kind.
const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageKind {
    Ping = b'B' as u32,
    End = b'C' as u32,
    Timeout = b'D' as u32,
    GetNativeEnv = b'E' as u32,
    NativeEnv = b'F' as u32,
    GetCs = b'G' as u32,
    UseCs = b'H' as u32,
    CompileFile = b'I' as u32,
    FileChunk = b'J' as u32,
    CompileResult = b'K' as u32,
    TransferEnv = b'L' as u32,
    GetInternals = b'M' as u32,
    StatusText = b'N' as u32,
    Login = b'O' as u32,
    Stats = b'P' as u32,
    MonLogin = b'Q' as u32,
    MonGetCs = b'R' as u32,
    MonJobBegin = b'S' as u32,
    MonJobDone = b'T' as u32,
    MonLocalJobBegin = b'U' as u32,
    JobLocalBegin = b'V' as u32,
    JobLocalDone = b'W' as u32,
    MonStats = b'X' as u32,
}

impl MessageKind {
    const ALL: [MessageKind; 23] = [
        MessageKind::Ping,
        MessageKind::End,
        MessageKind::Timeout,
        MessageKind::GetNativeEnv,
        MessageKind::NativeEnv,
        MessageKind::GetCs,
        MessageKind::UseCs,
        MessageKind::CompileFile,
        MessageKind::FileChunk,
        MessageKind::CompileResult,
        MessageKind::TransferEnv,
        MessageKind::GetInternals,
        MessageKind::StatusText,
        MessageKind::Login,
        MessageKind::Stats,
        MessageKind::MonLogin,
        MessageKind::MonGetCs,
        MessageKind::MonJobBegin,
        MessageKind::MonJobDone,
        MessageKind::MonLocalJobBegin,
        MessageKind::JobLocalBegin,
        MessageKind::JobLocalDone,
        MessageKind::MonStats,
    ];

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| *kind as u32 == code)
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Ping,
    End,
    MonLogin,
    MonStats { host_id: u32, payload: String },
    /// A known kind whose body this tool never inspects.
    Other(MessageKind),
    /// A kind code not in [`MessageKind`].
    Unhandled { kind: u32 },
}

impl Message {
    pub fn kind_code(&self) -> u32 {
        match self {
            Message::Ping => MessageKind::Ping.code(),
            Message::End => MessageKind::End.code(),
            Message::MonLogin => MessageKind::MonLogin.code(),
            Message::MonStats { .. } => MessageKind::MonStats.code(),
            Message::Other(kind) => kind.code(),
            Message::Unhandled { kind } => *kind,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame of {0} bytes exceeds limit")]
    TooLarge(usize),
    #[error("frame shorter than its header")]
    TooShort,
    #[error("string field overruns frame")]
    StringOverrun,
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    #[error("body truncated")]
    Truncated,
}

pub fn encode(message: &Message, dst: &mut BytesMut) {
    let mut body = BytesMut::new();
    match message {
        Message::MonStats { host_id, payload } => {
            body.put_u32(*host_id);
            put_string(&mut body, payload);
        }
        Message::Ping | Message::End | Message::MonLogin | Message::Other(_) | Message::Unhandled { .. } => {}
    }

    dst.reserve(HEADER_LEN + body.len());
    dst.put_u32((4 + body.len()) as u32);
    dst.put_u32(message.kind_code());
    dst.extend_from_slice(&body);
}

/// Length of the first complete frame in `src`, if one is fully buffered.
pub fn complete_frame_len(src: &[u8]) -> Option<usize> {
    if src.len() < 4 {
        return None;
    }
    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if src.len() - 4 >= len {
        Some(4 + len)
    } else {
        None
    }
}

/// Takes one message off the front of `src`. `Ok(None)` means more bytes are needed.
pub fn decode(src: &mut BytesMut) -> Result<Option<Message>, FrameError> {
    if src.len() < 4 {
        return Ok(None);
    }

    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }
    if len < 4 {
        return Err(FrameError::TooShort);
    }
    if src.len() - 4 < len {
        return Ok(None);
    }

    src.advance(4);
    let mut frame = src.split_to(len);
    let code = frame.get_u32();

    let message = match MessageKind::from_code(code) {
        Some(MessageKind::Ping) => Message::Ping,
        Some(MessageKind::End) => Message::End,
        Some(MessageKind::MonLogin) => Message::MonLogin,
        Some(MessageKind::MonStats) => {
            if frame.remaining() < 4 {
                return Err(FrameError::Truncated);
            }
            let host_id = frame.get_u32();
            let payload = get_string(&mut frame)?;
            Message::MonStats { host_id, payload }
        }
        Some(kind) => Message::Other(kind),
        None => Message::Unhandled { kind: code },
    };

    Ok(Some(message))
}

fn put_string(dst: &mut BytesMut, value: &str) {
    dst.put_u32((value.len() + 1) as u32);
    dst.extend_from_slice(value.as_bytes());
    dst.put_u8(0);
}

fn get_string(src: &mut BytesMut) -> Result<String, FrameError> {
    if src.remaining() < 4 {
        return Err(FrameError::Truncated);
    }
    let len = src.get_u32() as usize;
    if len > src.remaining() {
        return Err(FrameError::StringOverrun);
    }

    let raw = src.split_to(len);
    let text = match raw.last() {
        Some(0) => &raw[..len - 1],
        _ => &raw[..],
    };

    String::from_utf8(text.to_vec()).map_err(|_| FrameError::InvalidUtf8)
}
