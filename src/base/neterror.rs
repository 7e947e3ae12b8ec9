use std::io;
use thiserror::Error;

/// Network error codes visible to a request execution.
///
/// Numbering follows Chromium's `net_error_list.h` so codes stay comparable
/// with other tooling.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Socket not connected")]
    SocketNotConnected,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("No buffer space")]
    NoBufferSpace,

    // HTTP Errors
    #[error("Invalid HTTP response")]
    InvalidHttpResponse,

    // HTTP/2 stream and session errors
    #[error("HTTP/2 protocol error")]
    Http2ProtocolError,
    #[error("HTTP/2 server refused stream")]
    Http2ServerRefusedStream,
    #[error("HTTP/2 flow control error")]
    Http2FlowControlError,
    #[error("HTTP/2 frame size error")]
    Http2FrameSizeError,
    #[error("HTTP/2 compression error")]
    Http2CompressionError,
    #[error("HTTP/2 RST_STREAM NO_ERROR received")]
    Http2RstStreamNoErrorReceived,
    #[error("HTTP/2 stream closed")]
    Http2StreamClosed,

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::SocketNotConnected => -112,
            NetError::ConnectionTimedOut => -118,
            NetError::NoBufferSpace => -176,
            NetError::Http2ProtocolError => -337,
            NetError::Http2ServerRefusedStream => -351,
            NetError::Http2FlowControlError => -361,
            NetError::Http2FrameSizeError => -362,
            NetError::Http2CompressionError => -363,
            NetError::InvalidHttpResponse => -370,
            NetError::Http2RstStreamNoErrorReceived => -372,
            NetError::Http2StreamClosed => -376,
            NetError::Unknown(code) => *code,
        }
    }

    /// Map an HTTP/2 `RST_STREAM` error code (RFC 9113 §7) to a network error.
    pub fn from_h2_reset_code(code: u32) -> Self {
        match code {
            0x0 => NetError::Http2RstStreamNoErrorReceived,
            0x1 => NetError::Http2ProtocolError,
            0x3 => NetError::Http2FlowControlError,
            0x6 => NetError::Http2FrameSizeError,
            0x7 => NetError::Http2ServerRefusedStream,
            0x9 => NetError::Http2CompressionError,
            _ => NetError::Http2StreamClosed,
        }
    }

    /// Whether the error means the underlying connection is no longer usable.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            NetError::ConnectionClosed
                | NetError::ConnectionReset
                | NetError::ConnectionRefused
                | NetError::ConnectionAborted
                | NetError::ConnectionFailed
                | NetError::SocketNotConnected
                | NetError::ConnectionTimedOut
        )
    }
}

impl From<&io::Error> for NetError {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            io::ErrorKind::NotConnected => NetError::SocketNotConnected,
            io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => NetError::ConnectionClosed,
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            io::ErrorKind::OutOfMemory => NetError::NoBufferSpace,
            _ => NetError::ConnectionFailed,
        }
    }
}

impl From<io::Error> for NetError {
    fn from(err: io::Error) -> Self {
        NetError::from(&err)
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -112 => NetError::SocketNotConnected,
            -118 => NetError::ConnectionTimedOut,
            -176 => NetError::NoBufferSpace,
            -337 => NetError::Http2ProtocolError,
            -351 => NetError::Http2ServerRefusedStream,
            -361 => NetError::Http2FlowControlError,
            -362 => NetError::Http2FrameSizeError,
            -363 => NetError::Http2CompressionError,
            -370 => NetError::InvalidHttpResponse,
            -372 => NetError::Http2RstStreamNoErrorReceived,
            -376 => NetError::Http2StreamClosed,
            _ => NetError::Unknown(code),
        }
    }
}
