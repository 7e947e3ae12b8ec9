//! Per-connection protocol pipeline.
//!
//! Configured once per lease from the protocol the connection negotiated,
//! before anything is written. Multiplexed connections get the two HTTP/2
//! adapters in front of the common stages; single-stream connections use the
//! common stages directly.

use crate::base::failure::Failure;
use crate::base::neterror::NetError;
use crate::http::frame::{Inbound, Outbound, RequestFrame, ResponseEvent, StreamId};
use crate::http::h2adapter::{Http2ToHttpInbound, HttpToHttp2Outbound};
use crate::socket::connection::Connection;
use std::collections::VecDeque;
use std::fmt;

/// Wire protocol of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http11,
    Http2,
}

impl Protocol {
    /// Match an ALPN protocol id.
    pub fn from_negotiated(value: &str) -> Option<Self> {
        match value {
            "http/1.1" => Some(Protocol::Http11),
            "h2" => Some(Protocol::Http2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http11 => "http/1.1",
            Protocol::Http2 => "h2",
        }
    }

    pub fn is_multiplexed(&self) -> bool {
        matches!(self, Protocol::Http2)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One installed pipeline stage, in installation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Http2ToHttpInbound,
    HttpToHttp2Outbound,
    StreamingTransport,
    ResponseEvents,
}

#[derive(Debug)]
enum Framing {
    Single,
    Multiplexed {
        outbound: HttpToHttp2Outbound,
        inbound: Http2ToHttpInbound,
    },
}

/// The configured pipeline of one leased connection.
#[derive(Debug)]
pub struct Pipeline {
    protocol: Protocol,
    stages: Vec<Stage>,
    framing: Framing,
}

impl Pipeline {
    /// Configure the pipeline for `connection`'s negotiated protocol.
    ///
    /// Fails with [`Failure::UnknownProtocol`] for anything other than
    /// `"http/1.1"` or `"h2"`. On a multiplexed connection this allocates the
    /// stream the exchange will use.
    pub fn configure(connection: &mut Connection) -> Result<Pipeline, Failure> {
        let negotiated = connection.negotiated_protocol();
        let protocol = Protocol::from_negotiated(negotiated)
            .ok_or_else(|| Failure::UnknownProtocol(negotiated.to_string()))?;

        let mut stages = Vec::with_capacity(4);
        let framing = match protocol {
            Protocol::Http2 => {
                let stream_id = connection.next_stream_id();
                stages.push(Stage::Http2ToHttpInbound);
                stages.push(Stage::HttpToHttp2Outbound);
                Framing::Multiplexed {
                    outbound: HttpToHttp2Outbound::new(stream_id),
                    inbound: Http2ToHttpInbound::new(stream_id),
                }
            }
            Protocol::Http11 => Framing::Single,
        };
        stages.push(Stage::StreamingTransport);
        stages.push(Stage::ResponseEvents);

        tracing::debug!(
            connection = %connection.id(),
            protocol = %protocol,
            stages = ?stages,
            "pipeline configured"
        );
        Ok(Pipeline {
            protocol,
            stages,
            framing,
        })
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Stream allocated for this exchange, on multiplexed connections.
    pub fn stream_id(&self) -> Option<StreamId> {
        match &self.framing {
            Framing::Single => None,
            Framing::Multiplexed { outbound, .. } => Some(outbound.stream_id()),
        }
    }

    /// Translate a request frame for the wire. `None` means nothing needs to
    /// be written for it.
    pub fn encode(&mut self, frame: RequestFrame) -> Option<Outbound> {
        match &mut self.framing {
            Framing::Single => Some(Outbound::Single(frame)),
            Framing::Multiplexed { outbound, .. } => outbound.encode(frame).map(Outbound::Multiplexed),
        }
    }

    /// Translate an inbound frame into response events appended to `out`.
    pub fn decode(&mut self, frame: Inbound, out: &mut VecDeque<ResponseEvent>) -> Result<(), Failure> {
        match (&self.framing, frame) {
            (Framing::Single, Inbound::Single(event)) => {
                out.push_back(event);
                Ok(())
            }
            (Framing::Multiplexed { inbound, .. }, Inbound::Multiplexed(frame)) => {
                inbound.decode(frame, out)
            }
            (_, frame) => {
                tracing::debug!(protocol = %self.protocol, frame = ?frame, "frame does not match pipeline");
                Err(NetError::InvalidHttpResponse.into())
            }
        }
    }
}
