//! Page ↔ store message channel.
//!
//! Requests carry no correlation ids: a reply is applied against whatever the
//! page looks like when it arrives. Delivery is FIFO per direction.

use core_types::{TimestampMs, VideoId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

pub type PortId = u64;

/// Page → store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StoreRequest {
    Query {
        video_ids: Vec<VideoId>,
    },
    Watch {
        video_id: VideoId,
        video_title: String,
        timestamp: TimestampMs,
    },
}

impl StoreRequest {
    pub fn query(video_ids: Vec<VideoId>) -> Self {
        StoreRequest::Query { video_ids }
    }

    pub fn to_json(&self) -> Result<String, BusError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(input: &str) -> Result<Self, BusError> {
        Ok(serde_json::from_str(input)?)
    }
}

/// Store → page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StoreReply {
    QueryReply {
        result: BTreeMap<VideoId, bool>,
    },
    UpdateWatched {
        video_id: VideoId,
        watched: bool,
    },
    HideProgressBar,
    /// Any message kind this page does not understand.
    #[serde(other)]
    Unknown,
}

impl StoreReply {
    pub fn to_json(&self) -> Result<String, BusError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(input: &str) -> Result<Self, BusError> {
        Ok(serde_json::from_str(input)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("malformed store message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Fire-and-forget outbound side of the store channel.
pub trait StoreChannel {
    fn post(&self, request: StoreRequest);
}

impl<T: StoreChannel + ?Sized> StoreChannel for &T {
    fn post(&self, request: StoreRequest) {
        (**self).post(request);
    }
}

impl StoreChannel for Sender<StoreRequest> {
    fn post(&self, request: StoreRequest) {
        if let Err(err) = self.send(request) {
            log::debug!(target: "bus", "store channel closed, dropping {:?}", err.0);
        }
    }
}

#[derive(Debug)]
pub enum StoreCommand {
    Connect {
        port: PortId,
        reply_tx: Sender<StoreReply>,
    },
    Request {
        port: PortId,
        request: StoreRequest,
    },
    Disconnect {
        port: PortId,
    },
}

/// Shared command side of the store runtime; hands out page ports.
pub struct Bus {
    cmd_tx: Sender<StoreCommand>,
    next_port: AtomicU64,
}

impl Bus {
    pub fn new() -> (Bus, Receiver<StoreCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let bus = Bus {
            cmd_tx,
            next_port: AtomicU64::new(1),
        };
        (bus, cmd_rx)
    }

    pub fn connect(&self) -> Port {
        let id = self.next_port.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = mpsc::channel();
        if self
            .cmd_tx
            .send(StoreCommand::Connect { port: id, reply_tx })
            .is_err()
        {
            log::debug!(target: "bus", "store runtime gone, port {id} will stay silent");
        }
        Port {
            sender: PortSender {
                id,
                cmd_tx: self.cmd_tx.clone(),
            },
            replies: reply_rx,
        }
    }
}

/// One page's connection: an outbound sender and the inbound reply queue.
pub struct Port {
    pub sender: PortSender,
    pub replies: Receiver<StoreReply>,
}

impl Port {
    pub fn id(&self) -> PortId {
        self.sender.id
    }

    pub fn try_recv(&self) -> Option<StoreReply> {
        self.replies.try_recv().ok()
    }

    /// `None` on timeout or once the store side hung up.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StoreReply> {
        match self.replies.recv_timeout(timeout) {
            Ok(reply) => Some(reply),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PortSender {
    id: PortId,
    cmd_tx: Sender<StoreCommand>,
}

impl PortSender {
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Stops replies and broadcasts to this port.
    pub fn disconnect(&self) {
        if self.cmd_tx.send(StoreCommand::Disconnect { port: self.id }).is_err() {
            log::debug!(target: "bus", "store runtime gone, port {} already closed", self.id);
        }
    }
}

impl StoreChannel for PortSender {
    fn post(&self, request: StoreRequest) {
        let port = self.id;
        if let Err(err) = self.cmd_tx.send(StoreCommand::Request { port, request }) {
            log::debug!(target: "bus", "store runtime gone, dropping {:?}", err.0);
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod testing {
    use super::{StoreChannel, StoreRequest};
    use core_types::VideoId;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Captures every posted request in order.
    #[derive(Clone, Default)]
    pub struct RecordingChannel {
        sent: Rc<RefCell<Vec<StoreRequest>>>,
    }

    impl RecordingChannel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn take(&self) -> Vec<StoreRequest> {
            std::mem::take(&mut *self.sent.borrow_mut())
        }

        pub fn len(&self) -> usize {
            self.sent.borrow().len()
        }

        pub fn is_empty(&self) -> bool {
            self.sent.borrow().is_empty()
        }

        /// Ids of every `query` request, one inner vec per request.
        pub fn queries(&self) -> Vec<Vec<VideoId>> {
            self.sent
                .borrow()
                .iter()
                .filter_map(|req| match req {
                    StoreRequest::Query { video_ids } => Some(video_ids.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn watches(&self) -> Vec<VideoId> {
            self.sent
                .borrow()
                .iter()
                .filter_map(|req| match req {
                    StoreRequest::Watch { video_id, .. } => Some(video_id.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl StoreChannel for RecordingChannel {
        fn post(&self, request: StoreRequest) {
            self.sent.borrow_mut().push(request);
        }
    }
}
