use crate::mutation::ObserverId;
use crate::types::NodeKey;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomError {
    #[error("invalid node key {0:?}")]
    InvalidKey(NodeKey),
    #[error("no live node for key {0:?}")]
    MissingKey(NodeKey),
    #[error("node {0:?} has the wrong kind for this operation")]
    WrongNodeKind(NodeKey),
    #[error("node {0:?} cannot take this parent/child relation")]
    InvalidParent(NodeKey),
    #[error("{before:?} is not a child of {parent:?}")]
    InvalidSibling { parent: NodeKey, before: NodeKey },
    #[error("appending {child:?} under {parent:?} would create a cycle")]
    CycleDetected { parent: NodeKey, child: NodeKey },
    #[error("unknown observer {0:?}")]
    UnknownObserver(ObserverId),
}
