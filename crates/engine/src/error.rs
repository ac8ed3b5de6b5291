// In crates/engine/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid risk parameters: {0}")]
    Risk(#[from] risk::Error),

    #[error("Checkpoint store failed: {0}")]
    Store(#[from] store::Error),

    #[error("Engine mailbox is closed")]
    MailboxClosed,

    #[error("Engine dropped the reply before answering")]
    ReplyDropped,
}

pub type Result<T> = std::result::Result<T, Error>;
