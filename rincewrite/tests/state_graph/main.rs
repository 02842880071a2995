//! Integration tests for the generic graph engine: validation, interrupts,
//! patches, streaming and retries on a small numeric state.

#[path = "../init_logging.rs"]
mod init_logging;

mod common;
mod compile;
mod interrupt;
mod retry;
mod stream;
