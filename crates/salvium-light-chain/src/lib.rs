//! Chain tracking for the light wallet: the main-chain window, alternative
//! chains, cumulative-difficulty comparison, and chain switching with
//! rollback.

pub mod difficulty;
pub mod tracker;

pub use tracker::{
    AcceptAll, AltBlockRecord, BlockAdmission, BlockValidator, ChainTracker, IncomingBlock,
    ReorgEvent,
};
