//! Domain tests module.
//!
//! - Golden tests: end-to-end turns checked against expected snapshots
//! - Property tests: proptest-driven invariants of the reducer and ledger
//! - Replay tests: raw wire sequences through the normalizer and reducer
