//! Per-slice views over the store, one per screen concern.
//!
//! Each view owns its last snapshot and last fetch error and refetches on
//! demand. Views do not coordinate with each other.

pub mod activity;
pub mod comments;
pub mod stats;
pub mod user_bets;

pub use activity::ActivityFeed;
pub use comments::CommentThread;
pub use stats::BetStatsFeed;
pub use user_bets::UserBets;
