//! # Repository Implementations
//!
//! One repository per collection. Repositories are cheap pool handles;
//! methods suffixed `_conn` take `&mut SqliteConnection` so they can
//! participate in the check-in and checkout transactions.

pub mod bill;
pub mod product;
pub mod promotion;
pub mod session;
pub mod setting;
pub mod station;
