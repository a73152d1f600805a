//! SkillSwap marketplace rules
//!
//! Pure functions shared by the server and the client: the credit gate,
//! the publish award, chat room keys and catalog search. Nothing here
//! touches storage or the network.

pub mod chat;
pub mod credits;
pub mod search;
