#[macro_use]
extern crate quick_error;

pub mod bulletinboard;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod election;
pub mod util;
