//! Wire and in-memory data model for the build orchestration core: request
//! and result shapes, node protocol packets, and the task-host sub-protocol.
//!
//! This crate has no behavior of its own — it is the shared vocabulary that
//! `build-core`'s session, scheduler, caches and node providers all speak.

pub use blocker::*;
pub use configuration::*;
pub use logging::*;
pub use packet::*;
pub use request::*;
pub use request_data::*;
pub use result::*;
pub use schedule_response::*;
pub use task_host::*;

mod blocker;
mod configuration;
mod logging;
mod packet;
mod request;
mod request_data;
mod result;
mod schedule_response;
mod task_host;

#[cfg(test)]
pub mod tests {
    use serde::Deserialize;

    pub fn test_deserialization<T>(json: &str, expected: &T)
    where
        T: for<'de> Deserialize<'de> + PartialEq + std::fmt::Debug,
    {
        let value = serde_json::from_str::<T>(json).unwrap();
        assert_eq!(&value, expected);
    }
}
