pub mod accounting;
pub mod discover;
pub mod enforce;
pub mod error;
pub mod kill;
pub mod platform;
pub mod process;
pub mod snapshot;
#[cfg(test)]
pub(crate) mod testing;
