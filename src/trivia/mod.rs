//! Backend business rules: which period a submission belongs to, which table it lands in, and
//! how registrations and leaderboard reads behave. Everything here is written against
//! [`TriviaStore`](crate::db::TriviaStore), never a concrete database.

use thiserror::Error;

use crate::db::StoreError;

pub mod leaderboard;
pub mod registration;
pub mod routing;
pub mod validate;
pub mod week;

pub type TriviaResult<T> = core::result::Result<T, TriviaError>;

#[derive(Debug, Error)]
pub enum TriviaError {
    #[error("RSN not registered. Please run `/register` first.")]
    NotRegistered,

    #[error(transparent)]
    Store(#[from] StoreError),
}
