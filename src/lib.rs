pub mod api;
pub mod collab;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod lifecycle;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Actor, ActorType, Deal, DealId, DealItem, DealStatus, Decimal, Payment, PaymentId,
    PaymentStatus, PersonId, TimeMs,
};
pub use error::AppError;
pub use lifecycle::DealLifecycle;
