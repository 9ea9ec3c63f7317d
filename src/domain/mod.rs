//! Domain model: entities, value objects, the balance rules and the ports
//! that storage backends implement.

pub mod balance;
pub mod dates;
pub mod debt;
pub mod exchange;
pub mod income;
pub mod money;
pub mod payment;
pub mod ports;
pub mod summary;
pub mod user;
