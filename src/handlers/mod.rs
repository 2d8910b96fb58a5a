// handlers/mod.rs - JSON translation between HTTP and the entity services
//
// Handlers stay thin: extract, call one or two services with the explicit
// principal, wrap the result under a named key. Every failure converts into
// `ApiError` through `?`.

pub mod exercises;
pub mod health;
pub mod profiles;
pub mod statuses;
pub mod users;
pub mod workouts;
