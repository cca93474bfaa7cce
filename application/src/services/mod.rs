//! Orchestration services
//!
//! Leaf-first: the [`request_client`] wraps the [`session_manager`]; the
//! [`scheduler`] and the [`convergence`] loop dispatch through the
//! run-scoped [`dispatch`] context.

pub mod convergence;
pub mod dispatch;
pub mod generation_role_handler;
pub mod request_client;
pub mod scheduler;
pub mod session_manager;

#[cfg(test)]
pub(crate) mod test_support;
