//! function-api: the remote function-management boundary for devstrip
//!
//! Two operations are consumed from the cloud provider:
//! - fetch the live configuration of one function
//! - delete the reserved-concurrency setting of one function
//!
//! Both are modelled by the [`FunctionApi`] trait. [`HttpFunctionApi`] talks to a
//! REST endpoint; [`fakes::MemoryFunctionApi`] is an in-memory stand-in for tests
//! and dry runs.

pub mod api;
pub mod error;
pub mod fakes;
pub mod http;

pub use api::{ApiResult, FunctionApi, RemoteFunctionConfiguration};
pub use error::FunctionApiError;
pub use http::{FunctionApiConfig, HttpFunctionApi};
