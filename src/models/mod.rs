//! Data Models Module
//!
//! Request and response DTOs for the admin HTTP API.

pub mod requests;
pub mod responses;

pub use requests::{ClearRequest, SetRequest};
pub use responses::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetResponse, SwitchResponse,
};
