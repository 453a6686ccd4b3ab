//! HTTP host for the portal: request-id plumbing, middleware stack and the
//! router that mounts the session gate.

pub mod request_id;
pub mod web;
