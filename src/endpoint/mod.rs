//! Endpoint declarations and the startup registry

pub mod descriptor;
pub mod registry;

pub use descriptor::{
    arg_query_params, body_without_id, EndpointRequest, InvalidatesTags, Method,
    MutationEndpoint, ProvidesTags, QueryEndpoint, ResponseKind,
};
pub use registry::EndpointRegistry;
