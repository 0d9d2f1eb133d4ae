mod api_client;
mod config;
mod helpers;
mod multiplexer;
mod pipeline;
mod remote_store;
