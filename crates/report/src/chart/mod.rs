pub mod rpc_latency;
pub mod time_to_commit;
