//! Redis error mapping to KvError.

use reqscope_core::kv::KvError;

/// Maps Redis errors to KvError.
pub fn map_redis_error(err: redis::RedisError) -> KvError {
    if err.is_connection_refusal()
        || err.is_timeout()
        || err.is_connection_dropped()
        || err.is_io_error()
    {
        KvError::BackendUnavailable(err.to_string())
    } else {
        KvError::OperationFailed(err.to_string())
    }
}
