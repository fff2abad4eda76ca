mod functions;
mod types;

pub use functions::generate_session_id;
pub use types::{Session, SessionId, SessionPayload, UserView};
