use super::traits::Status;

/// Build a transport error string from the failing operation, the raw status
/// and the transport's own description of it.
pub fn transport_error(transport: &str, operation: &str, status: Status, message: &str) -> String {
    let message = message.trim();
    if message.is_empty() {
        format!("{transport} {operation} failed ({status})")
    } else {
        format!("{transport} {operation} failed: {message} ({status})")
    }
}
