//! ID generation utilities
//!
//! Provides identifiers for invocations and output files.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Generate an invocation ID for a tool run
///
/// Format: `inv-{tool}-{timestamp_ms}-{random_hex}`
/// Example: `inv-lecmd-1738300800123-a1b2`
pub fn generate_invocation_id(tool: &str) -> String {
    let random: u16 = rand::rng().random();
    format!("inv-{}-{}-{:04x}", tool, now_ms(), random)
}

/// Generate a UUID for an output file record
pub fn generate_output_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        assert!(ts > 1577836800000); // 2020-01-01
        assert!(ts < 4102444800000); // 2100-01-01
    }

    #[test]
    fn test_generate_invocation_id_format() {
        let id = generate_invocation_id("lecmd");
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "inv");
        assert_eq!(parts[1], "lecmd");
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[3].len(), 4);
        assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_output_uuid_unique() {
        let a = generate_output_uuid();
        let b = generate_output_uuid();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
