//! Response status codes
//!
//! Codes are 4-digit integers partitioned by range:
//!
//! | Range     | Meaning                          | HTTP |
//! |-----------|----------------------------------|------|
//! | 1000-1999 | success                          | 200  |
//! | 2000-2999 | warning                          | 200  |
//! | 3000-3999 | request / session validation     | 400  |
//! | 4000-4999 | object-level errors              | 4xx  |
//! | 5000-5999 | server errors                    | 500  |
//!
//! Unknown codes are logged and reported as 503 "Unknown Reason".

use tracing::warn;

/// Numeric response code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Code(pub u16);

struct Entry {
    code: u16,
    http: u16,
    message: &'static str,
}

pub const OK: Code = Code(1000);
pub const CREATED: Code = Code(1001);
pub const UPDATED: Code = Code(1002);
pub const DELETED: Code = Code(1003);
pub const PARTIAL_RESULT: Code = Code(2000);
pub const REQUEST_REUSED: Code = Code(2001);

pub const INVALID_REQUEST: Code = Code(3000);
pub const NOT_AUTHENTICATED: Code = Code(3001);
pub const INVALID_PARAMETER: Code = Code(3002);
pub const INVALID_STORE_SESSION: Code = Code(3003);
pub const STORE_SESSION_EXPIRED: Code = Code(3004);

pub const ACCESS_DENIED: Code = Code(4000);
pub const NOT_A_MEMBER: Code = Code(4001);
pub const USER_BLOCKED: Code = Code(4002);
pub const OBJECT_BLOCKED: Code = Code(4003);
pub const SELF_NOT_ALLOWED: Code = Code(4004);
pub const LAST_MANAGER: Code = Code(4005);
pub const USER_NOT_FOUND: Code = Code(4010);
pub const ORG_NOT_FOUND: Code = Code(4011);
pub const STORE_NOT_FOUND: Code = Code(4012);
pub const OBJECT_NOT_FOUND: Code = Code(4013);
pub const TEMPLATE_NOT_FOUND: Code = Code(4014);
pub const INVITATION_NOT_FOUND: Code = Code(4015);
pub const REQUEST_NOT_FOUND: Code = Code(4016);
pub const ACTION_NOT_FOUND: Code = Code(4017);
pub const KEY_NOT_FOUND: Code = Code(4018);
pub const IMMUTABLE: Code = Code(4020);
pub const CONFLICT: Code = Code(4021);
pub const INVITATION_EXPIRED: Code = Code(4022);
pub const REQUEST_EXPIRED: Code = Code(4023);
pub const WRONG_PASSWORD: Code = Code(4030);

pub const SERVER_ERROR: Code = Code(5000);
pub const CONFIG_ERROR: Code = Code(5001);
pub const DATABASE_ERROR: Code = Code(5010);
pub const SHARD_ERROR: Code = Code(5011);
pub const CRYPTO_FAILURE: Code = Code(5020);
pub const QUEUE_ERROR: Code = Code(5030);

const TABLE: &[Entry] = &[
    Entry { code: 1000, http: 200, message: "OK" },
    Entry { code: 1001, http: 200, message: "Created" },
    Entry { code: 1002, http: 200, message: "Updated" },
    Entry { code: 1003, http: 200, message: "Deleted" },
    Entry { code: 2000, http: 200, message: "Partial result" },
    Entry { code: 2001, http: 200, message: "Existing request reused" },
    Entry { code: 3000, http: 400, message: "Invalid request" },
    Entry { code: 3001, http: 401, message: "Not authenticated" },
    Entry { code: 3002, http: 400, message: "Invalid parameter" },
    Entry { code: 3003, http: 400, message: "Invalid store session" },
    Entry { code: 3004, http: 400, message: "Store session expired" },
    Entry { code: 4000, http: 403, message: "Access denied" },
    Entry { code: 4001, http: 403, message: "Not a member" },
    Entry { code: 4002, http: 403, message: "User blocked" },
    Entry { code: 4003, http: 403, message: "Object blocked" },
    Entry { code: 4004, http: 403, message: "Operation not allowed on self" },
    Entry { code: 4005, http: 409, message: "Last role manager" },
    Entry { code: 4010, http: 404, message: "User not found" },
    Entry { code: 4011, http: 404, message: "Organization not found" },
    Entry { code: 4012, http: 404, message: "Store not found" },
    Entry { code: 4013, http: 404, message: "Object not found" },
    Entry { code: 4014, http: 404, message: "Template not found" },
    Entry { code: 4015, http: 404, message: "Invitation not found" },
    Entry { code: 4016, http: 404, message: "Request not found" },
    Entry { code: 4017, http: 404, message: "Action not found" },
    Entry { code: 4018, http: 404, message: "Key not found" },
    Entry { code: 4020, http: 409, message: "Immutable" },
    Entry { code: 4021, http: 409, message: "Already in use" },
    Entry { code: 4022, http: 410, message: "Invitation expired" },
    Entry { code: 4023, http: 410, message: "Request expired" },
    Entry { code: 4030, http: 403, message: "Wrong password" },
    Entry { code: 5000, http: 500, message: "Server error" },
    Entry { code: 5001, http: 500, message: "Configuration error" },
    Entry { code: 5010, http: 500, message: "Database error" },
    Entry { code: 5011, http: 500, message: "Shard resolution error" },
    Entry { code: 5020, http: 500, message: "Cryptographic failure" },
    Entry { code: 5030, http: 500, message: "Queue error" },
];

impl Code {
    fn entry(&self) -> Option<&'static Entry> {
        TABLE.iter().find(|e| e.code == self.0)
    }

    /// True if the code appears in the status table
    pub fn is_known(&self) -> bool {
        self.entry().is_some()
    }

    /// HTTP status carried with this code
    pub fn http_status(&self) -> u16 {
        match self.entry() {
            Some(e) => e.http,
            None => {
                warn!(code = self.0, "unknown response code");
                503
            }
        }
    }

    /// Human-readable message
    pub fn message(&self) -> &'static str {
        match self.entry() {
            Some(e) => e.message,
            None => {
                warn!(code = self.0, "unknown response code");
                "Unknown Reason"
            }
        }
    }

    pub fn is_success(&self) -> bool {
        (1000..2000).contains(&self.0)
    }

    pub fn is_warning(&self) -> bool {
        (2000..3000).contains(&self.0)
    }

    pub fn is_validation(&self) -> bool {
        (3000..4000).contains(&self.0)
    }

    pub fn is_object_error(&self) -> bool {
        (4000..5000).contains(&self.0)
    }

    pub fn is_server_error(&self) -> bool {
        (5000..6000).contains(&self.0)
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_map_to_http() {
        assert_eq!(OK.http_status(), 200);
        assert_eq!(INVALID_PARAMETER.http_status(), 400);
        assert_eq!(DATABASE_ERROR.http_status(), 500);
    }

    #[test]
    fn test_unknown_code() {
        let code = Code(4999);
        assert!(!code.is_known());
        assert_eq!(code.http_status(), 503);
        assert_eq!(code.message(), "Unknown Reason");
    }

    #[test]
    fn test_table_codes_are_unique_and_in_range() {
        let mut seen = std::collections::HashSet::new();
        for entry in TABLE {
            assert!(seen.insert(entry.code), "duplicate code {}", entry.code);
            assert!((1000..6000).contains(&entry.code));
        }
    }
}
