// Error codes implementation
// Standardized, stable error codes for the check-in services.
// Codes are part of the public contract: never renumber, only append.

pub mod session {
    pub const NOT_FOUND: &str = "CHECKIN_1001";
    pub const NOT_ACTIVE: &str = "CHECKIN_1002";
    pub const EXPIRED: &str = "CHECKIN_1003";
    pub const TIMED_OUT: &str = "CHECKIN_1004";
    pub const CONCURRENT_MODIFICATION: &str = "CHECKIN_1005";
    pub const FINALIZING: &str = "CHECKIN_1006";
}

pub mod input {
    pub const ALREADY_ANSWERED: &str = "CHECKIN_2001";
    pub const OUT_OF_RANGE: &str = "CHECKIN_2002";
    pub const EMPTY_ANSWER: &str = "CHECKIN_2003";
    pub const SESSION_INCOMPLETE: &str = "CHECKIN_2004";
}

pub mod downstream {
    pub const UNAVAILABLE: &str = "CHECKIN_3001";
    pub const TRANSCRIPTION_CANCELLED: &str = "CHECKIN_3002";
    pub const EXTRACTION_DEGRADED: &str = "CHECKIN_3003";
}

pub mod internal {
    pub const STORAGE: &str = "CHECKIN_4001";
    pub const CONFIGURATION: &str = "CHECKIN_4002";
}
