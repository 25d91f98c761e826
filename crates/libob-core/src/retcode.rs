//! OneBot 12 response return codes.

pub const OK: i64 = 0;

// 1xxxx: request errors

pub const BAD_REQUEST: i64 = 10001;
pub const UNSUPPORTED_ACTION: i64 = 10002;
pub const BAD_PARAM: i64 = 10003;
pub const UNSUPPORTED_PARAM: i64 = 10004;
pub const UNSUPPORTED_SEGMENT: i64 = 10005;
pub const BAD_SEGMENT_DATA: i64 = 10006;
pub const UNSUPPORTED_SEGMENT_DATA: i64 = 10007;
pub const WHO_AM_I: i64 = 10101;
pub const UNKNOWN_SELF: i64 = 10102;

// 2xxxx: handler errors

pub const BAD_HANDLER: i64 = 20001;
pub const INTERNAL_HANDLER_ERROR: i64 = 20002;
