/// Prefix for every versioned API route.
pub const API_PREFIX: &str = "/api/v1";

/// Header carrying the bearer token checked by the auth gate.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Room for multipart framing and the text fields around the file part.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;
