// handlers/public/mod.rs - Public handlers (no session required)
//
// Security Level: None, except the webhook receiver which authenticates the
// sender with an HMAC signature instead of a session.
// Route Prefix: /, /health, /api/webhooks/weclapp, /auth/invitations/:token
// Middleware: none

pub mod health;
pub mod invitations;
pub mod webhook;
