// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Deliveries are the only aggregate with rules of their own. Everything else
// the dashboard manages is plain data entry handled by the remote API.
//
// ============================================================================

pub mod delivery;
