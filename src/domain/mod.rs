// ============================================================================
// Domain Layer - Order Mutation and Consistency
// ============================================================================
//
// Commands, summaries and the engine that keeps an order's stored total in
// step with its stored items. Storage and event delivery sit behind traits.
//
// ============================================================================

pub mod order;
