//! Seams between the run engine and its collaborators.

/// Pure state updates. No I/O, no side effects.
///
/// Called for every signal decoded from the stream, in arrival order.
pub trait Reducer<E, S>: Send + Sync {
    fn reduce(&self, state: &mut S, event: &E);
}
