use tracing::debug;

/// What a single optimistic round decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt<T> {
    Done(T),
    /// The conditional write lost a race; re-read and try again.
    Retry,
}

/// Runs `round` at most `max_tries` times, stopping at the first [`Attempt::Done`].
///
/// Returns `Ok(None)` when every round asked for a retry. Errors from a round are
/// returned immediately without further rounds. The round number (starting at 1)
/// is passed to `round`.
pub async fn attempt<T, E, F, Fut>(max_tries: usize, mut round: F) -> Result<Option<T>, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Attempt<T>, E>>,
{
    for number in 1..=max_tries {
        match round(number).await? {
            Attempt::Done(value) => return Ok(Some(value)),
            Attempt::Retry => debug!("Round {}/{} lost a race", number, max_tries),
        }
    }
    Ok(None)
}
