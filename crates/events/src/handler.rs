/// Execute an aggregate command deterministically (no IO, no async).
///
/// Canonical single-record lifecycle:
///
/// 1. **Decide**: `aggregate.handle(command)` (pure, no mutation)
/// 2. **Evolve**: apply each decided event
///
/// If the decision fails the aggregate is untouched, which is all the
/// atomicity a single-record command needs. Multi-record operations decide
/// every record first and only then apply (see the sales engine).
pub fn execute<A>(
    aggregate: &mut A,
    command: &A::Command,
) -> Result<Vec<A::Event>, A::Error>
where
    A: atelier_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
