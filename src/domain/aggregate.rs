// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// 1. Commands are validated against current state before anything changes
// 2. Accepted commands produce events; events are facts
// 3. State changes only by applying events
//
// The persisted form of an aggregate is its current state plus a version.
// Every write is conditional on the version that was read.
//
// ============================================================================

/// Generic Aggregate trait
///
/// Type Parameters:
/// - `Event`: The domain event type for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Create new aggregate from first event
    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error>;

    /// Apply subsequent events to update state
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    fn aggregate_id(&self) -> &str;

    /// Version of the stored state this instance was loaded from
    fn version(&self) -> i64;

    fn apply_all(&mut self, events: &[Self::Event]) -> Result<(), Self::Error> {
        for event in events {
            self.apply_event(event)?;
        }
        Ok(())
    }

    /// Build an aggregate from the events of its first command
    fn from_events(events: &[Self::Event]) -> anyhow::Result<Self>
    where
        Self::Error: std::fmt::Display,
    {
        let (first, rest) = events
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("No events to load"))?;

        let mut aggregate = Self::apply_first_event(first)
            .map_err(|e| anyhow::anyhow!("Failed to apply first event: {}", e))?;

        for event in rest {
            aggregate
                .apply_event(event)
                .map_err(|e| anyhow::anyhow!("Failed to apply event: {}", e))?;
        }

        Ok(aggregate)
    }
}
