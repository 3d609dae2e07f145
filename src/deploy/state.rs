// ABOUTME: Rollout state marker types for the type state pattern.
// ABOUTME: Zero-sized types enforce valid state transitions at compile time.

/// Initial state: revision resolved, ready to build.
/// Available actions: `build()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialized;

/// Image built and tagged; nothing has touched any container yet.
/// Available actions: `start_container()`
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageBuilt;

/// New container created and started; the pre-start running set is held as
/// the drain target. The rollout counts as successful from here on.
/// Available actions: `drain()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Started;

/// Previous containers issued their stop calls (best effort).
/// Available actions: `prune()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Drained;

/// Terminal state: exited containers pruned, new container running.
/// Available actions: `finish()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Completed;
