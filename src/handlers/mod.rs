pub mod sync;

pub use self::sync::SyncPlugin;

/// Lifecycle events a host can forward to [`SyncPlugin::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Hook {
    /// A deployment finished: mirror every directory into its bucket.
    DeployComplete,
    /// The stack is about to be removed: empty every bucket.
    BeforeRemove,
    /// Manual sync command.
    Sync,
}
