//! Cover commander port: issues move commands to physical covers.

use std::future::Future;

use shutterctl_domain::error::ShutterError;
use shutterctl_domain::id::CoverId;
use shutterctl_domain::position::Position;

/// Sends a move command to a cover.
///
/// Fire-and-forget from the engine's point of view: implementations return
/// once the command is handed to the transport, not when the cover arrives.
pub trait CoverCommander {
    fn move_cover(
        &self,
        cover: &CoverId,
        position: Position,
    ) -> impl Future<Output = Result<(), ShutterError>> + Send;
}

impl<T: CoverCommander + Send + Sync> CoverCommander for std::sync::Arc<T> {
    fn move_cover(
        &self,
        cover: &CoverId,
        position: Position,
    ) -> impl Future<Output = Result<(), ShutterError>> + Send {
        (**self).move_cover(cover, position)
    }
}

/// A disabled commander accepts every command.
impl<T: CoverCommander + Send + Sync> CoverCommander for Option<T> {
    async fn move_cover(&self, cover: &CoverId, position: Position) -> Result<(), ShutterError> {
        match self {
            Some(inner) => inner.move_cover(cover, position).await,
            None => Ok(()),
        }
    }
}

/// Fan out to both commanders; the first failure is reported.
impl<A, B> CoverCommander for (A, B)
where
    A: CoverCommander + Send + Sync,
    B: CoverCommander + Send + Sync,
{
    async fn move_cover(&self, cover: &CoverId, position: Position) -> Result<(), ShutterError> {
        let first = self.0.move_cover(cover, position).await;
        let second = self.1.move_cover(cover, position).await;
        first.and(second)
    }
}
