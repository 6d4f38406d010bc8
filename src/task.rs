use super::result::TaskResult;
use async_trait::async_trait;


/// Unit of work executed by a worker.
///
/// The only contract is `process`: callers keep whatever state they need in
/// the implementing value. A failed task is reported once on the error sink
/// and never retried.
#[async_trait]
pub trait Task: Send {
    async fn process(&mut self) -> TaskResult;
}

pub type BoxedTask = Box<dyn Task>;
