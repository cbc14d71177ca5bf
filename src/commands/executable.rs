use crate::reply::Reply;
use crate::store::Store;
use crate::Error;

/// Applies a decoded command to the store. The only failure is the store itself being unusable;
/// semantic problems are answered with `Reply::Error`.
pub trait Executable {
    fn exec(self, store: Store) -> Result<Reply, Error>;
}
