mod bill;
mod friend;
mod money;
mod reconcile;
mod settlement;

pub use bill::*;
pub use friend::*;
pub use money::*;
pub use reconcile::*;
pub use settlement::*;
