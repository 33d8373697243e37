pub mod error;
pub use error::Result;
pub use error::Error;

pub mod config;
pub use config::ModsetOptions;

pub mod bundle;
pub use bundle::Bundle;

pub mod host;
pub mod progress;
pub mod fulfillment;
pub mod info_cache;

pub mod driver;
pub use driver::InstallDriver;
pub use driver::Phase;

pub mod reconcile;
pub use reconcile::Reconciler;
