pub mod definition;
pub mod errors;
pub mod manager;
pub mod registry;
pub mod types;

pub use errors::AppError;
pub use manager::ApplicationManager;
pub use registry::AppRegistry;
pub use types::{
    AppFlags, AppId, AppInfo, AppInstance, DependencyFlags, InstanceId, InstanceSnapshot,
    ManagerEvent, StartOutcome,
};
