pub mod ancestry;
pub mod crossbreeding;
pub mod manager;
pub mod mutation;
pub mod reproduction;
pub mod traits;

pub use ancestry::AncestryConfig;
pub use crossbreeding::CrossbreedingConfig;
pub use manager::ConfigManager;
pub use mutation::MutationConfig;
pub use reproduction::ReproductionConfig;
pub use traits::ConfigSection;
