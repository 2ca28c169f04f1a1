pub mod alleles;
pub mod ancestry;
pub mod genome;
pub mod tree;

pub use alleles::{Allele, AlleleKind, AlleleRecord, Bounds, Domain, Metadata, Metadatum};
pub use ancestry::{Ancestry, Parent};
pub use genome::{AlleleParams, Genome, GenomeRecord};
pub use tree::{synthesize, walk, walk_forest, Walk};
