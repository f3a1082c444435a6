pub mod alignment;
pub mod annotation;
pub mod chromosome;
pub mod feature;

// re-export for cleaner imports
pub use self::alignment::{
    AlignmentBlock, AlignmentRecord, Flags, Kind, NmTag, Op, is_aligned,
};
pub use self::annotation::{Annotation, FeatureMap, GeneInfo};
pub use self::chromosome::{ChromosomeCode, ChromosomeMap};
pub use self::feature::{Feature, FeatureKind, Strand};
