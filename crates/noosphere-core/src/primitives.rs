//! # Innate Primitives
//!
//! Hardcoded constants of the Noosphere graph engine.
//!
//! The graph starts with zero data but a fixed bootstrap vocabulary. The
//! names below are the only strings the engine recognizes by identity; every
//! other attribute is resolved through the modules stored in the graph.

/// First id handed out by the sequential allocator.
pub const SEQUENTIAL_SEED: u64 = 100;

/// Default length of random token ids (excluding the `!` prefix).
pub const DEFAULT_TOKEN_LENGTH: usize = 6;

/// Prefix of every token id.
pub const TOKEN_PREFIX: char = '!';

/// Attribute of the Root Loader listing module descriptors.
pub const MODULES_KEY: &str = "modules";

/// Scope written into the descriptors of the built-in modules.
pub const DEFAULT_SCOPE: &str = "noosphere";

/// Version written into the descriptors of the built-in modules.
pub const DEFAULT_VERSION: &str = "0.1";

// =============================================================================
// MODULE NAMES
// =============================================================================

/// The bootstrap module describing all module descriptors.
pub const LOADER_MODULE: &str = "loader";

/// Module declaring attribute names, element kinds, and array-ness.
pub const ATTRIBUTE_ID_MODULE: &str = "attribute_id";

/// Module declaring mirrored (bidirectional) attributes.
pub const LINK_MODULE: &str = "link";

/// Module declaring the Type/Attr structural vocabulary.
pub const TYPE_MODULE: &str = "type";

// =============================================================================
// DESCRIPTOR FIELDS
// =============================================================================

/// Loader descriptor fields, used as literal keys on the loader descriptor.
pub const SCOPE_FIELD: &str = "scope";
pub const NAME_FIELD: &str = "name";
pub const VERSION_FIELD: &str = "version";

/// Attribute-id descriptor fields.
pub const DBTYPE_FIELD: &str = "dbtype";
pub const ARRAY_FIELD: &str = "array";
pub const ATTRS_FIELD: &str = "attrs";

/// Link descriptor field.
pub const TARGET_FIELD: &str = "target";

/// Type descriptor fields.
pub const TYPE_FIELD: &str = "type";
pub const TYPE_TYPE_FIELD: &str = "type_type";
pub const ATTR_TYPE_FIELD: &str = "attr_type";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of a persisted JSON document.
///
/// Documents larger than this are rejected before parsing.
pub const MAX_DOCUMENT_SIZE: usize = 256 * 1024 * 1024; // 256 MB

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_seed_is_one_hundred() {
        assert_eq!(SEQUENTIAL_SEED, 100);
    }

    #[test]
    fn module_names_are_distinct() {
        let names = [LOADER_MODULE, ATTRIBUTE_ID_MODULE, LINK_MODULE, TYPE_MODULE];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
