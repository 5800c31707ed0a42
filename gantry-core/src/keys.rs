//! Deterministic remote key scheme.
//!
//! ```text
//! <namespace>/<component_type>/<name>/version=<N>/<relative path>
//! ```
//!
//! Relative paths are the hasher's fingerprint keys: relative to the kind
//! directory, so they start with the component name.

use crate::layout::MANIFEST_FILE;
use crate::types::{ComponentKind, ComponentName};

/// Prefix shared by every object of one component version.
pub fn version_prefix(
    namespace: &str,
    kind: ComponentKind,
    name: &ComponentName,
    version_number: u64,
) -> String {
    format!(
        "{}/{}/{}/version={}",
        namespace.trim_end_matches('/'),
        kind.type_tag(),
        name,
        version_number
    )
}

/// Key of a single file under a version prefix.
pub fn object_key(prefix: &str, relative_path: &str) -> String {
    format!("{prefix}/{}", relative_path.trim_start_matches('/'))
}

/// Key of the manifest object; uploaded last and read by status checks.
pub fn manifest_key(prefix: &str, name: &ComponentName) -> String {
    object_key(prefix, &format!("{name}/{MANIFEST_FILE}"))
}

/// Public `s3://` URI of an object, as referenced from deployment documents.
pub fn object_uri(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ComponentKind::Job, "etl", 0, "gantry/gantry_job/etl/version=0")]
    #[case(ComponentKind::Module, "utils", 12, "gantry/gantry_module/utils/version=12")]
    fn prefix_layout(
        #[case] kind: ComponentKind,
        #[case] name: &str,
        #[case] version: u64,
        #[case] expected: &str,
    ) {
        assert_eq!(
            version_prefix("gantry", kind, &ComponentName::from(name), version),
            expected
        );
    }

    #[test]
    fn trailing_namespace_slash_is_ignored() {
        let prefix = version_prefix("team/", ComponentKind::Job, &ComponentName::from("a"), 1);
        assert_eq!(prefix, "team/gantry_job/a/version=1");
    }

    #[test]
    fn manifest_key_nests_under_component_name() {
        let prefix = version_prefix(
            "gantry",
            ComponentKind::Module,
            &ComponentName::from("utils"),
            3,
        );
        assert_eq!(
            manifest_key(&prefix, &ComponentName::from("utils")),
            "gantry/gantry_module/utils/version=3/utils/.version"
        );
    }

    #[test]
    fn uri_joins_bucket_and_key() {
        assert_eq!(object_uri("data-lake", "a/b.py"), "s3://data-lake/a/b.py");
    }
}
