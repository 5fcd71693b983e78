use crate::domain::model::Requirement;
use std::collections::HashMap;

/// Lookup table from alias or module address to an index into `Require`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    entries: HashMap<String, usize>,
}

impl Mapping {
    /// Two entries per requirement: its module address and its alias.
    /// Later requirements overwrite colliding keys.
    pub fn build(require: &[Requirement]) -> Self {
        let mut entries = HashMap::with_capacity(require.len() * 2);
        for (index, requirement) in require.iter().enumerate() {
            entries.insert(requirement.module(), index);
            entries.insert(requirement.alias.clone(), index);
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolve<'r>(&self, require: &'r [Requirement]) -> HashMap<String, &'r Requirement> {
        self.entries
            .iter()
            .filter_map(|(key, &index)| require.get(index).map(|r| (key.clone(), r)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address;
    use crate::core::manifest::build_requirement;
    use crate::core::resolver::Resolved;
    use crate::domain::version::Version;

    fn requirement(raw: &str, alias: Option<&str>) -> Requirement {
        build_requirement(
            &address::parse(raw).unwrap(),
            Resolved {
                version: Version::parse("1.0.0").unwrap(),
                rel: "1.0.0".to_string(),
            },
            alias,
        )
    }

    #[test]
    fn test_two_entries_per_requirement() {
        let require = vec![
            requirement("github.com/yaoapp/demo-wms/cloud", Some("wms")),
            requirement("github.com/yaoapp/demo-crm", None),
        ];

        let mapping = Mapping::build(&require);

        assert_eq!(mapping.len(), 4);
        assert_eq!(mapping.get("wms"), Some(0));
        assert_eq!(mapping.get("github.com/yaoapp/demo-wms/cloud"), Some(0));
        assert_eq!(mapping.get("demo-crm.yaoapp"), Some(1));
        assert_eq!(mapping.get("github.com/yaoapp/demo-crm"), Some(1));
    }

    #[test]
    fn test_alias_collision_last_wins() {
        let require = vec![
            requirement("github.com/acme/one", Some("shared")),
            requirement("github.com/acme/two", Some("shared")),
        ];

        let mapping = Mapping::build(&require);

        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.get("shared"), Some(1));
        assert_eq!(mapping.resolve(&require)["shared"].addr, "github.com/acme/two");
    }
}
